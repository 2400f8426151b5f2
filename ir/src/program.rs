//! Programs: the top-level IR container.
//!
//! A program owns flat vectors of tasks, kernels, and buffers; every
//! cross-reference between entities is an arena index, and an entity's
//! number is its position in the owning vector. This breaks the reference
//! cycles between kernels, buffers, and tasks, and makes lookup by number
//! O(1).
//!
//! Programs are produced by lowering, live for one compile-and-execute
//! round, and are discarded as a whole. Entities are never reparented
//! across programs.

use lazir_ntype::NType;
use smallvec::SmallVec;
use snafu::ensure;
use tracing::{debug, trace};

use crate::backend::Opaque;
use crate::buffer::Buffer;
use crate::error::{BufferNumberNotFoundSnafu, KernelNumberNotFoundSnafu, RankMismatchSnafu, Result};
use crate::instruction::{FnRecord, Instruction, InstructionInput, InstructionKind};
use crate::kernel::Kernel;
use crate::shape::Shape;
use crate::stencil::{self, Stencil};
use crate::task::Task;
use crate::transformation::Transformation;
use crate::{BufferId, InstId, KernelId, TaskId};

pub struct Program {
    tasks: Vec<Task>,
    kernels: Vec<Kernel>,
    buffers: Vec<Buffer>,
    initial_task: TaskId,
    final_task: TaskId,
    /// Leaf buffers paired with the lazy-array handles they came from.
    leaf_alist: Vec<(BufferId, Opaque)>,
    /// Result buffers, in the order the frontend supplied them.
    root_buffers: Vec<BufferId>,
}

impl Program {
    /// An empty program with its initial and final tasks in place.
    pub fn new() -> Self {
        let mut program = Self {
            tasks: Vec::new(),
            kernels: Vec::new(),
            buffers: Vec::new(),
            initial_task: TaskId(0),
            final_task: TaskId(0),
            leaf_alist: Vec::new(),
            root_buffers: Vec::new(),
        };
        program.initial_task = program.create_task();
        program.final_task = program.create_task();
        program
    }

    pub fn initial_task(&self) -> TaskId {
        self.initial_task
    }

    pub fn final_task(&self) -> TaskId {
        self.final_task
    }

    pub fn number_of_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn number_of_kernels(&self) -> usize {
        self.kernels.len()
    }

    pub fn number_of_buffers(&self) -> usize {
        self.buffers.len()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn create_task(&mut self) -> TaskId {
        let id = TaskId(self.tasks.len() as u32);
        self.tasks.push(Task::new(id));
        id
    }

    /// Record that `successor` may only run after `predecessor`.
    pub fn add_task_dependency(&mut self, predecessor: TaskId, successor: TaskId) {
        assert_ne!(predecessor, successor, "a task cannot depend on itself");
        self.tasks[predecessor.index()].add_successor(successor);
        self.tasks[successor.index()].add_predecessor(predecessor);
    }

    pub fn create_buffer(&mut self, task: TaskId, shape: Shape, ntype: NType, depth: u32) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Buffer::new(id, task, shape, ntype, depth));
        self.tasks[task.index()].add_defined_buffer(id);
        id
    }

    pub fn create_kernel(&mut self, task: TaskId, iteration_space: Shape) -> KernelId {
        let id = KernelId(self.kernels.len() as u32);
        self.kernels.push(Kernel::new(id, task, iteration_space));
        self.tasks[task.index()].add_kernel(id);
        id
    }

    /// Pair a leaf buffer with the lazy-array handle it was lowered from.
    pub fn register_leaf(&mut self, buffer: BufferId, handle: Opaque) {
        self.leaf_alist.push((buffer, handle));
    }

    pub fn add_root_buffer(&mut self, buffer: BufferId) {
        self.root_buffers.push(buffer);
    }

    pub fn leaf_alist(&self) -> &[(BufferId, Opaque)] {
        &self.leaf_alist
    }

    pub fn root_buffers(&self) -> &[BufferId] {
        &self.root_buffers
    }

    // ------------------------------------------------------------------
    // Lookup & traversal
    // ------------------------------------------------------------------

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.index()]
    }

    pub fn kernel(&self, id: KernelId) -> &Kernel {
        &self.kernels[id.index()]
    }

    pub fn buffer(&self, id: BufferId) -> &Buffer {
        &self.buffers[id.index()]
    }

    pub fn kernel_mut(&mut self, id: KernelId) -> &mut Kernel {
        &mut self.kernels[id.index()]
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> &mut Buffer {
        &mut self.buffers[id.index()]
    }

    /// Buffer lookup by number, for callers holding numbers of unknown
    /// provenance.
    pub fn buffer_by_number(&self, number: u32) -> Result<&Buffer> {
        self.buffers.get(number as usize).ok_or_else(|| BufferNumberNotFoundSnafu { number }.build())
    }

    /// Kernel lookup by number.
    pub fn kernel_by_number(&self, number: u32) -> Result<&Kernel> {
        self.kernels.get(number as usize).ok_or_else(|| KernelNumberNotFoundSnafu { number }.build())
    }

    /// Tasks in number order.
    pub fn tasks(&self) -> impl ExactSizeIterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Kernels in number order.
    pub fn kernels(&self) -> impl ExactSizeIterator<Item = &Kernel> {
        self.kernels.iter()
    }

    /// Buffers in number order.
    pub fn buffers(&self) -> impl ExactSizeIterator<Item = &Buffer> {
        self.buffers.iter()
    }

    pub fn task_kernels(&self, task: TaskId) -> impl Iterator<Item = &Kernel> {
        self.task(task).kernels().map(|kernel| self.kernel(kernel))
    }

    pub fn task_defined_buffers(&self, task: TaskId) -> impl Iterator<Item = &Buffer> {
        self.task(task).defined_buffers().map(|buffer| self.buffer(buffer))
    }

    // ------------------------------------------------------------------
    // Instruction insertion
    // ------------------------------------------------------------------

    /// Append a call instruction.
    ///
    /// Inputs must name existing instructions and in-range value indices;
    /// violations are programmer errors.
    pub fn add_call(
        &mut self,
        kernel: KernelId,
        fnrecord: FnRecord,
        number_of_values: u32,
        inputs: &[InstructionInput],
    ) -> InstId {
        let kernel = &mut self.kernels[kernel.index()];
        for &(value_index, producer) in inputs {
            debug_assert!(producer.index() < kernel.number_of_instructions(), "call input must already exist");
            debug_assert!(
                value_index < kernel.instruction(producer).number_of_values(),
                "call input selects a value its producer does not return"
            );
        }
        kernel.push_instruction(Instruction::new(
            InstructionKind::Call { fnrecord, number_of_values },
            inputs.iter().copied(),
        ))
    }

    /// Append an iref instruction: the transformation maps the iteration
    /// index to a single integer.
    pub fn add_iref(&mut self, kernel: KernelId, transformation: Transformation) -> Result<InstId> {
        let kernel = &mut self.kernels[kernel.index()];
        ensure!(
            transformation.input_rank() == kernel.iteration_space().rank(),
            RankMismatchSnafu { expected: kernel.iteration_space().rank(), observed: transformation.input_rank() }
        );
        ensure!(
            transformation.output_rank() == 1,
            RankMismatchSnafu { expected: 1usize, observed: transformation.output_rank() }
        );
        Ok(kernel.push_instruction(Instruction::new(InstructionKind::Iref { transformation }, [])))
    }

    /// Append a load instruction and group it into a stencil.
    ///
    /// Among the stencils already recorded for `(kernel, buffer)` whose
    /// access pattern (output mask and scalings) matches, the first one
    /// whose members all stay within [`stencil::STENCIL_MAX_RADIUS`] of
    /// the tentative new center absorbs the load; otherwise the load
    /// starts a stencil of its own. The load is also recorded in the
    /// buffer's reader table.
    pub fn add_load(&mut self, kernel: KernelId, buffer: BufferId, transformation: Transformation) -> Result<InstId> {
        let kernel_id = kernel;
        let buffer_id = buffer;
        let kernel = &mut self.kernels[kernel_id.index()];
        let buffer = &mut self.buffers[buffer_id.index()];
        ensure!(
            transformation.input_rank() == kernel.iteration_space().rank(),
            RankMismatchSnafu { expected: kernel.iteration_space().rank(), observed: transformation.input_rank() }
        );
        ensure!(
            transformation.output_rank() == buffer.shape().rank(),
            RankMismatchSnafu { expected: buffer.shape().rank(), observed: transformation.output_rank() }
        );

        // Grouping decision over the existing stencils, in insertion order.
        enum Placement {
            Join(usize, SmallVec<[i64; 4]>),
            New,
        }
        let mut placement = Placement::New;
        for (index, candidate) in kernel.stencils_for(buffer_id).iter().enumerate() {
            let first = kernel
                .instruction(candidate.load_instructions()[0])
                .transformation()
                .expect("stencil members are loads");
            if first.output_mask() != transformation.output_mask() || first.scalings() != transformation.scalings() {
                continue;
            }
            let member_offsets = || {
                candidate
                    .load_instructions()
                    .iter()
                    .map(|&load| kernel.load_offsets(load))
                    .chain([transformation.offsets()])
            };
            let center = stencil::floored_center(member_offsets());
            if member_offsets()
                .all(|offsets| stencil::within_radius(&center, offsets, transformation.output_mask(), buffer.shape()))
            {
                placement = Placement::Join(index, center);
                break;
            }
        }

        let offsets: SmallVec<[i64; 4]> = SmallVec::from_slice(transformation.offsets());
        let load =
            kernel.push_instruction(Instruction::new(InstructionKind::Load { buffer: buffer_id, transformation }, []));
        match placement {
            Placement::Join(index, center) => {
                trace!(kernel = %kernel_id, buffer = %buffer_id, stencil = index, "load joins stencil");
                let stencils = kernel.sources_mut().get_mut(&buffer_id).expect("placement names a recorded stencil");
                stencils[index].admit(center, load);
            }
            Placement::New => {
                trace!(kernel = %kernel_id, buffer = %buffer_id, "load starts a new stencil");
                kernel.sources_mut().entry(buffer_id).or_default().push(Stencil::singleton(&offsets, load));
            }
        }
        buffer.add_reader(kernel_id, load);
        Ok(load)
    }

    /// Append a store instruction writing `input` to `buffer`.
    ///
    /// Stores do not group. The kernel and the buffer it writes must
    /// belong to the same task.
    pub fn add_store(
        &mut self,
        kernel: KernelId,
        input: InstructionInput,
        buffer: BufferId,
        transformation: Transformation,
    ) -> Result<InstId> {
        let kernel_id = kernel;
        let buffer_id = buffer;
        let kernel = &mut self.kernels[kernel_id.index()];
        let buffer = &mut self.buffers[buffer_id.index()];
        ensure!(
            transformation.input_rank() == kernel.iteration_space().rank(),
            RankMismatchSnafu { expected: kernel.iteration_space().rank(), observed: transformation.input_rank() }
        );
        ensure!(
            transformation.output_rank() == buffer.shape().rank(),
            RankMismatchSnafu { expected: buffer.shape().rank(), observed: transformation.output_rank() }
        );
        assert_eq!(kernel.task(), buffer.task(), "a kernel and the buffers it writes must share a task");
        let (value_index, producer) = input;
        debug_assert!(producer.index() < kernel.number_of_instructions(), "store input must already exist");
        debug_assert!(
            value_index < kernel.instruction(producer).number_of_values(),
            "store input selects a value its producer does not return"
        );

        let store = kernel
            .push_instruction(Instruction::new(InstructionKind::Store { buffer: buffer_id, transformation }, [input]));
        kernel.add_target(buffer_id, store);
        buffer.add_writer(kernel_id, store);
        Ok(store)
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Unlink a kernel from every buffer it touches and drop its
    /// instructions. The kernel entity stays in the arena, logically dead.
    pub fn delete_kernel(&mut self, kernel: KernelId) {
        let source_buffers: Vec<BufferId> = self.kernels[kernel.index()].source_buffers().collect();
        let target_buffers: Vec<BufferId> = self.kernels[kernel.index()].target_buffers().collect();
        for buffer in source_buffers.into_iter().chain(target_buffers) {
            self.buffers[buffer.index()].remove_kernel(kernel);
        }
        self.kernels[kernel.index()].clear();
        debug!(kernel = %kernel, "deleted kernel");
    }

    /// Reassign instruction numbers in depth-first post-order from the
    /// leaves, so that producers precede consumers and the stores of the
    /// target table come last. The instruction vector is physically
    /// reordered and every cross-reference (inputs, stencil members,
    /// target lists, buffer reader/writer tables) is remapped.
    pub fn renumber_instructions(&mut self, kernel: KernelId) {
        let kernel_id = kernel;
        let kernel = &mut self.kernels[kernel_id.index()];
        let count = kernel.number_of_instructions();

        // Post-order DFS, iterative like every graph walk around here.
        let mut order: Vec<InstId> = Vec::with_capacity(count);
        let mut visited = vec![false; count];
        let visit = |roots: &[InstId], kernel: &Kernel, order: &mut Vec<InstId>, visited: &mut Vec<bool>| {
            for &root in roots {
                let mut stack = vec![(root, false)];
                while let Some((id, expanded)) = stack.pop() {
                    if expanded {
                        order.push(id);
                        continue;
                    }
                    if visited[id.index()] {
                        continue;
                    }
                    visited[id.index()] = true;
                    stack.push((id, true));
                    for &(_, producer) in kernel.instruction(id).inputs().iter().rev() {
                        if !visited[producer.index()] {
                            stack.push((producer, false));
                        }
                    }
                }
            }
        };

        // Everything that is not a store first, then the stores in target
        // insertion order; stores are never inputs, so they end up with
        // the highest numbers.
        let non_stores: Vec<InstId> = (0..count)
            .map(|number| InstId(number as u32))
            .filter(|&id| !kernel.instruction(id).is_store())
            .collect();
        let stores: Vec<InstId> = kernel.store_instructions().collect();
        visit(&non_stores, kernel, &mut order, &mut visited);
        visit(&stores, kernel, &mut order, &mut visited);
        let leftovers: Vec<InstId> =
            (0..count).map(|number| InstId(number as u32)).filter(|&id| !visited[id.index()]).collect();
        visit(&leftovers, kernel, &mut order, &mut visited);
        debug_assert_eq!(order.len(), count);

        let mut new_id_of = vec![InstId(0); count];
        for (new_number, &old_id) in order.iter().enumerate() {
            new_id_of[old_id.index()] = InstId(new_number as u32);
        }

        kernel.reorder_instructions(&order);
        kernel.remap_instructions(&new_id_of);
        for buffer in &mut self.buffers {
            buffer.remap_instructions(kernel_id, &new_id_of);
        }
        debug!(kernel = %kernel_id, instructions = count, "renumbered instructions");
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
