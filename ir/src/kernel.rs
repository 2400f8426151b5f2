//! Kernels: parametric loop nests with embedded instruction DAGs.

use std::fmt;

use indexmap::IndexMap;

use crate::backend::Opaque;
use crate::instruction::Instruction;
use crate::shape::Shape;
use crate::stencil::{self, Stencil};
use crate::{BufferId, InstId, KernelId, TaskId};

/// A parametric loop nest over an iteration space.
///
/// A kernel reads from source buffers through stencils of loads and
/// writes to target buffers through stores, all connected by an
/// instruction DAG. The instruction vector is kept in bottom-up
/// topological order: an instruction's number is its position, producers
/// precede consumers, and stores come last.
pub struct Kernel {
    iteration_space: Shape,
    sources: IndexMap<BufferId, Vec<Stencil>>,
    targets: IndexMap<BufferId, Vec<InstId>>,
    instructions: Vec<Instruction>,
    task: TaskId,
    number: KernelId,
    /// Backend scratch slot.
    data: Option<Opaque>,
}

impl Kernel {
    pub(crate) fn new(number: KernelId, task: TaskId, iteration_space: Shape) -> Self {
        Self {
            iteration_space,
            sources: IndexMap::new(),
            targets: IndexMap::new(),
            instructions: Vec::new(),
            task,
            number,
            data: None,
        }
    }

    pub fn iteration_space(&self) -> &Shape {
        &self.iteration_space
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn number(&self) -> KernelId {
        self.number
    }

    pub fn instruction(&self, id: InstId) -> &Instruction {
        &self.instructions[id.index()]
    }

    pub(crate) fn instruction_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.instructions[id.index()]
    }

    pub fn number_of_instructions(&self) -> usize {
        self.instructions.len()
    }

    /// Instructions in number order (bottom-up topological).
    pub fn instructions(&self) -> impl ExactSizeIterator<Item = (InstId, &Instruction)> {
        self.instructions.iter().enumerate().map(|(number, instruction)| (InstId(number as u32), instruction))
    }

    /// Buffers this kernel reads, in first-load order.
    pub fn source_buffers(&self) -> impl ExactSizeIterator<Item = BufferId> {
        self.sources.keys().copied()
    }

    /// Buffers this kernel writes, in first-store order.
    pub fn target_buffers(&self) -> impl ExactSizeIterator<Item = BufferId> {
        self.targets.keys().copied()
    }

    /// All stencils, grouped by source buffer, in insertion order.
    pub fn stencils(&self) -> impl Iterator<Item = (BufferId, &Stencil)> {
        self.sources.iter().flat_map(|(&buffer, stencils)| stencils.iter().map(move |stencil| (buffer, stencil)))
    }

    /// The stencils recorded for one source buffer.
    pub fn stencils_for(&self, buffer: BufferId) -> &[Stencil] {
        self.sources.get(&buffer).map(Vec::as_slice).unwrap_or_default()
    }

    /// All loads, in stencil order.
    pub fn load_instructions(&self) -> impl Iterator<Item = InstId> {
        self.stencils().flat_map(|(_, stencil)| stencil.load_instructions().iter().copied())
    }

    /// All stores, in target insertion order.
    pub fn store_instructions(&self) -> impl Iterator<Item = InstId> {
        self.targets.values().flat_map(|stores| stores.iter().copied())
    }

    /// The stores recorded for one target buffer.
    pub fn stores_for(&self, buffer: BufferId) -> &[InstId] {
        self.targets.get(&buffer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Highest instruction number. The numbering discipline guarantees the
    /// maximum is attained by a store, so only stores are scanned.
    pub fn highest_instruction_number(&self) -> u32 {
        self.store_instructions().map(|store| store.0).max().unwrap_or(0)
    }

    /// Cheap cost proxy for schedulers.
    pub fn cost(&self) -> u64 {
        (self.iteration_space.size() * u64::from(self.highest_instruction_number())).max(1)
    }

    pub fn data(&self) -> Option<&Opaque> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Option<Opaque>) {
        self.data = data;
    }

    pub(crate) fn set_iteration_space(&mut self, iteration_space: Shape) {
        self.iteration_space = iteration_space;
    }

    pub(crate) fn push_instruction(&mut self, instruction: Instruction) -> InstId {
        let id = InstId(self.instructions.len() as u32);
        self.instructions.push(instruction);
        id
    }

    pub(crate) fn sources_mut(&mut self) -> &mut IndexMap<BufferId, Vec<Stencil>> {
        &mut self.sources
    }

    pub(crate) fn add_target(&mut self, buffer: BufferId, store: InstId) {
        self.targets.entry(buffer).or_default().push(store);
    }

    /// Offsets of a stencil member. Stencil member lists only ever hold
    /// loads, which always carry a transformation.
    pub(crate) fn load_offsets(&self, load: InstId) -> &[i64] {
        self.instruction(load).transformation().expect("stencil members are loads").offsets()
    }

    /// Recompute every stencil center from the current member offsets.
    pub(crate) fn recompute_stencil_centers(&mut self) {
        let Self { sources, instructions, .. } = self;
        for stencils in sources.values_mut() {
            for stencil in stencils {
                let center = stencil::floored_center(stencil.load_instructions().iter().map(|load| {
                    instructions[load.index()].transformation().expect("stencil members are loads").offsets()
                }));
                stencil.set_center(center);
            }
        }
    }

    /// Recompute the centers of the stencils on one source buffer.
    pub(crate) fn recompute_stencil_centers_for(&mut self, buffer: BufferId) {
        let Self { sources, instructions, .. } = self;
        let Some(stencils) = sources.get_mut(&buffer) else { return };
        for stencil in stencils {
            let center = stencil::floored_center(stencil.load_instructions().iter().map(|load| {
                instructions[load.index()].transformation().expect("stencil members are loads").offsets()
            }));
            stencil.set_center(center);
        }
    }

    /// Drop all instructions and buffer links; used by kernel deletion.
    pub(crate) fn clear(&mut self) {
        self.instructions.clear();
        self.sources.clear();
        self.targets.clear();
    }

    /// Permute the instruction vector so that `order[k]` becomes
    /// instruction `k`. References are remapped separately.
    pub(crate) fn reorder_instructions(&mut self, order: &[InstId]) {
        let mut old: Vec<Option<Instruction>> = self.instructions.drain(..).map(Some).collect();
        self.instructions =
            order.iter().map(|id| old[id.index()].take().expect("a permutation visits each instruction once")).collect();
    }

    pub(crate) fn remap_instructions(&mut self, new_id_of: &[InstId]) {
        for instruction in &mut self.instructions {
            instruction.remap_inputs(new_id_of);
        }
        for stencils in self.sources.values_mut() {
            for stencil in stencils {
                stencil.remap_loads(new_id_of);
            }
        }
        for stores in self.targets.values_mut() {
            for store in stores {
                *store = new_id_of[store.index()];
            }
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {}", self.number, self.iteration_space)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("number", &self.number)
            .field("task", &self.task)
            .field("iteration_space", &self.iteration_space)
            .field("sources", &self.sources)
            .field("targets", &self.targets)
            .field("instructions", &self.instructions)
            .field("data", &self.data.is_some())
            .finish()
    }
}
