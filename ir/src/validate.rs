//! Executable well-formedness checks.
//!
//! [`Program::validate`] verifies every structural invariant the backends
//! rely on. It is meant for tests and for debugging lowering or rewrite
//! passes; it is never called on the hot path.

use std::collections::HashSet;

use crate::error::{InvariantViolatedSnafu, Result};
use crate::instruction::InstructionKind;
use crate::stencil;
use crate::{BufferId, Program, TaskId};

fn fail<T>(what: String) -> Result<T> {
    InvariantViolatedSnafu { what }.fail()
}

impl Program {
    /// Check every structural invariant of the program.
    pub fn validate(&self) -> Result<()> {
        self.validate_task_graph()?;
        self.validate_cross_references()?;
        self.validate_kernels()?;
        self.validate_task_membership()?;
        Ok(())
    }

    /// Numbering, edge symmetry, acyclicity, unique source and sink.
    fn validate_task_graph(&self) -> Result<()> {
        for (index, task) in self.tasks().enumerate() {
            if task.number().index() != index {
                return fail(format!("task {} stored at index {index}", task.number()));
            }
            for predecessor in task.predecessors() {
                if !self.task(predecessor).successors().any(|successor| successor == task.number()) {
                    return fail(format!("edge {predecessor} -> {} is not mirrored", task.number()));
                }
            }
            for successor in task.successors() {
                if !self.task(successor).predecessors().any(|predecessor| predecessor == task.number()) {
                    return fail(format!("edge {} -> {successor} is not mirrored", task.number()));
                }
            }
        }

        let sources: Vec<TaskId> =
            self.tasks().filter(|task| task.predecessors().len() == 0).map(|task| task.number()).collect();
        if sources != [self.initial_task()] {
            return fail(format!("task graph sources are {sources:?}, expected only {}", self.initial_task()));
        }
        let sinks: Vec<TaskId> =
            self.tasks().filter(|task| task.successors().len() == 0).map(|task| task.number()).collect();
        if sinks != [self.final_task()] {
            return fail(format!("task graph sinks are {sinks:?}, expected only {}", self.final_task()));
        }

        // Kahn's algorithm; leftovers mean a cycle.
        let mut in_degree: Vec<usize> = self.tasks().map(|task| task.predecessors().len()).collect();
        let mut ready: Vec<TaskId> = vec![self.initial_task()];
        let mut seen = 0usize;
        while let Some(task) = ready.pop() {
            seen += 1;
            for successor in self.task(task).successors() {
                in_degree[successor.index()] -= 1;
                if in_degree[successor.index()] == 0 {
                    ready.push(successor);
                }
            }
        }
        if seen != self.number_of_tasks() {
            return fail("task graph contains a cycle".to_string());
        }
        Ok(())
    }

    /// `B ∈ K.targets ⇔ K ∈ B.writers` and `B ∈ K.sources ⇔ K ∈ B.readers`.
    fn validate_cross_references(&self) -> Result<()> {
        for kernel in self.kernels() {
            for buffer in kernel.target_buffers() {
                if !self.buffer(buffer).writer_kernels().any(|writer| writer == kernel.number()) {
                    return fail(format!("{} targets {buffer} but is not among its writers", kernel.number()));
                }
            }
            for buffer in kernel.source_buffers() {
                if !self.buffer(buffer).reader_kernels().any(|reader| reader == kernel.number()) {
                    return fail(format!("{} sources {buffer} but is not among its readers", kernel.number()));
                }
            }
        }
        for buffer in self.buffers() {
            for (kernel, stores) in buffer.writers() {
                if !self.kernel(kernel).target_buffers().any(|target| target == buffer.number()) {
                    return fail(format!("{} writes {} but does not target it", kernel, buffer.number()));
                }
                for &store in stores {
                    if store.index() >= self.kernel(kernel).number_of_instructions() {
                        return fail(format!("{kernel}/{store} is not in the instruction vector"));
                    }
                    match self.kernel(kernel).instruction(store).kind() {
                        InstructionKind::Store { buffer: target, .. } if *target == buffer.number() => {}
                        _ => return fail(format!("{}/{store} listed as writer of {} but is not", kernel, buffer.number())),
                    }
                }
            }
            for (kernel, loads) in buffer.readers() {
                if !self.kernel(kernel).source_buffers().any(|source| source == buffer.number()) {
                    return fail(format!("{} reads {} but does not source it", kernel, buffer.number()));
                }
                for &load in loads {
                    if load.index() >= self.kernel(kernel).number_of_instructions() {
                        return fail(format!("{kernel}/{load} is not in the instruction vector"));
                    }
                    match self.kernel(kernel).instruction(load).kind() {
                        InstructionKind::Load { buffer: source, .. } if *source == buffer.number() => {}
                        _ => return fail(format!("{}/{load} listed as reader of {} but is not", kernel, buffer.number())),
                    }
                }
            }
        }
        Ok(())
    }

    /// Instruction ordering, fan-out selection, stencil invariants.
    fn validate_kernels(&self) -> Result<()> {
        for kernel in self.kernels() {
            for (id, instruction) in kernel.instructions() {
                for &(value_index, producer) in instruction.inputs() {
                    if producer >= id {
                        return fail(format!("{}/{id} consumes {producer}, which does not precede it", kernel.number()));
                    }
                    if value_index >= kernel.instruction(producer).number_of_values() {
                        return fail(format!(
                            "{}/{id} selects value {value_index} of {producer}, which returns fewer",
                            kernel.number()
                        ));
                    }
                }
            }

            let in_vector: HashSet<usize> = (0..kernel.number_of_instructions()).collect();
            for load in kernel.load_instructions() {
                if !in_vector.contains(&load.index()) {
                    return fail(format!("{} stencil member {load} is not in the instruction vector", kernel.number()));
                }
            }
            for store in kernel.store_instructions() {
                if !in_vector.contains(&store.index()) {
                    return fail(format!("{} target store {store} is not in the instruction vector", kernel.number()));
                }
            }

            for (buffer, stencil) in kernel.stencils() {
                let members = stencil.load_instructions();
                if members.is_empty() {
                    return fail(format!("{} has an empty stencil on {buffer}", kernel.number()));
                }
                let first = match kernel.instruction(members[0]).kind() {
                    InstructionKind::Load { buffer: first_buffer, transformation } if *first_buffer == buffer => {
                        transformation
                    }
                    _ => return fail(format!("{} stencil member is not a load of {buffer}", kernel.number())),
                };
                for &member in members {
                    let transformation = match kernel.instruction(member).kind() {
                        InstructionKind::Load { buffer: member_buffer, transformation } if *member_buffer == buffer => {
                            transformation
                        }
                        _ => return fail(format!("{} stencil member is not a load of {buffer}", kernel.number())),
                    };
                    if transformation.output_mask() != first.output_mask()
                        || transformation.scalings() != first.scalings()
                    {
                        return fail(format!("{} stencil on {buffer} mixes access patterns", kernel.number()));
                    }
                    if !stencil::within_radius(
                        stencil.center(),
                        transformation.offsets(),
                        transformation.output_mask(),
                        self.buffer(buffer).shape(),
                    ) {
                        return fail(format!("{} stencil on {buffer} exceeds the radius bound", kernel.number()));
                    }
                }
            }
        }
        Ok(())
    }

    /// The three task-membership rules of the data model.
    fn validate_task_membership(&self) -> Result<()> {
        // Rules 1 and 2: kernels and the buffers they write share a task.
        for buffer in self.buffers() {
            for (kernel, _) in buffer.writers() {
                if self.kernel(kernel).task() != buffer.task() {
                    return fail(format!(
                        "{} (task {}) writes {} (task {})",
                        kernel,
                        self.kernel(kernel).task(),
                        buffer.number(),
                        buffer.task()
                    ));
                }
            }
        }

        // Rule 3: a buffer read inside task T that transitively depends on
        // a buffer of T must itself be in T.
        for task in self.tasks() {
            for kernel in task.kernels() {
                for buffer in self.kernel(kernel).source_buffers() {
                    if self.buffer(buffer).task() == task.number() {
                        continue;
                    }
                    if self.depends_on_task(buffer, task.number()) {
                        return fail(format!(
                            "{buffer} is read in task {} and depends on it, but belongs to task {}",
                            task.number(),
                            self.buffer(buffer).task()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Does `buffer` transitively depend on any buffer defined in `task`?
    fn depends_on_task(&self, buffer: BufferId, task: TaskId) -> bool {
        let mut stack = vec![buffer];
        let mut visited: HashSet<BufferId> = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if self.buffer(current).task() == task && current != buffer {
                return true;
            }
            for writer in self.buffer(current).writer_kernels() {
                stack.extend(self.kernel(writer).source_buffers());
            }
        }
        false
    }
}
