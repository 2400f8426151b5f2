//! Tasks: atomic scheduling units.

use indexmap::IndexSet;

use crate::{BufferId, KernelId, TaskId};

/// A maximal set of kernels and defined buffers that must execute
/// together.
///
/// Tasks form a DAG through their predecessor and successor sets, with
/// the program's initial task as unique source and its final task as
/// unique sink. A backend may run tasks in any order consistent with
/// that graph.
#[derive(Debug, Clone)]
pub struct Task {
    number: TaskId,
    predecessors: IndexSet<TaskId>,
    successors: IndexSet<TaskId>,
    kernels: Vec<KernelId>,
    defined_buffers: Vec<BufferId>,
}

impl Task {
    pub(crate) fn new(number: TaskId) -> Self {
        Self {
            number,
            predecessors: IndexSet::new(),
            successors: IndexSet::new(),
            kernels: Vec::new(),
            defined_buffers: Vec::new(),
        }
    }

    pub fn number(&self) -> TaskId {
        self.number
    }

    pub fn predecessors(&self) -> impl ExactSizeIterator<Item = TaskId> + '_ {
        self.predecessors.iter().copied()
    }

    pub fn successors(&self) -> impl ExactSizeIterator<Item = TaskId> + '_ {
        self.successors.iter().copied()
    }

    /// Kernels of this task, in creation order.
    pub fn kernels(&self) -> impl ExactSizeIterator<Item = KernelId> + '_ {
        self.kernels.iter().copied()
    }

    /// Buffers defined (written) within this task, in creation order.
    pub fn defined_buffers(&self) -> impl ExactSizeIterator<Item = BufferId> + '_ {
        self.defined_buffers.iter().copied()
    }

    pub(crate) fn add_predecessor(&mut self, task: TaskId) {
        self.predecessors.insert(task);
    }

    pub(crate) fn add_successor(&mut self, task: TaskId) {
        self.successors.insert(task);
    }

    pub(crate) fn add_kernel(&mut self, kernel: KernelId) {
        self.kernels.push(kernel);
    }

    pub(crate) fn add_defined_buffer(&mut self, buffer: BufferId) {
        self.defined_buffers.push(buffer);
    }
}
