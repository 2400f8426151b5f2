//! Buffers: shaped, typed regions of storage.

use std::fmt;

use indexmap::IndexMap;
use lazir_ntype::NType;

use crate::backend::Opaque;
use crate::shape::Shape;
use crate::{BufferId, InstId, KernelId, TaskId};

/// A named region of typed storage with a shape.
///
/// Buffers are produced by zero or more kernels and consumed by zero or
/// more kernels; the `writers` and `readers` tables are back-references
/// maintained by the insertion APIs, not ownership. The `storage` slot is
/// opaque to the IR and owned by whichever backend populated it.
pub struct Buffer {
    shape: Shape,
    ntype: NType,
    /// Generation of this buffer in the original lazy DAG.
    depth: u32,
    number: BufferId,
    task: TaskId,
    writers: IndexMap<KernelId, Vec<InstId>>,
    readers: IndexMap<KernelId, Vec<InstId>>,
    storage: Option<Opaque>,
}

impl Buffer {
    pub(crate) fn new(number: BufferId, task: TaskId, shape: Shape, ntype: NType, depth: u32) -> Self {
        Self {
            shape,
            ntype,
            depth,
            number,
            task,
            writers: IndexMap::new(),
            readers: IndexMap::new(),
            storage: None,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn ntype(&self) -> NType {
        self.ntype
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn number(&self) -> BufferId {
        self.number
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Number of elements.
    pub fn size(&self) -> u64 {
        self.shape.size()
    }

    /// Total storage width in bits.
    pub fn bits(&self) -> u64 {
        self.ntype.bits() * self.size()
    }

    /// A buffer nothing writes to is a leaf: its contents come from the
    /// frontend.
    pub fn is_leaf(&self) -> bool {
        self.writers.is_empty()
    }

    /// A buffer nothing reads from is a root: its contents are results.
    pub fn is_root(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn is_interior(&self) -> bool {
        !self.is_leaf() && !self.is_root()
    }

    /// Kernels writing into this buffer, with their store instructions, in
    /// insertion order.
    pub fn writers(&self) -> impl ExactSizeIterator<Item = (KernelId, &[InstId])> {
        self.writers.iter().map(|(&kernel, stores)| (kernel, stores.as_slice()))
    }

    /// Kernels reading from this buffer, with their load instructions, in
    /// insertion order.
    pub fn readers(&self) -> impl ExactSizeIterator<Item = (KernelId, &[InstId])> {
        self.readers.iter().map(|(&kernel, loads)| (kernel, loads.as_slice()))
    }

    /// The kernels that produce this buffer's contents.
    pub fn writer_kernels(&self) -> impl ExactSizeIterator<Item = KernelId> {
        self.writers.keys().copied()
    }

    /// The kernels that consume this buffer's contents.
    pub fn reader_kernels(&self) -> impl ExactSizeIterator<Item = KernelId> {
        self.readers.keys().copied()
    }

    /// All store instructions targeting this buffer.
    pub fn store_instructions(&self) -> impl Iterator<Item = (KernelId, InstId)> {
        self.writers.iter().flat_map(|(&kernel, stores)| stores.iter().map(move |&store| (kernel, store)))
    }

    /// All load instructions sourcing this buffer.
    pub fn load_instructions(&self) -> impl Iterator<Item = (KernelId, InstId)> {
        self.readers.iter().flat_map(|(&kernel, loads)| loads.iter().map(move |&load| (kernel, load)))
    }

    pub fn storage(&self) -> Option<&Opaque> {
        self.storage.as_ref()
    }

    pub fn set_storage(&mut self, storage: Option<Opaque>) {
        self.storage = storage;
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub(crate) fn add_writer(&mut self, kernel: KernelId, store: InstId) {
        self.writers.entry(kernel).or_default().push(store);
    }

    pub(crate) fn add_reader(&mut self, kernel: KernelId, load: InstId) {
        self.readers.entry(kernel).or_default().push(load);
    }

    pub(crate) fn remove_kernel(&mut self, kernel: KernelId) {
        self.writers.shift_remove(&kernel);
        self.readers.shift_remove(&kernel);
    }

    pub(crate) fn remap_instructions(&mut self, kernel: KernelId, new_id_of: &[InstId]) {
        for table in [&mut self.writers, &mut self.readers] {
            if let Some(instructions) = table.get_mut(&kernel) {
                for instruction in instructions {
                    *instruction = new_id_of[instruction.index()];
                }
            }
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} {}", self.number, self.ntype, self.shape)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("number", &self.number)
            .field("task", &self.task)
            .field("shape", &self.shape)
            .field("ntype", &self.ntype)
            .field("depth", &self.depth)
            .field("writers", &self.writers)
            .field("readers", &self.readers)
            .field("storage", &self.storage.is_some())
            .finish()
    }
}
