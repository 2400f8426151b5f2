//! The per-kernel instruction model.
//!
//! Instructions form a DAG inside each kernel. The four variants are a
//! closed sum: `call` applies an external function, `iref` materializes a
//! component of the current iteration index, `load` and `store` move
//! elements between the iteration and a buffer through an affine
//! transformation. Shared data (the input list) lives in a common header;
//! iterating variants additionally carry their transformation.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::backend::Callable;
use crate::transformation::Transformation;
use crate::{BufferId, InstId};

/// Descriptor of an external function used by call instructions.
///
/// Equality is by name; the optional [`Callable`] exists so reference
/// backends can evaluate calls without a registry lookup.
#[derive(Clone)]
pub struct FnRecord {
    name: String,
    callable: Option<Arc<dyn Callable>>,
}

impl FnRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), callable: None }
    }

    pub fn with_callable(name: impl Into<String>, callable: Arc<dyn Callable>) -> Self {
        Self { name: name.into(), callable: Some(callable) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callable(&self) -> Option<&Arc<dyn Callable>> {
        self.callable.as_ref()
    }
}

impl PartialEq for FnRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FnRecord {}

impl fmt::Debug for FnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRecord")
            .field("name", &self.name)
            .field("callable", &self.callable.is_some())
            .finish()
    }
}

/// An input edge: the producer instruction and which of its values is
/// consumed (producers may return several values).
pub type InstructionInput = (u32, InstId);

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// Apply an external function; produces `number_of_values` values.
    Call { fnrecord: FnRecord, number_of_values: u32 },
    /// Produce one component of the current iteration index, mapped
    /// through a rank-1-output transformation.
    Iref { transformation: Transformation },
    /// Read one element of `buffer` at the transformed iteration index.
    Load { buffer: BufferId, transformation: Transformation },
    /// Write the single input value to `buffer` at the transformed
    /// iteration index; produces no values.
    Store { buffer: BufferId, transformation: Transformation },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    inputs: SmallVec<[InstructionInput; 2]>,
    kind: InstructionKind,
}

impl Instruction {
    pub(crate) fn new(kind: InstructionKind, inputs: impl IntoIterator<Item = InstructionInput>) -> Self {
        Self { inputs: inputs.into_iter().collect(), kind }
    }

    pub fn inputs(&self) -> &[InstructionInput] {
        &self.inputs
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    /// Fan-out of this instruction.
    pub fn number_of_values(&self) -> u32 {
        match &self.kind {
            InstructionKind::Call { number_of_values, .. } => *number_of_values,
            InstructionKind::Iref { .. } | InstructionKind::Load { .. } => 1,
            InstructionKind::Store { .. } => 0,
        }
    }

    /// The transformation of an iterating instruction.
    pub fn transformation(&self) -> Option<&Transformation> {
        match &self.kind {
            InstructionKind::Call { .. } => None,
            InstructionKind::Iref { transformation }
            | InstructionKind::Load { transformation, .. }
            | InstructionKind::Store { transformation, .. } => Some(transformation),
        }
    }

    pub(crate) fn transformation_mut(&mut self) -> Option<&mut Transformation> {
        match &mut self.kind {
            InstructionKind::Call { .. } => None,
            InstructionKind::Iref { transformation }
            | InstructionKind::Load { transformation, .. }
            | InstructionKind::Store { transformation, .. } => Some(transformation),
        }
    }

    /// The buffer a load or store references.
    pub fn buffer(&self) -> Option<BufferId> {
        match &self.kind {
            InstructionKind::Load { buffer, .. } | InstructionKind::Store { buffer, .. } => Some(*buffer),
            _ => None,
        }
    }

    pub fn is_iterating(&self) -> bool {
        !matches!(self.kind, InstructionKind::Call { .. })
    }

    pub fn is_load(&self) -> bool {
        matches!(self.kind, InstructionKind::Load { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self.kind, InstructionKind::Store { .. })
    }

    pub(crate) fn remap_inputs(&mut self, new_id_of: &[InstId]) {
        for (_, producer) in &mut self.inputs {
            *producer = new_id_of[producer.index()];
        }
    }
}

impl fmt::Display for Instruction {
    /// Prints the variant, its distinguishing fields, and the inputs as
    /// `(value_index, producer_number)` pairs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstructionKind::Call { fnrecord, number_of_values } => {
                write!(f, "call {}/{number_of_values}", fnrecord.name())?;
            }
            InstructionKind::Iref { transformation } => write!(f, "iref {transformation}")?,
            InstructionKind::Load { buffer, transformation } => write!(f, "load {buffer} {transformation}")?,
            InstructionKind::Store { buffer, transformation } => write!(f, "store {buffer} {transformation}")?,
        }
        for (value_index, producer) in &self.inputs {
            write!(f, " ({value_index} {})", producer.0)?;
        }
        Ok(())
    }
}
