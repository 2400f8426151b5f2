//! Common imports for working with IR graphs.
//!
//! ```rust,ignore
//! use lazir_ir::prelude::*;
//! ```

pub use crate::backend::{Backend, Callable, Opaque};
pub use crate::buffer::Buffer;
pub use crate::error::{Error, Result};
pub use crate::instruction::{FnRecord, Instruction, InstructionInput, InstructionKind};
pub use crate::kernel::Kernel;
pub use crate::program::Program;
pub use crate::range::{Range, broadcast_ranges};
pub use crate::reuse::reuse_optimizing_transformation;
pub use crate::shape::{Shape, broadcast_shapes};
pub use crate::stencil::{STENCIL_MAX_RADIUS, Stencil};
pub use crate::task::Task;
pub use crate::transformation::Transformation;
pub use crate::{BufferId, InstId, KernelId, TaskId};

pub use lazir_ntype::{NType, Value};
