//! Post-lowering intermediate representation for a lazy, parallel array
//! compiler.
//!
//! A frontend stages expressions over multi-dimensional arrays into a lazy
//! dataflow graph; a lowering pass turns that graph into a [`Program`]: a
//! typed graph of [`Task`]s, [`Kernel`]s, [`Buffer`]s, [`Stencil`]s, and
//! [`Instruction`]s. Backends consume the program, assign storage to each
//! buffer, and execute kernels while respecting the task predecessor graph.
//!
//! The crate covers the graph itself and the algorithms that keep it
//! consistent under bulk rewrites:
//!
//! - [`range`] / [`shape`] — finite cartesian ranges and shapes
//! - [`transformation`] — affine index maps with masks, scalings, offsets
//! - [`instruction`] / [`stencil`] — per-kernel instruction DAGs, with loads
//!   clustered into bounded-radius stencils at insertion time
//! - [`program`] — arena-owned entities, construction and edit APIs
//! - [`transform`] — semantics-preserving rewrites of iteration spaces and
//!   buffer shapes
//! - [`reuse`] — per-axis memory-reuse analysis and axis reordering
//! - [`validate`] — executable well-formedness checks
//!
//! # Concurrency
//!
//! The IR is single-threaded with respect to mutation: construction,
//! transformation passes, and deletion assume exclusive access (`&mut
//! Program`). Read-only traversal is safe from multiple threads while no
//! mutation is in progress. No locks are held internally and no operation
//! blocks.
//!
//! # Iteration guarantees
//!
//! Traversal methods visit each element exactly once per call, in the order
//! recorded by the underlying containers: insertion order for associations,
//! number order for task and instruction vectors. The borrow checker rules
//! out mutation during iteration; APIs that rewrite while walking a
//! container snapshot it first.

use std::fmt;

pub mod backend;
pub mod buffer;
pub mod debug;
pub mod error;
pub mod groups;
pub mod instruction;
pub mod kernel;
pub mod prelude;
pub mod program;
pub mod range;
pub mod reuse;
pub mod shape;
pub mod stencil;
pub mod task;
pub mod transform;
pub mod transformation;
pub mod validate;

#[cfg(test)]
pub mod test;

pub use backend::{Backend, Callable, Opaque};
pub use buffer::Buffer;
pub use error::{Error, Result};
pub use instruction::{FnRecord, Instruction, InstructionKind};
pub use kernel::Kernel;
pub use program::Program;
pub use range::{Range, broadcast_ranges};
pub use reuse::reuse_optimizing_transformation;
pub use shape::{Shape, broadcast_shapes};
pub use stencil::{STENCIL_MAX_RADIUS, Stencil};
pub use task::Task;
pub use transformation::Transformation;

macro_rules! id_types {
    ($($(#[$doc:meta])* $name:ident => $prefix:literal),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub const fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($prefix, "{}"), self.0)
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(self, f)
                }
            }
        )*
    };
}

id_types! {
    /// Number of a task; indexes the program's task vector.
    TaskId => "T",
    /// Number of a kernel within its program.
    KernelId => "K",
    /// Number of a buffer within its program.
    BufferId => "B",
    /// Number of an instruction within its kernel; indexes the kernel's
    /// instruction vector, so producers always carry smaller ids than their
    /// consumers.
    InstId => "I",
}
