//! Contracts between the IR and its collaborators.
//!
//! The IR never executes kernels and never allocates storage; backends do,
//! and they communicate through the opaque slots on buffers and kernels
//! plus the traits below. There is no process-global backend: every entry
//! point that needs one takes it as an explicit parameter, and test
//! harnesses are expected to build composite backends that fan requests
//! out to a reference and a candidate implementation.

use std::any::Any;
use std::sync::Arc;

use lazir_ntype::{NType, Value};
use snafu::ensure;

use crate::buffer::Buffer;
use crate::error::{ArrayDimensionMismatchSnafu, ArrayNTypeMismatchSnafu, ArrayRankMismatchSnafu, Result};
use crate::program::Program;

/// Opaque slot contents: backend storage handles, kernel scratch data, and
/// frontend lazy-array handles all share this shape. The IR neither
/// allocates nor frees what is behind it.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// A value that carries data and can be invoked with one or two arguments.
///
/// External function descriptors ([`crate::instruction::FnRecord`]) may
/// carry one of these so that a reference backend can evaluate calls
/// element-wise.
pub trait Callable: Send + Sync {
    fn call_unary(&self, arg: Value) -> Value;
    fn call_binary(&self, lhs: Value, rhs: Value) -> Value;
}

/// Contract implemented by program executors.
///
/// A backend walks the tasks in topological order, allocates storage for
/// each buffer, and executes each kernel once, interpreting or compiling
/// its instruction vector. Bookkeeping may be attached to `kernel.data`
/// and `buffer.storage`.
pub trait Backend {
    fn allocate_storage(&self, buffer: &Buffer) -> Opaque;
    fn execute_program(&self, program: &mut Program) -> Result<()>;
}

/// Check that an external array (given as dimensions and element type) can
/// back the given buffer.
pub fn check_array_compatible(dimensions: &[u64], ntype: NType, buffer: &Buffer) -> Result<()> {
    ensure!(
        dimensions.len() == buffer.shape().rank(),
        ArrayRankMismatchSnafu { array_rank: dimensions.len(), buffer_rank: buffer.shape().rank() }
    );
    for (axis, (&array_size, range)) in dimensions.iter().zip(buffer.shape().ranges()).enumerate() {
        ensure!(
            array_size == range.size(),
            ArrayDimensionMismatchSnafu { axis, array_size, buffer_size: range.size() }
        );
    }
    ensure!(ntype == buffer.ntype(), ArrayNTypeMismatchSnafu { array_ntype: ntype, buffer_ntype: buffer.ntype() });
    Ok(())
}
