use lazir_ntype::NType;
use snafu::Snafu;

use crate::range::Range;
use crate::shape::Shape;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Shapes disagree where equal shapes were required.
    #[snafu(display("shape mismatch: expected {expected}, got {observed}"))]
    ShapeMismatch { expected: Shape, observed: Shape },

    /// Rank disagreement between a transformation and its argument.
    #[snafu(display("rank mismatch: expected rank {expected}, got {observed}"))]
    RankMismatch { expected: usize, observed: usize },

    /// Ranges advance by positive steps only.
    #[snafu(display("range step must be positive, got {step}"))]
    InvalidRangeStep { step: i64 },

    /// Broadcasting is only defined when one side is size-one or both agree.
    #[snafu(display("cannot broadcast range {lhs} against {rhs}"))]
    RangeBroadcastMismatch { lhs: Range, rhs: Range },

    /// Composition of transformations with incompatible ranks.
    #[snafu(display(
        "cannot compose transformations: inner map produces rank {produced}, outer map consumes rank {consumed}"
    ))]
    ComposeRankMismatch { produced: usize, consumed: usize },

    /// The outer map pins an axis to a value the inner map cannot produce.
    #[snafu(display("composition is unsatisfiable: axis {axis} is pinned to {demanded}, which the inner map cannot reach"))]
    UnsatisfiableComposition { axis: usize, demanded: i64 },

    /// Inversion of a map that is not a bijection on its unconstrained axes.
    #[snafu(display("transformation is not invertible: {reason}"))]
    NonInvertible { reason: &'static str },

    /// An output axis references an input axis beyond the input rank.
    #[snafu(display("output axis {axis} references input axis {index}, but the input rank is {input_rank}"))]
    MaskIndexOutOfRange { axis: usize, index: usize, input_rank: usize },

    /// An input-mask constant lies outside the shape being transformed.
    #[snafu(display("input axis {axis} demands the constant {constant}, which is outside {range}"))]
    ConstantNotInShape { axis: usize, constant: i64, range: Range },

    /// A point was passed to a transformation whose mask excludes it.
    #[snafu(display("index component {axis} is {got}, but the transformation requires {required}"))]
    InputConstraintViolated { axis: usize, required: i64, got: i64 },

    /// `program_buffer` lookup on an unknown number.
    #[snafu(display("no buffer with number {number}"))]
    BufferNumberNotFound { number: u32 },

    /// `program_kernel` lookup on an unknown number.
    #[snafu(display("no kernel with number {number}"))]
    KernelNumberNotFound { number: u32 },

    /// External array has a different rank than the buffer.
    #[snafu(display("array rank {array_rank} does not match buffer rank {buffer_rank}"))]
    ArrayRankMismatch { array_rank: usize, buffer_rank: usize },

    /// External array disagrees with the buffer on one dimension.
    #[snafu(display("array dimension {axis} has size {array_size}, buffer expects {buffer_size}"))]
    ArrayDimensionMismatch { axis: usize, array_size: u64, buffer_size: u64 },

    /// External array has a different element type than the buffer.
    #[snafu(display("array element type {array_ntype:?} does not match buffer element type {buffer_ntype:?}"))]
    ArrayNTypeMismatch { array_ntype: NType, buffer_ntype: NType },

    /// A well-formedness check failed.
    #[snafu(display("program invariant violated: {what}"))]
    InvariantViolated { what: String },
}
