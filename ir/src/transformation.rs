//! Affine index transformations.
//!
//! A [`Transformation`] maps an input space of rank `r_in` to an output
//! space of rank `r_out`. Each output axis is either a constant or an
//! affine image `offset + scaling * input[axis]` of one input axis; each
//! input axis may additionally be pinned to a constant by the input mask.
//! Loads and stores carry transformations from the iteration space to a
//! buffer's index space, and kernel/buffer rewrites work by composing new
//! maps onto the recorded ones.

use std::fmt;

use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use crate::error::{
    ComposeRankMismatchSnafu, ConstantNotInShapeSnafu, InputConstraintViolatedSnafu, MaskIndexOutOfRangeSnafu,
    NonInvertibleSnafu, RankMismatchSnafu, Result, UnsatisfiableCompositionSnafu,
};
use crate::range::Range;
use crate::shape::Shape;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transformation {
    /// Per input axis: `Some(c)` pins the axis to the constant `c`.
    input_mask: SmallVec<[Option<i64>; 4]>,
    /// Per output axis: the input axis it reads, or `None` for a constant.
    output_mask: SmallVec<[Option<usize>; 4]>,
    scalings: SmallVec<[i64; 4]>,
    offsets: SmallVec<[i64; 4]>,
}

#[bon::bon]
impl Transformation {
    /// General constructor. Omitted fields default to the identity-like
    /// choice: a free input mask, `output_mask[k] = k` where that input
    /// axis exists, unit scalings, zero offsets.
    #[builder]
    pub fn affine(
        input_rank: usize,
        output_rank: usize,
        input_mask: Option<Vec<Option<i64>>>,
        output_mask: Option<Vec<Option<usize>>>,
        scalings: Option<Vec<i64>>,
        offsets: Option<Vec<i64>>,
    ) -> Result<Self> {
        let input_mask: SmallVec<[Option<i64>; 4]> = match input_mask {
            Some(mask) => {
                ensure!(mask.len() == input_rank, RankMismatchSnafu { expected: input_rank, observed: mask.len() });
                mask.into()
            }
            None => smallvec![None; input_rank],
        };
        let output_mask: SmallVec<[Option<usize>; 4]> = match output_mask {
            Some(mask) => {
                ensure!(mask.len() == output_rank, RankMismatchSnafu { expected: output_rank, observed: mask.len() });
                mask.into()
            }
            None => (0..output_rank).map(|k| (k < input_rank).then_some(k)).collect(),
        };
        for (axis, mask) in output_mask.iter().enumerate() {
            if let Some(index) = *mask {
                ensure!(index < input_rank, MaskIndexOutOfRangeSnafu { axis, index, input_rank });
            }
        }
        let scalings: SmallVec<[i64; 4]> = match scalings {
            Some(scalings) => {
                ensure!(
                    scalings.len() == output_rank,
                    RankMismatchSnafu { expected: output_rank, observed: scalings.len() }
                );
                scalings.into()
            }
            None => smallvec![1; output_rank],
        };
        let offsets: SmallVec<[i64; 4]> = match offsets {
            Some(offsets) => {
                ensure!(
                    offsets.len() == output_rank,
                    RankMismatchSnafu { expected: output_rank, observed: offsets.len() }
                );
                offsets.into()
            }
            None => smallvec![0; output_rank],
        };
        let mut transformation = Self { input_mask, output_mask, scalings, offsets };
        transformation.normalize();
        Ok(transformation)
    }
}

impl Transformation {
    /// The identity map on `rank` axes.
    pub fn identity(rank: usize) -> Self {
        Self {
            input_mask: smallvec![None; rank],
            output_mask: (0..rank).map(Some).collect(),
            scalings: smallvec![1; rank],
            offsets: smallvec![0; rank],
        }
    }

    /// Axis reordering: output axis `k` reads input axis `axes[k]`.
    pub fn permutation(axes: &[usize]) -> Self {
        debug_assert!({
            let mut seen = axes.to_vec();
            seen.sort_unstable();
            seen.iter().copied().eq(0..axes.len())
        });
        Self {
            input_mask: smallvec![None; axes.len()],
            output_mask: axes.iter().map(|&axis| Some(axis)).collect(),
            scalings: smallvec![1; axes.len()],
            offsets: smallvec![0; axes.len()],
        }
    }

    pub fn input_rank(&self) -> usize {
        self.input_mask.len()
    }

    pub fn output_rank(&self) -> usize {
        self.output_mask.len()
    }

    pub fn input_mask(&self) -> &[Option<i64>] {
        &self.input_mask
    }

    pub fn output_mask(&self) -> &[Option<usize>] {
        &self.output_mask
    }

    pub fn scalings(&self) -> &[i64] {
        &self.scalings
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Constant outputs carry scaling 0; a zero scaling means a constant
    /// output. Establishes that equivalence after construction.
    fn normalize(&mut self) {
        for k in 0..self.output_rank() {
            if self.output_mask[k].is_none() {
                self.scalings[k] = 0;
            } else if self.scalings[k] == 0 {
                self.output_mask[k] = None;
            }
        }
    }

    pub fn is_identity(&self) -> bool {
        self.input_rank() == self.output_rank()
            && self.input_mask.iter().all(Option::is_none)
            && self.output_mask.iter().enumerate().all(|(k, mask)| *mask == Some(k))
            && self.scalings.iter().all(|&s| s == 1)
            && self.offsets.iter().all(|&o| o == 0)
    }

    /// Functional composition: `(self ∘ inner)(x) = self(inner(x))`.
    ///
    /// Input-mask constraints of `self` are pulled back through `inner`;
    /// a constraint that `inner` cannot satisfy, or that contradicts an
    /// existing constraint, makes the composition unsatisfiable.
    pub fn compose(&self, inner: &Self) -> Result<Self> {
        ensure!(
            inner.output_rank() == self.input_rank(),
            ComposeRankMismatchSnafu { produced: inner.output_rank(), consumed: self.input_rank() }
        );

        let mut input_mask = inner.input_mask.clone();
        for (axis, constraint) in self.input_mask.iter().enumerate() {
            let Some(demanded) = *constraint else { continue };
            match inner.output_mask[axis] {
                None => {
                    ensure!(inner.offsets[axis] == demanded, UnsatisfiableCompositionSnafu { axis, demanded });
                }
                Some(source) => {
                    let delta = demanded - inner.offsets[axis];
                    let scaling = inner.scalings[axis];
                    ensure!(delta % scaling == 0, UnsatisfiableCompositionSnafu { axis, demanded });
                    let required = delta / scaling;
                    match input_mask[source] {
                        None => input_mask[source] = Some(required),
                        Some(existing) => {
                            ensure!(existing == required, UnsatisfiableCompositionSnafu { axis, demanded });
                        }
                    }
                }
            }
        }

        let rank = self.output_rank();
        let mut output_mask: SmallVec<[Option<usize>; 4]> = smallvec![None; rank];
        let mut scalings: SmallVec<[i64; 4]> = smallvec![0; rank];
        let mut offsets: SmallVec<[i64; 4]> = smallvec![0; rank];
        for k in 0..rank {
            match self.output_mask[k] {
                None => offsets[k] = self.offsets[k],
                Some(j) => {
                    offsets[k] = self.offsets[k] + self.scalings[k] * inner.offsets[j];
                    if let Some(source) = inner.output_mask[j] {
                        output_mask[k] = Some(source);
                        scalings[k] = self.scalings[k] * inner.scalings[j];
                    }
                }
            }
        }

        let mut composed = Self { input_mask, output_mask, scalings, offsets };
        composed.normalize();
        Ok(composed)
    }

    /// Partial inverse.
    ///
    /// Defined iff the map is a bijection on its unconstrained axes: every
    /// free input axis is read by exactly one output axis, with scaling ±1
    /// (an integer map cannot express a fractional inverse scaling).
    /// Constant outputs become input constraints of the inverse and pinned
    /// inputs become constant outputs.
    pub fn invert(&self) -> Result<Self> {
        let r_in = self.input_rank();
        let r_out = self.output_rank();

        let mut input_mask: SmallVec<[Option<i64>; 4]> = smallvec![None; r_out];
        for k in 0..r_out {
            if self.output_mask[k].is_none() {
                input_mask[k] = Some(self.offsets[k]);
            }
        }

        let mut output_mask: SmallVec<[Option<usize>; 4]> = smallvec![None; r_in];
        let mut scalings: SmallVec<[i64; 4]> = smallvec![0; r_in];
        let mut offsets: SmallVec<[i64; 4]> = smallvec![0; r_in];
        for axis in 0..r_in {
            if let Some(constant) = self.input_mask[axis] {
                offsets[axis] = constant;
                continue;
            }
            let mut source = None;
            for k in 0..r_out {
                if self.output_mask[k] == Some(axis) {
                    ensure!(
                        source.is_none(),
                        NonInvertibleSnafu { reason: "an input axis is read by more than one output axis" }
                    );
                    source = Some(k);
                }
            }
            let Some(k) = source else {
                return NonInvertibleSnafu { reason: "an unconstrained input axis is not read by any output axis" }
                    .fail();
            };
            let scaling = self.scalings[k];
            ensure!(scaling == 1 || scaling == -1, NonInvertibleSnafu { reason: "a scaling is neither 1 nor -1" });
            output_mask[axis] = Some(k);
            scalings[axis] = scaling;
            offsets[axis] = -scaling * self.offsets[k];
        }

        Ok(Self { input_mask, output_mask, scalings, offsets })
    }

    /// Image of a shape under this transformation.
    ///
    /// The shape must have the input rank, and every pinned input axis
    /// must contain its constant. Negative scalings renormalize to
    /// positive-step ranges over the same point set.
    pub fn apply_to_shape(&self, shape: &Shape) -> Result<Shape> {
        ensure!(
            shape.rank() == self.input_rank(),
            RankMismatchSnafu { expected: self.input_rank(), observed: shape.rank() }
        );
        for (axis, constraint) in self.input_mask.iter().enumerate() {
            if let Some(constant) = *constraint {
                let range = shape.range(axis);
                ensure!(range.contains(constant), ConstantNotInShapeSnafu { axis, constant, range: *range });
            }
        }

        let mut ranges: SmallVec<[Range; 4]> = SmallVec::with_capacity(self.output_rank());
        for k in 0..self.output_rank() {
            let range = match self.output_mask[k] {
                None => Range::new(self.offsets[k], 1, 1)?,
                Some(axis) => {
                    let range = shape.range(axis);
                    let scaling = self.scalings[k];
                    let offset = self.offsets[k];
                    if range.size() <= 1 {
                        Range::new(offset + scaling * range.start(), 1, range.size())?
                    } else {
                        let start =
                            if scaling > 0 { offset + scaling * range.start() } else { offset + scaling * range.last() };
                        Range::new(start, scaling.abs() * range.step(), range.size())?
                    }
                }
            };
            ranges.push(range);
        }
        Ok(Shape::new(ranges))
    }

    /// Image of a single index point.
    pub fn apply_to_index(&self, index: &[i64]) -> Result<SmallVec<[i64; 4]>> {
        ensure!(
            index.len() == self.input_rank(),
            RankMismatchSnafu { expected: self.input_rank(), observed: index.len() }
        );
        for (axis, constraint) in self.input_mask.iter().enumerate() {
            if let Some(required) = *constraint {
                ensure!(index[axis] == required, InputConstraintViolatedSnafu { axis, required, got: index[axis] });
            }
        }
        Ok((0..self.output_rank())
            .map(|k| match self.output_mask[k] {
                None => self.offsets[k],
                Some(axis) => self.offsets[k] + self.scalings[k] * index[axis],
            })
            .collect())
    }
}

impl fmt::Display for Transformation {
    /// Prints as `(i0 i1) -> (2*i1+1 i0 5)`, with pinned inputs shown as
    /// their constants.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (axis, constraint) in self.input_mask.iter().enumerate() {
            if axis > 0 {
                write!(f, " ")?;
            }
            match constraint {
                Some(constant) => write!(f, "{constant}")?,
                None => write!(f, "i{axis}")?,
            }
        }
        write!(f, ") -> (")?;
        for k in 0..self.output_rank() {
            if k > 0 {
                write!(f, " ")?;
            }
            match self.output_mask[k] {
                None => write!(f, "{}", self.offsets[k])?,
                Some(axis) => {
                    match self.scalings[k] {
                        1 => write!(f, "i{axis}")?,
                        -1 => write!(f, "-i{axis}")?,
                        scaling => write!(f, "{scaling}*i{axis}")?,
                    }
                    match self.offsets[k] {
                        0 => {}
                        offset if offset > 0 => write!(f, "+{offset}")?,
                        offset => write!(f, "{offset}")?,
                    }
                }
            }
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
