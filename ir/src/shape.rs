//! Shapes: ordered sequences of ranges.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{Result, ShapeMismatchSnafu};
use crate::range::{Range, broadcast_ranges};

/// The index space of a buffer or of a kernel iteration.
///
/// A shape is an ordered sequence of [`Range`]s; its *rank* is the number
/// of ranges and its *size* the product of their sizes. Shapes are
/// immutable values: transformations build new ones.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    ranges: SmallVec<[Range; 4]>,
}

impl Shape {
    pub fn new(ranges: impl IntoIterator<Item = Range>) -> Self {
        Self { ranges: ranges.into_iter().collect() }
    }

    /// The rank-zero shape with a single element.
    pub fn scalar() -> Self {
        Self::default()
    }

    /// Coerce a dimension list into a shape of contiguous ranges.
    pub fn from_dimensions(dimensions: &[u64]) -> Self {
        Self { ranges: dimensions.iter().map(|&size| Range::contiguous(size)).collect() }
    }

    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of points; the empty product is 1.
    pub fn size(&self) -> u64 {
        self.ranges.iter().map(Range::size).product()
    }

    pub fn dimensions(&self) -> SmallVec<[u64; 4]> {
        self.ranges.iter().map(Range::size).collect()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range(&self, axis: usize) -> &Range {
        &self.ranges[axis]
    }
}

/// Broadcast two shapes of equal rank against each other, axis by axis.
///
/// Rank disagreement reports both shapes; axis disagreement reports the
/// offending ranges.
pub fn broadcast_shapes(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
    ensure!(lhs.rank() == rhs.rank(), ShapeMismatchSnafu { expected: lhs.clone(), observed: rhs.clone() });
    lhs.ranges().iter().zip(rhs.ranges()).map(|(lhs, rhs)| broadcast_ranges(lhs, rhs)).collect()
}

impl Ord for Shape {
    /// Total order that groups equal shapes: rank first, then ranges
    /// lexicographically by `(start, step, size)`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| self.ranges.cmp(&other.ranges))
    }
}

impl PartialOrd for Shape {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromIterator<Range> for Shape {
    fn from_iter<I: IntoIterator<Item = Range>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (axis, range) in self.ranges.iter().enumerate() {
            if axis > 0 {
                write!(f, " ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Shape construction sugar.
///
/// - `shape![4, 5]` — contiguous ranges from dimension sizes
/// - `shape![(0, 2, 5), (10, 1, 3)]` — explicit `(start, step, size)`
///   triples; panics on a non-positive step
#[macro_export]
macro_rules! shape {
    () => {
        $crate::shape::Shape::scalar()
    };
    ($(($start:expr, $step:expr, $size:expr)),+ $(,)?) => {
        $crate::shape::Shape::new([
            $($crate::range::Range::new($start, $step, $size).expect("shape!: step must be positive")),+
        ])
    };
    ($($size:expr),+ $(,)?) => {
        $crate::shape::Shape::from_dimensions(&[$($size),+])
    };
}
