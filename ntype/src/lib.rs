//! Element-type descriptors for the lazir IR.
//!
//! An [`NType`] describes the element type of a buffer: its storage width,
//! a stable ordinal used as a grouping key, and its place in the promotion
//! lattice. The IR itself treats ntypes as opaque handles; everything that
//! interprets them (promotion, classification) lives here.

use enumset::EnumSet;

/// Element-type descriptor.
///
/// The explicit discriminants are stable and double as the grouping index
/// reported by [`NType::index`]. Lower discriminants are more specific in
/// the promotion lattice, so a least upper bound is the minimum of the
/// common lattice parents.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
#[derive(enumset::EnumSetType)]
#[cfg_attr(feature = "proptest", derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[enumset(repr = "u16")]
pub enum NType {
    Bool = 0,

    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,

    UInt8 = 5,
    UInt16 = 6,
    UInt32 = 7,
    UInt64 = 8,

    Float16 = 9,
    Float32 = 10,
    Float64 = 11,

    Complex64 = 12,
    Complex128 = 13,
}

impl NType {
    /// Storage width in bits.
    pub const fn bits(&self) -> u64 {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 | Self::Float16 => 16,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 64,
            Self::Complex128 => 128,
        }
    }

    /// Stable ordinal of this descriptor, used as a sort and grouping key.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    pub const fn is_complex(&self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    const fn promotion_lattice(self) -> &'static [Self] {
        use NType::*;
        match self {
            Bool => &[Int8, UInt8],
            Int8 => &[Int16],
            Int16 => &[Int32],
            Int32 => &[Int64],
            Int64 => &[Float32],
            UInt8 => &[Int16, UInt16],
            UInt16 => &[Int32, UInt32],
            UInt32 => &[Int64, UInt64],
            UInt64 => &[Float32],
            Float16 => &[Float32],
            Float32 => &[Float64, Complex64],
            Float64 => &[Complex128],
            Complex64 => &[Complex128],
            Complex128 => &[],
        }
    }

    fn recursive_parents(self) -> EnumSet<Self> {
        self.promotion_lattice()
            .iter()
            .fold(EnumSet::only(self), |ntypes, &parent| ntypes.union(parent.recursive_parents()))
    }

    /// Least upper bound of two element types in the promotion lattice.
    ///
    /// This is `upgraded_array_element_ntype`: the most specific type both
    /// arguments can be widened to without losing their classification.
    pub fn upgraded(self, other: Self) -> Self {
        self.recursive_parents()
            .intersection(other.recursive_parents())
            .iter()
            .min()
            .unwrap_or(Self::Complex128)
    }
}

/// A single element value, in the value form of an [`NType`].
///
/// Used where external functions are evaluated for reference purposes;
/// backends are free to work with packed representations instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
}

impl Value {
    /// The widest descriptor that can represent this value exactly.
    pub const fn ntype(&self) -> NType {
        match self {
            Self::Bool(_) => NType::Bool,
            Self::Int(_) => NType::Int64,
            Self::UInt(_) => NType::UInt64,
            Self::Float(_) => NType::Float64,
            Self::Complex(..) => NType::Complex128,
        }
    }
}
