//! # tfold Tensor Literals
//!
//! Compile-time tensor values and the constant evaluator used by the
//! folding rules of the rewrite pass.
//!
//! ## Overview
//!
//! A [`TensorLiteral`] is an immutable, dense, row-major array with a static
//! [`Shape`] and a [`DType`]. The graph shares literals by `Arc`, so a literal
//! can be read from any thread once built.
//!
//! The [`eval`] module computes new literals from existing ones:
//!
//! | Operation | Function |
//! |-----------|----------|
//! | `Add`, `Sub`, `Mul`, `Div` with broadcasting | [`eval::binary`] |
//! | `Neg`, `Sqrt` | [`eval::unary`] |
//! | axis permutation | [`eval::transpose`] |
//! | size-1 axis insertion | [`eval::unsqueeze`] |
//!
//! Evaluation failures carry an [`EvalError`] that is either recoverable
//! (the fold is skipped) or an internal inconsistency (the pass aborts).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod eval;
mod element;
mod literal;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use element::Element;
pub use eval::{BinaryOp, EvalError, UnaryOp};
pub use literal::{LiteralError, TensorData, TensorLiteral};

/// Tensor element types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DType {
    /// Boolean (1 byte).
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
}

impl DType {
    /// Returns true if this is a signed type.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int32 | Self::Int64 | Self::Float32 | Self::Float64
        )
    }

    /// Short name used in printed IR (`f32`, `i64`, ...).
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "i8",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt8 => "u8",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Static tensor shape (list of dimension sizes).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(SmallVec<[usize; 4]>);

impl Shape {
    /// Creates a shape from dimension sizes.
    #[must_use]
    pub fn new(dims: impl IntoIterator<Item = usize>) -> Self {
        Self(dims.into_iter().collect())
    }

    /// Creates a scalar shape (rank 0).
    #[must_use]
    pub fn scalar() -> Self {
        Self(SmallVec::new())
    }

    /// Returns the rank (number of dimensions).
    #[must_use]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Returns the dimensions.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Returns the total number of elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major element strides.
    #[must_use]
    pub fn contiguous_strides(&self) -> SmallVec<[usize; 4]> {
        let mut strides = SmallVec::from_elem(0, self.rank());
        let mut stride = 1;
        for (i, dim) in self.0.iter().enumerate().rev() {
            strides[i] = stride;
            stride *= dim;
        }
        strides
    }

    /// Broadcasts two shapes by the NumPy rules: trailing dimensions are
    /// aligned and each pair must be equal or contain a 1.
    ///
    /// Returns `None` if the shapes are incompatible.
    #[must_use]
    pub fn broadcast(a: &Shape, b: &Shape) -> Option<Shape> {
        let rank = a.rank().max(b.rank());
        let mut dims = SmallVec::with_capacity(rank);
        for i in 0..rank {
            let da = if i < rank - a.rank() { 1 } else { a.0[i - (rank - a.rank())] };
            let db = if i < rank - b.rank() { 1 } else { b.0[i - (rank - b.rank())] };
            if da == db || db == 1 {
                dims.push(da);
            } else if da == 1 {
                dims.push(db);
            } else {
                return None;
            }
        }
        Some(Self(dims))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// An axis specification; negative values count from the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Axis(pub i64);

impl Axis {
    /// Creates a new axis.
    #[must_use]
    pub const fn new(axis: i64) -> Self {
        Self(axis)
    }

    /// Normalizes a potentially negative axis to a positive index.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub const fn normalize(self, rank: usize) -> Option<usize> {
        let axis = if self.0 < 0 { rank as i64 + self.0 } else { self.0 };
        if axis >= 0 && (axis as usize) < rank {
            Some(axis as usize)
        } else {
            None
        }
    }
}

/// A permutation of tensor axes for transpose.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation(SmallVec<[usize; 4]>);

impl Permutation {
    /// Creates a new permutation.
    #[must_use]
    pub fn new(perm: impl IntoIterator<Item = usize>) -> Self {
        Self(perm.into_iter().collect())
    }

    /// The axis-reversing permutation of the given rank.
    #[must_use]
    pub fn reversed(rank: usize) -> Self {
        Self((0..rank).rev().collect())
    }

    /// Returns the permutation as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Returns true if this is the identity permutation.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// Returns true if this is a permutation of `0..rank`.
    #[must_use]
    pub fn is_valid_for(&self, rank: usize) -> bool {
        if self.0.len() != rank {
            return false;
        }
        let mut seen: SmallVec<[bool; 4]> = SmallVec::from_elem(false, rank);
        for &p in &self.0 {
            if p >= rank || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_signedness() {
        assert!(DType::Int8.is_signed());
        assert!(DType::Float64.is_signed());
        assert!(!DType::UInt8.is_signed());
        assert!(!DType::Bool.is_signed());
    }

    #[test]
    fn test_shape_num_elements() {
        let shape = Shape::new([2, 3, 4]);
        assert_eq!(shape.num_elements(), 24);
        assert_eq!(shape.rank(), 3);
        assert_eq!(Shape::scalar().num_elements(), 1);
        assert_eq!(Shape::new([3, 0]).num_elements(), 0);
    }

    #[test]
    fn test_contiguous_strides() {
        assert_eq!(Shape::new([2, 3, 4]).contiguous_strides().as_slice(), &[12, 4, 1]);
        assert!(Shape::scalar().contiguous_strides().is_empty());
    }

    #[test]
    fn test_broadcast_rules() {
        let b = |x: &[usize], y: &[usize]| Shape::broadcast(&Shape::new(x.to_vec()), &Shape::new(y.to_vec()));
        assert_eq!(b(&[3, 1], &[1, 4]), Some(Shape::new([3, 4])));
        assert_eq!(b(&[2, 3], &[3]), Some(Shape::new([2, 3])));
        assert_eq!(b(&[], &[5]), Some(Shape::new([5])));
        assert_eq!(b(&[1, 1], &[1]), Some(Shape::new([1, 1])));
        assert_eq!(b(&[0], &[1]), Some(Shape::new([0])));
        assert_eq!(b(&[2, 3], &[4]), None);
    }

    #[test]
    fn test_axis_normalize() {
        assert_eq!(Axis::new(-1).normalize(3), Some(2));
        assert_eq!(Axis::new(1).normalize(3), Some(1));
        assert_eq!(Axis::new(5).normalize(3), None);
        assert_eq!(Axis::new(-4).normalize(3), None);
    }

    #[test]
    fn test_permutation_validity() {
        assert!(Permutation::new([0, 1, 2]).is_identity());
        assert!(!Permutation::new([2, 0, 1]).is_identity());
        assert!(Permutation::new([2, 0, 1]).is_valid_for(3));
        assert!(!Permutation::new([0, 0, 1]).is_valid_for(3));
        assert!(!Permutation::new([0, 1]).is_valid_for(3));
        assert_eq!(Permutation::reversed(3).as_slice(), &[2, 1, 0]);
    }
}
