//! Dense tensor literals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::{DType, Shape};

/// Flat, row-major element storage tagged with its dtype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    /// Booleans.
    Bool(Vec<bool>),
    /// 8-bit signed integers.
    Int8(Vec<i8>),
    /// 32-bit signed integers.
    Int32(Vec<i32>),
    /// 64-bit signed integers.
    Int64(Vec<i64>),
    /// 8-bit unsigned integers.
    UInt8(Vec<u8>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
}

impl TensorData {
    /// The dtype of the stored elements.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int8(_) => DType::Int8,
            Self::Int32(_) => DType::Int32,
            Self::Int64(_) => DType::Int64,
            Self::UInt8(_) => DType::UInt8,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    /// Number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    /// Returns true if no elements are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_element(&self, f: &mut fmt::Formatter<'_>, i: usize) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v[i]),
            Self::Int8(v) => write!(f, "{}", v[i]),
            Self::Int32(v) => write!(f, "{}", v[i]),
            Self::Int64(v) => write!(f, "{}", v[i]),
            Self::UInt8(v) => write!(f, "{}", v[i]),
            Self::Float32(v) => write!(f, "{}", v[i]),
            Self::Float64(v) => write!(f, "{}", v[i]),
        }
    }
}

/// Errors constructing a literal.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    /// Element count does not match the shape.
    #[error("literal of shape {shape} needs {expected} elements, got {got}")]
    ElementCount {
        /// The declared shape.
        shape: Shape,
        /// `product(shape)`.
        expected: usize,
        /// Number of elements supplied.
        got: usize,
    },
}

/// An immutable dense tensor value known at compile time.
///
/// Invariant: `data.len() == shape.num_elements()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorLiteral {
    shape: Shape,
    data: TensorData,
}

/// Literals longer than this are elided when printed.
const DISPLAY_LIMIT: usize = 32;

impl TensorLiteral {
    /// Creates a literal, checking the element count against the shape.
    ///
    /// # Errors
    ///
    /// Returns [`LiteralError::ElementCount`] if `data` does not hold
    /// exactly `product(shape)` elements.
    pub fn new(shape: Shape, data: TensorData) -> Result<Self, LiteralError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(LiteralError::ElementCount {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a literal from a typed vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the element count does not match `dims`.
    pub fn from_vec<T: Element>(dims: &[usize], values: Vec<T>) -> Result<Self, LiteralError> {
        Self::new(Shape::new(dims.iter().copied()), T::into_data(values))
    }

    /// Creates a rank-0 literal.
    #[must_use]
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            shape: Shape::scalar(),
            data: T::into_data(vec![value]),
        }
    }

    /// Creates a rank-1 literal.
    #[must_use]
    pub fn vector<T: Element>(values: Vec<T>) -> Self {
        Self {
            shape: Shape::new([values.len()]),
            data: T::into_data(values),
        }
    }

    /// The literal's shape.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The literal's element type.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// The flat element storage.
    #[must_use]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Borrows the elements as `T`, if the dtype matches.
    #[must_use]
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Number of elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// Returns the same data under a new shape with equal element count.
    pub(crate) fn with_shape(&self, shape: Shape) -> Self {
        debug_assert_eq!(shape.num_elements(), self.data.len());
        Self {
            shape,
            data: self.data.clone(),
        }
    }

    /// Builds a literal from parts the evaluator already knows are consistent.
    pub(crate) fn from_parts(shape: Shape, data: TensorData) -> Self {
        debug_assert_eq!(shape.num_elements(), data.len());
        Self { shape, data }
    }

    fn write_nested(&self, f: &mut fmt::Formatter<'_>, axis: usize, offset: usize) -> fmt::Result {
        let dims = self.shape.dims();
        if axis == dims.len() {
            return self.data.write_element(f, offset);
        }
        let stride: usize = dims[axis + 1..].iter().product();
        write!(f, "[")?;
        for i in 0..dims[axis] {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write_nested(f, axis + 1, offset + i * stride)?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for TensorLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} ", self.dtype(), self.shape)?;
        if self.num_elements() > DISPLAY_LIMIT {
            return write!(f, "<{} elements>", self.num_elements());
        }
        self.write_nested(f, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count_checked() {
        let err = TensorLiteral::from_vec(&[2, 3], vec![1.0f32; 5]).unwrap_err();
        assert_eq!(
            err,
            LiteralError::ElementCount {
                shape: Shape::new([2, 3]),
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn test_typed_access() {
        let lit = TensorLiteral::vector(vec![1i64, 2, 3]);
        assert_eq!(lit.dtype(), DType::Int64);
        assert_eq!(lit.as_slice::<i64>(), Some(&[1i64, 2, 3][..]));
        assert_eq!(lit.as_slice::<f32>(), None);
    }

    #[test]
    fn test_display_nested() {
        let lit = TensorLiteral::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap();
        assert_eq!(lit.to_string(), "i32[2,2] [[1, 2], [3, 4]]");
        assert_eq!(TensorLiteral::scalar(2.5f64).to_string(), "f64[] 2.5");
    }

    #[test]
    fn test_display_elides_large_literals() {
        let lit = TensorLiteral::vector(vec![0u8; 100]);
        assert_eq!(lit.to_string(), "u8[100] <100 elements>");
    }
}
