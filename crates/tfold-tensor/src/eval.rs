//! Constant evaluator.
//!
//! Pure functions computing the literal result of an elementwise binary op,
//! an elementwise unary op, a transpose, or an unsqueeze applied to literal
//! operands. Binary ops follow NumPy broadcasting; both operands must share
//! one dtype, which is also the result dtype.
//!
//! ## Failure classes
//!
//! | Error | Meaning | Recoverable |
//! |-------|---------|-------------|
//! | [`EvalError::DivisionByZero`] | integer divisor element is 0 | yes |
//! | [`EvalError::Overflow`] | integer result out of range | yes |
//! | [`EvalError::UnsupportedDType`] | op undefined for the dtype | yes |
//! | [`EvalError::DTypeMismatch`] | operand dtypes differ | no |
//! | [`EvalError::ShapeMismatch`] | shapes do not broadcast | no |
//! | [`EvalError::InvalidPermutation`] | `perm` is not a permutation | no |
//! | [`EvalError::NegativePermutation`] | a `perm` entry is negative | no |
//! | [`EvalError::InvalidAxis`] | unsqueeze axis out of range / repeated | no |
//!
//! Floating-point division by zero and square roots of negative values are
//! not errors: they produce IEEE infinities and NaNs.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::element::Arith;
use crate::literal::{TensorData, TensorLiteral};
use crate::{Axis, DType, Permutation, Shape};

/// Elementwise binary operations the evaluator can fold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division (truncating for integers).
    Div,
}

impl BinaryOp {
    /// Lower-case operator name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}

/// Elementwise unary operations the evaluator can fold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation.
    Neg,
    /// Square root.
    Sqrt,
}

impl UnaryOp {
    /// Lower-case operator name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Sqrt => "sqrt",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while evaluating a fold.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Operand dtypes differ.
    #[error("dtype mismatch in {op}: {lhs} vs {rhs}")]
    DTypeMismatch {
        /// The operation.
        op: &'static str,
        /// Left operand dtype.
        lhs: DType,
        /// Right operand dtype.
        rhs: DType,
    },

    /// Operand shapes cannot be broadcast together.
    #[error("shapes {lhs} and {rhs} do not broadcast")]
    ShapeMismatch {
        /// Left operand shape.
        lhs: Shape,
        /// Right operand shape.
        rhs: Shape,
    },

    /// The operation has no arithmetic for this dtype.
    #[error("{op} is not defined for {dtype}")]
    UnsupportedDType {
        /// The operation.
        op: &'static str,
        /// The operand dtype.
        dtype: DType,
    },

    /// An integer divisor element is zero.
    #[error("integer division by zero ({dtype})")]
    DivisionByZero {
        /// The operand dtype.
        dtype: DType,
    },

    /// An integer result does not fit in the dtype.
    #[error("{op} overflows {dtype}")]
    Overflow {
        /// The operation.
        op: &'static str,
        /// The operand dtype.
        dtype: DType,
    },

    /// `perm` is not a permutation of the operand's axes.
    #[error("invalid permutation {perm:?} for rank {rank}")]
    InvalidPermutation {
        /// The permutation given.
        perm: Vec<usize>,
        /// The operand rank.
        rank: usize,
    },

    /// A `perm` attribute entry is negative.
    #[error("negative permutation entry {entry}")]
    NegativePermutation {
        /// The entry given.
        entry: i64,
    },

    /// An unsqueeze axis is out of range or repeated.
    #[error("invalid unsqueeze axis {axis} for output rank {rank}")]
    InvalidAxis {
        /// The axis given.
        axis: i64,
        /// The output rank.
        rank: usize,
    },
}

impl EvalError {
    /// Returns true if the fold should simply be skipped.
    ///
    /// The remaining errors mean the graph handed to the pass was not
    /// consistently typed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDType { .. } | Self::DivisionByZero { .. } | Self::Overflow { .. }
        )
    }
}

/// Evaluates `lhs op rhs` elementwise with broadcasting.
///
/// # Errors
///
/// See the module documentation for the failure classes.
pub fn binary(op: BinaryOp, lhs: &TensorLiteral, rhs: &TensorLiteral) -> Result<TensorLiteral, EvalError> {
    if lhs.dtype() != rhs.dtype() {
        return Err(EvalError::DTypeMismatch {
            op: op.name(),
            lhs: lhs.dtype(),
            rhs: rhs.dtype(),
        });
    }
    let out_shape = Shape::broadcast(lhs.shape(), rhs.shape()).ok_or_else(|| EvalError::ShapeMismatch {
        lhs: lhs.shape().clone(),
        rhs: rhs.shape().clone(),
    })?;

    let lhs_strides = broadcast_strides(lhs.shape(), &out_shape);
    let rhs_strides = broadcast_strides(rhs.shape(), &out_shape);

    macro_rules! zip_numeric {
        ($($variant:ident),*) => {
            match (lhs.data(), rhs.data()) {
                $(
                    (TensorData::$variant(a), TensorData::$variant(b)) => TensorData::$variant(
                        zip_broadcast(a, &lhs_strides, b, &rhs_strides, &out_shape, |x, y| {
                            Arith::binary(op, x, y)
                        })?,
                    ),
                )*
                _ => {
                    return Err(EvalError::UnsupportedDType {
                        op: op.name(),
                        dtype: lhs.dtype(),
                    })
                }
            }
        };
    }

    let data = zip_numeric!(Int8, Int32, Int64, UInt8, Float32, Float64);
    Ok(TensorLiteral::from_parts(out_shape, data))
}

/// Evaluates `op value` elementwise.
///
/// # Errors
///
/// Returns a recoverable error if `op` is undefined for the dtype or an
/// integer negation overflows.
pub fn unary(op: UnaryOp, value: &TensorLiteral) -> Result<TensorLiteral, EvalError> {
    macro_rules! map_numeric {
        ($($variant:ident),*) => {
            match value.data() {
                $(
                    TensorData::$variant(v) => TensorData::$variant(
                        v.iter()
                            .map(|&x| Arith::unary(op, x))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                )*
                TensorData::Bool(_) => {
                    return Err(EvalError::UnsupportedDType {
                        op: op.name(),
                        dtype: DType::Bool,
                    })
                }
            }
        };
    }

    let data = map_numeric!(Int8, Int32, Int64, UInt8, Float32, Float64);
    Ok(TensorLiteral::from_parts(value.shape().clone(), data))
}

/// Permutes the axes of `value`: output axis `i` is input axis `perm[i]`.
///
/// Defined for every dtype, since no arithmetic is involved.
///
/// # Errors
///
/// Returns [`EvalError::InvalidPermutation`] if `perm` is not a permutation
/// of `0..rank`.
pub fn transpose(value: &TensorLiteral, perm: &Permutation) -> Result<TensorLiteral, EvalError> {
    let rank = value.shape().rank();
    if !perm.is_valid_for(rank) {
        return Err(EvalError::InvalidPermutation {
            perm: perm.as_slice().to_vec(),
            rank,
        });
    }
    if perm.is_identity() {
        return Ok(value.clone());
    }

    let dims = value.shape().dims();
    let src_strides = value.shape().contiguous_strides();
    let out_shape = Shape::new(perm.as_slice().iter().map(|&p| dims[p]));
    let strides: SmallVec<[usize; 4]> = perm.as_slice().iter().map(|&p| src_strides[p]).collect();

    macro_rules! gather_any {
        ($($variant:ident),*) => {
            match value.data() {
                $(TensorData::$variant(v) => TensorData::$variant(gather(v, &strides, &out_shape)),)*
            }
        };
    }

    let data = gather_any!(Bool, Int8, Int32, Int64, UInt8, Float32, Float64);
    Ok(TensorLiteral::from_parts(out_shape, data))
}

/// Reads a `perm` attribute as a [`Permutation`].
///
/// Only the sign of each entry is checked here; [`transpose`] checks the
/// rest against the operand rank.
///
/// # Errors
///
/// Returns [`EvalError::NegativePermutation`] for the first negative entry.
pub fn permutation(perm: &[i64]) -> Result<Permutation, EvalError> {
    perm.iter()
        .map(|&entry| usize::try_from(entry).map_err(|_| EvalError::NegativePermutation { entry }))
        .collect::<Result<Vec<_>, _>>()
        .map(Permutation::new)
}

/// Inserts a size-1 dimension at each position in `axes`.
///
/// Axes index the output, whose rank is `rank + axes.len()`; negative axes
/// count from its end. The flat data is unchanged.
///
/// # Errors
///
/// Returns [`EvalError::InvalidAxis`] for an axis out of range or named twice.
pub fn unsqueeze(value: &TensorLiteral, axes: &[i64]) -> Result<TensorLiteral, EvalError> {
    let out_rank = value.shape().rank() + axes.len();
    let mut positions: SmallVec<[usize; 4]> = SmallVec::with_capacity(axes.len());
    for &axis in axes {
        let pos = Axis::new(axis)
            .normalize(out_rank)
            .ok_or(EvalError::InvalidAxis { axis, rank: out_rank })?;
        positions.push(pos);
    }
    positions.sort_unstable();
    if let Some(pair) = positions.windows(2).find(|w| w[0] == w[1]) {
        #[allow(clippy::cast_possible_wrap)]
        return Err(EvalError::InvalidAxis {
            axis: pair[0] as i64,
            rank: out_rank,
        });
    }

    let mut src = value.shape().dims().iter();
    let mut dims = SmallVec::<[usize; 4]>::with_capacity(out_rank);
    for pos in 0..out_rank {
        if positions.binary_search(&pos).is_ok() {
            dims.push(1);
        } else if let Some(&d) = src.next() {
            dims.push(d);
        }
    }
    Ok(value.with_shape(Shape::new(dims)))
}

/// Strides for reading an operand at each index of a broadcast output.
/// Broadcast (size-1 or missing) dimensions get stride 0.
fn broadcast_strides(shape: &Shape, out: &Shape) -> SmallVec<[usize; 4]> {
    let offset = out.rank() - shape.rank();
    let contiguous = shape.contiguous_strides();
    (0..out.rank())
        .map(|i| {
            if i < offset || shape.dims()[i - offset] == 1 {
                0
            } else {
                contiguous[i - offset]
            }
        })
        .collect()
}

/// Walks every index of `out` in row-major order, combining one element of
/// each operand read through its stride vector.
fn zip_broadcast<T: Copy, R>(
    a: &[T],
    a_strides: &[usize],
    b: &[T],
    b_strides: &[usize],
    out: &Shape,
    mut f: impl FnMut(T, T) -> Result<R, EvalError>,
) -> Result<Vec<R>, EvalError> {
    let n = out.num_elements();
    if a.len() == n && b.len() == n && a_strides == b_strides {
        return a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect();
    }

    let dims = out.dims();
    let mut result = Vec::with_capacity(n);
    let mut idx: SmallVec<[usize; 4]> = SmallVec::from_elem(0, dims.len());
    let (mut ao, mut bo) = (0usize, 0usize);
    for _ in 0..n {
        result.push(f(a[ao], b[bo])?);
        for d in (0..dims.len()).rev() {
            idx[d] += 1;
            ao += a_strides[d];
            bo += b_strides[d];
            if idx[d] < dims[d] {
                break;
            }
            ao -= a_strides[d] * dims[d];
            bo -= b_strides[d] * dims[d];
            idx[d] = 0;
        }
    }
    Ok(result)
}

/// Reads `data` through `strides` at every index of `out` in row-major order.
fn gather<T: Copy>(data: &[T], strides: &[usize], out: &Shape) -> Vec<T> {
    let dims = out.dims();
    let n = out.num_elements();
    let mut result = Vec::with_capacity(n);
    let mut idx: SmallVec<[usize; 4]> = SmallVec::from_elem(0, dims.len());
    let mut offset = 0usize;
    for _ in 0..n {
        result.push(data[offset]);
        for d in (0..dims.len()).rev() {
            idx[d] += 1;
            offset += strides[d];
            if idx[d] < dims[d] {
                break;
            }
            offset -= strides[d] * dims[d];
            idx[d] = 0;
        }
    }
    result
}
