//! Scalar element types and their checked arithmetic.

use crate::eval::{BinaryOp, EvalError, UnaryOp};
use crate::literal::TensorData;
use crate::DType;

/// A Rust scalar type that can be stored in a [`TensorData`].
pub trait Element: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The dtype tag for this element type.
    const DTYPE: DType;

    /// Wraps a vector of elements as tensor data.
    fn into_data(values: Vec<Self>) -> TensorData;

    /// Borrows tensor data as a slice of this element type, if the dtype matches.
    fn slice(data: &TensorData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$variant;

                fn into_data(values: Vec<Self>) -> TensorData {
                    TensorData::$variant(values)
                }

                fn slice(data: &TensorData) -> Option<&[Self]> {
                    match data {
                        TensorData::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element! {
    bool => Bool,
    i8 => Int8,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    f32 => Float32,
    f64 => Float64,
}

/// Elementwise arithmetic for numeric element types.
///
/// Integer operations are checked: a result that does not fit is reported
/// rather than wrapped, so a fold never disagrees with code that traps.
pub(crate) trait Arith: Element {
    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Result<Self, EvalError>;
    fn unary(op: UnaryOp, value: Self) -> Result<Self, EvalError>;
}

macro_rules! impl_arith_int {
    ($($ty:ty),*) => {
        $(
            impl Arith for $ty {
                fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Result<Self, EvalError> {
                    let result = match op {
                        BinaryOp::Add => lhs.checked_add(rhs),
                        BinaryOp::Sub => lhs.checked_sub(rhs),
                        BinaryOp::Mul => lhs.checked_mul(rhs),
                        BinaryOp::Div => {
                            if rhs == 0 {
                                return Err(EvalError::DivisionByZero { dtype: Self::DTYPE });
                            }
                            lhs.checked_div(rhs)
                        }
                    };
                    result.ok_or(EvalError::Overflow { op: op.name(), dtype: Self::DTYPE })
                }

                fn unary(op: UnaryOp, value: Self) -> Result<Self, EvalError> {
                    match op {
                        UnaryOp::Neg if Self::DTYPE.is_signed() => value
                            .checked_neg()
                            .ok_or(EvalError::Overflow { op: op.name(), dtype: Self::DTYPE }),
                        _ => Err(EvalError::UnsupportedDType { op: op.name(), dtype: Self::DTYPE }),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_arith_float {
    ($($ty:ty),*) => {
        $(
            impl Arith for $ty {
                fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Result<Self, EvalError> {
                    Ok(match op {
                        BinaryOp::Add => lhs + rhs,
                        BinaryOp::Sub => lhs - rhs,
                        BinaryOp::Mul => lhs * rhs,
                        BinaryOp::Div => lhs / rhs,
                    })
                }

                fn unary(op: UnaryOp, value: Self) -> Result<Self, EvalError> {
                    Ok(match op {
                        UnaryOp::Neg => -value,
                        UnaryOp::Sqrt => value.sqrt(),
                    })
                }
            }
        )*
    };
}

impl_arith_int!(i8, i32, i64, u8);
impl_arith_float!(f32, f64);
