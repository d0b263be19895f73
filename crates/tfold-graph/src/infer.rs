//! Result types of the operators the builder and the rewrite rules create.
//!
//! This is not general shape inference: it covers broadcasting elementwise
//! operators, the shape transforms, and plain 2-D matrix products.

use smallvec::SmallVec;
use tfold_tensor::Axis;

use crate::{Dim, GraphError, OpKind, ValueType};

/// Broadcasts two dimensions.
///
/// A dynamic dimension paired with a static `n > 1` must equal `n` at run
/// time, so the result is `n`. Two different dynamic dimensions cannot be
/// reconciled statically.
#[must_use]
pub fn broadcast_dim(a: Dim, b: Dim) -> Option<Dim> {
    match (a, b) {
        (Dim::Static(x), Dim::Static(y)) => {
            if x == y || y == 1 {
                Some(a)
            } else if x == 1 {
                Some(b)
            } else {
                None
            }
        }
        (Dim::Static(1), Dim::Dynamic(_)) | (Dim::Dynamic(_), Dim::Static(_)) if b != Dim::Static(1) => Some(b),
        (Dim::Static(_), Dim::Dynamic(_)) | (Dim::Dynamic(_), Dim::Static(_)) => Some(a),
        (Dim::Dynamic(x), Dim::Dynamic(y)) => (x == y).then_some(a),
    }
}

/// The result type of a broadcasting elementwise binary operator.
///
/// # Errors
///
/// Returns [`GraphError::Incompatible`] if the dtypes differ or the
/// dimensions do not broadcast.
pub fn broadcast(lhs: &ValueType, rhs: &ValueType) -> Result<ValueType, GraphError> {
    let incompatible = || GraphError::Incompatible {
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    };
    if lhs.dtype != rhs.dtype {
        return Err(incompatible());
    }
    let rank = lhs.rank().max(rhs.rank());
    let pad = |ty: &ValueType, i: usize| {
        let offset = rank - ty.rank();
        if i < offset {
            Dim::Static(1)
        } else {
            ty.dims[i - offset]
        }
    };
    let dims = (0..rank)
        .map(|i| broadcast_dim(pad(lhs, i), pad(rhs, i)).ok_or_else(incompatible))
        .collect::<Result<SmallVec<_>, _>>()?;
    Ok(ValueType {
        dtype: lhs.dtype,
        dims,
    })
}

/// The result type of a transpose. `None` reverses the axes.
///
/// # Errors
///
/// Returns [`GraphError::InvalidAttribute`] if `perm` is not a permutation
/// of the input's axes.
pub fn transpose(input: &ValueType, perm: Option<&[i64]>) -> Result<ValueType, GraphError> {
    let rank = input.rank();
    let invalid = GraphError::InvalidAttribute {
        kind: OpKind::Transpose,
        name: crate::attr::PERM,
    };
    let perm: SmallVec<[usize; 4]> = match perm {
        None => (0..rank).rev().collect(),
        Some(perm) => perm
            .iter()
            .map(|&p| usize::try_from(p).ok().filter(|&p| p < rank))
            .collect::<Option<_>>()
            .ok_or(invalid.clone())?,
    };
    if perm.len() != rank || (0..rank).any(|axis| !perm.contains(&axis)) {
        return Err(invalid);
    }
    Ok(ValueType::with_dims(input.dtype, perm.iter().map(|&p| input.dims[p])))
}

/// Output positions of the inserted axes of an unsqueeze, ascending.
///
/// Axes are normalized against the output rank `rank + axes.len()`.
/// Returns `None` for out-of-range or repeated axes.
#[must_use]
pub fn unsqueeze_positions(rank: usize, axes: &[i64]) -> Option<SmallVec<[usize; 4]>> {
    let out_rank = rank + axes.len();
    let mut positions = axes
        .iter()
        .map(|&axis| Axis::new(axis).normalize(out_rank))
        .collect::<Option<SmallVec<[usize; 4]>>>()?;
    positions.sort_unstable();
    if positions.windows(2).any(|w| w[0] == w[1]) {
        return None;
    }
    Some(positions)
}

/// The result type of an unsqueeze.
///
/// # Errors
///
/// Returns [`GraphError::InvalidAttribute`] for out-of-range or repeated
/// axes.
pub fn unsqueeze(input: &ValueType, axes: &[i64]) -> Result<ValueType, GraphError> {
    let positions = unsqueeze_positions(input.rank(), axes).ok_or(GraphError::InvalidAttribute {
        kind: OpKind::Unsqueeze,
        name: crate::attr::AXES,
    })?;
    let mut source = input.dims.iter();
    let dims = (0..input.rank() + positions.len()).map(|i| {
        if positions.contains(&i) {
            Dim::Static(1)
        } else {
            source.next().copied().unwrap_or(Dim::Static(1))
        }
    });
    Ok(ValueType::with_dims(input.dtype, dims.collect::<SmallVec<[Dim; 4]>>()))
}

/// The result type of a 2-D matrix product `[m, k] x [k, n] -> [m, n]`.
///
/// # Errors
///
/// Returns [`GraphError::Incompatible`] for other ranks, differing dtypes,
/// or mismatched inner dimensions.
pub fn matmul(lhs: &ValueType, rhs: &ValueType) -> Result<ValueType, GraphError> {
    let compatible = lhs.dtype == rhs.dtype
        && lhs.rank() == 2
        && rhs.rank() == 2
        && match (lhs.dims[1], rhs.dims[0]) {
            (Dim::Static(a), Dim::Static(b)) => a == b,
            (Dim::Dynamic(a), Dim::Dynamic(b)) => a == b,
            _ => true,
        };
    if !compatible {
        return Err(GraphError::Incompatible {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        });
    }
    Ok(ValueType::with_dims(lhs.dtype, [lhs.dims[0], rhs.dims[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DimVar;
    use tfold_index::Idx;
    use tfold_tensor::DType;

    fn f32s(dims: &[usize]) -> ValueType {
        ValueType::new(DType::Float32, dims.iter().copied())
    }

    #[test]
    fn test_broadcast_static() {
        assert_eq!(broadcast(&f32s(&[3, 1]), &f32s(&[1, 4])).unwrap(), f32s(&[3, 4]));
        assert_eq!(broadcast(&f32s(&[2, 3]), &f32s(&[])).unwrap(), f32s(&[2, 3]));
        assert_eq!(broadcast(&f32s(&[0]), &f32s(&[1])).unwrap(), f32s(&[0]));
        assert!(broadcast(&f32s(&[2]), &f32s(&[3])).is_err());
    }

    #[test]
    fn test_broadcast_rejects_dtype_mismatch() {
        let i32s = ValueType::new(DType::Int32, [2]);
        assert!(matches!(broadcast(&f32s(&[2]), &i32s), Err(GraphError::Incompatible { .. })));
    }

    #[test]
    fn test_broadcast_dynamic() {
        let n = Dim::Dynamic(DimVar::new(0));
        let m = Dim::Dynamic(DimVar::new(1));
        assert_eq!(broadcast_dim(n, Dim::Static(1)), Some(n));
        assert_eq!(broadcast_dim(Dim::Static(1), n), Some(n));
        assert_eq!(broadcast_dim(n, Dim::Static(4)), Some(Dim::Static(4)));
        assert_eq!(broadcast_dim(Dim::Static(4), n), Some(Dim::Static(4)));
        assert_eq!(broadcast_dim(n, n), Some(n));
        assert_eq!(broadcast_dim(n, m), None);
        assert_eq!(broadcast_dim(Dim::Static(1), Dim::Static(1)), Some(Dim::Static(1)));
    }

    #[test]
    fn test_transpose_types() {
        assert_eq!(transpose(&f32s(&[2, 3, 4]), Some(&[2, 0, 1])).unwrap(), f32s(&[4, 2, 3]));
        assert_eq!(transpose(&f32s(&[2, 3]), None).unwrap(), f32s(&[3, 2]));
        assert!(transpose(&f32s(&[2, 3]), Some(&[0, 0])).is_err());
        assert!(transpose(&f32s(&[2, 3]), Some(&[0, -1])).is_err());
        assert!(transpose(&f32s(&[2, 3]), Some(&[0])).is_err());
    }

    #[test]
    fn test_unsqueeze_types() {
        assert_eq!(unsqueeze(&f32s(&[2, 3]), &[0]).unwrap(), f32s(&[1, 2, 3]));
        assert_eq!(unsqueeze(&f32s(&[2, 3]), &[-1]).unwrap(), f32s(&[2, 3, 1]));
        assert_eq!(unsqueeze(&f32s(&[2, 3]), &[3, 0]).unwrap(), f32s(&[1, 2, 3, 1]));
        assert!(unsqueeze(&f32s(&[2]), &[0, 0]).is_err());
        assert!(unsqueeze(&f32s(&[2]), &[2]).is_err());
    }

    #[test]
    fn test_matmul_types() {
        assert_eq!(matmul(&f32s(&[2, 3]), &f32s(&[3, 5])).unwrap(), f32s(&[2, 5]));
        assert!(matmul(&f32s(&[2, 3]), &f32s(&[4, 5])).is_err());
        assert!(matmul(&f32s(&[3]), &f32s(&[3])).is_err());
    }
}
