//! Kronecker and Khatri-Rao products of sparse tensors

use crate::sptensor::SparseTensor;
use sptol_core::{Scalar, SptError, SptResult};

fn check_same_nmodes<T: Scalar>(
    operation: &str,
    a: &SparseTensor<T>,
    b: &SparseTensor<T>,
) -> SptResult<()> {
    if a.nmodes() != b.nmodes() {
        return Err(SptError::shape_mismatch(
            operation,
            vec![a.nmodes()],
            vec![b.nmodes()],
            "operands must have the same number of modes",
        ));
    }
    Ok(())
}

/// Mode sizes of a product, multiplying every mode except `shared`
fn product_ndims<T: Scalar>(
    operation: &str,
    a: &SparseTensor<T>,
    b: &SparseTensor<T>,
    shared: Option<usize>,
) -> SptResult<Vec<usize>> {
    a.ndims()
        .iter()
        .zip(b.ndims())
        .enumerate()
        .map(|(m, (&x, &y))| {
            if Some(m) == shared {
                return Ok(x);
            }
            x.checked_mul(y).ok_or_else(|| {
                SptError::value_error(
                    operation,
                    format!("mode {} size {} x {} overflows usize", m, x, y),
                )
            })
        })
        .collect()
}

/// Kronecker product `a ⊗ b`
///
/// Mode `m` of the result has `a.ndims[m] * b.ndims[m]` entries, and the pair
/// of nonzeros `(i, j)` lands at `a_m(i) * b.ndims[m] + b_m(j)` in every mode.
/// Output is ordered by `a` first, then `b`.
///
/// # Errors
///
/// - `ShapeMismatch` if the operands differ in their number of modes
/// - `ValueError` if a product mode size does not fit in `usize`
pub fn kronecker<T: Scalar>(
    a: &SparseTensor<T>,
    b: &SparseTensor<T>,
) -> SptResult<SparseTensor<T>> {
    check_same_nmodes("kronecker", a, b)?;
    let ndims = product_ndims("kronecker", a, b, None)?;
    let mut y = SparseTensor::new(&ndims)?;

    let mut coord = vec![0; ndims.len()];
    for i in 0..a.nnz() {
        for j in 0..b.nnz() {
            for (m, c) in coord.iter_mut().enumerate() {
                *c = a.indices(m)[i] * b.ndims()[m] + b.indices(m)[j];
            }
            y.append(&coord, a.values()[i] * b.values()[j])?;
        }
    }
    Ok(y)
}

/// Khatri-Rao product of two tensors sharing their last mode
///
/// The column-wise Kronecker product: modes before the last combine as in
/// [`kronecker`], while the last mode is shared and only nonzeros with equal
/// last coordinates are paired.
///
/// # Errors
///
/// - `ShapeMismatch` if the number of modes or the size of the last mode differ
/// - `ValueError` if a product mode size does not fit in `usize`
pub fn khatri_rao<T: Scalar>(
    a: &SparseTensor<T>,
    b: &SparseTensor<T>,
) -> SptResult<SparseTensor<T>> {
    check_same_nmodes("khatri_rao", a, b)?;
    let last = a.nmodes() - 1;
    if a.ndims()[last] != b.ndims()[last] {
        return Err(SptError::shape_mismatch(
            "khatri_rao",
            vec![a.ndims()[last]],
            vec![b.ndims()[last]],
            "the last mode must have the same size in both operands",
        ));
    }

    let ndims = product_ndims("khatri_rao", a, b, Some(last))?;
    let mut y = SparseTensor::new(&ndims)?;

    let mut coord = vec![0; ndims.len()];
    for i in 0..a.nnz() {
        let col = a.indices(last)[i];
        for j in (0..b.nnz()).filter(|&j| b.indices(last)[j] == col) {
            for (m, c) in coord.iter_mut().enumerate().take(last) {
                *c = a.indices(m)[i] * b.ndims()[m] + b.indices(m)[j];
            }
            coord[last] = col;
            y.append(&coord, a.values()[i] * b.values()[j])?;
        }
    }
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sptol_core::ErrorKind;

    #[test]
    fn test_kronecker_matrices() {
        // [[1, 0], [0, 2]] ⊗ [[0, 3], [4, 0]]
        let a = SparseTensor::from_coords(&[2, 2], &[vec![0, 0], vec![1, 1]], &[1.0, 2.0]).unwrap();
        let b = SparseTensor::from_coords(&[2, 2], &[vec![0, 1], vec![1, 0]], &[3.0, 4.0]).unwrap();
        let y = kronecker(&a, &b).unwrap();

        assert_eq!(y.ndims(), &[4, 4]);
        assert_eq!(y.nnz(), 4);
        assert_eq!(y.get(&[0, 1]), Some(3.0));
        assert_eq!(y.get(&[1, 0]), Some(4.0));
        assert_eq!(y.get(&[2, 3]), Some(6.0));
        assert_eq!(y.get(&[3, 2]), Some(8.0));

        let dense = y.to_matrix().unwrap();
        assert_eq!(dense.get(3, 2), 8.0);
        assert_eq!(dense.get(0, 0), 0.0);
    }

    #[test]
    fn test_kronecker_rejects_mode_count() {
        let a = SparseTensor::<f64>::new(&[2, 2]).unwrap();
        let b = SparseTensor::<f64>::new(&[2, 2, 2]).unwrap();
        assert_eq!(kronecker(&a, &b).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_khatri_rao_pairs_columns() {
        // columns: a = [[1, 0], [0, 2]], b = [[5, 6], [7, 0]]
        let a = SparseTensor::from_coords(&[2, 2], &[vec![0, 0], vec![1, 1]], &[1.0, 2.0]).unwrap();
        let b = SparseTensor::from_coords(
            &[2, 2],
            &[vec![0, 0], vec![1, 0], vec![0, 1]],
            &[5.0, 7.0, 6.0],
        )
        .unwrap();
        let y = khatri_rao(&a, &b).unwrap();

        assert_eq!(y.ndims(), &[4, 2]);
        assert_eq!(y.nnz(), 3);
        assert_eq!(y.get(&[0, 0]), Some(5.0));
        assert_eq!(y.get(&[1, 0]), Some(7.0));
        assert_eq!(y.get(&[2, 1]), Some(12.0));
        assert_eq!(y.get(&[3, 1]), None);
    }

    #[test]
    fn test_khatri_rao_rejects_last_mode() {
        let a = SparseTensor::<f64>::new(&[2, 3]).unwrap();
        let b = SparseTensor::<f64>::new(&[2, 4]).unwrap();
        assert_eq!(khatri_rao(&a, &b).unwrap_err().kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_product_mode_overflow() {
        let huge = 1usize << (usize::BITS - 1);
        let a = SparseTensor::<f64>::new(&[huge, 3]).unwrap();
        let b = SparseTensor::<f64>::new(&[2, 3]).unwrap();
        assert_eq!(kronecker(&a, &b).unwrap_err().kind(), ErrorKind::ValueError);
        assert_eq!(khatri_rao(&a, &b).unwrap_err().kind(), ErrorKind::ValueError);

        // the shared last mode is never multiplied
        let a = SparseTensor::<f64>::new(&[2, huge]).unwrap();
        let b = SparseTensor::<f64>::new(&[2, huge]).unwrap();
        assert_eq!(khatri_rao(&a, &b).unwrap().ndims(), &[4, huge]);
    }
}
