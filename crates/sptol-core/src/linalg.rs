//! Dense linear algebra on strided matrices
//!
//! Only the operations CPD-ALS needs: general multiply, transpose-multiply
//! (Gram matrices), element-wise (Hadamard) accumulation, an LU solve and
//! column normalisation into a scale vector.
//!
//! Products and the solve run on nalgebra. Operands are copied into `f64`
//! `DMatrix` values and the result is copied back into the strided output.
//!
//! All routines validate shapes before writing, so an error never leaves the
//! output partially updated.

use crate::error::{SptError, SptResult};
use crate::matrix::Matrix;
use crate::scalar::Scalar;
use nalgebra::DMatrix;

/// What to do when a column to be normalised has (near) zero norm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Degeneracy {
    /// Abort with a `ZeroDivision` error
    #[default]
    Fail,
    /// Record a zero scale and leave the column unscaled
    SkipColumn,
}

fn to_dense<T: Scalar>(m: &Matrix<T>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m.get(i, j).to_f64_lossy())
}

fn store<T: Scalar>(src: &DMatrix<f64>, dst: &mut Matrix<T>) {
    for i in 0..dst.nrows() {
        for (j, x) in dst.row_mut(i).iter_mut().enumerate() {
            *x = T::from_f64_lossy(src[(i, j)]);
        }
    }
}

/// `C = A · B`
///
/// `c` must already have shape `a.nrows() × b.ncols()`; it is overwritten.
///
/// # Errors
///
/// Returns `ShapeMismatch` on incompatible shapes.
pub fn multiply<T: Scalar>(a: &Matrix<T>, b: &Matrix<T>, c: &mut Matrix<T>) -> SptResult<()> {
    if a.ncols() != b.nrows() {
        return Err(SptError::shape_mismatch(
            "multiply",
            vec![a.nrows(), a.ncols()],
            vec![b.nrows(), b.ncols()],
            "inner dimensions must agree",
        ));
    }
    if c.shape() != (a.nrows(), b.ncols()) {
        return Err(SptError::shape_mismatch(
            "multiply",
            vec![a.nrows(), b.ncols()],
            vec![c.nrows(), c.ncols()],
            "output shape",
        ));
    }

    store(&(to_dense(a) * to_dense(b)), c);
    Ok(())
}

/// `C = Aᵀ · B`
///
/// With `a` and `b` the same factor matrix this is its Gram matrix.
///
/// # Errors
///
/// Returns `ShapeMismatch` on incompatible shapes.
pub fn transpose_multiply<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    c: &mut Matrix<T>,
) -> SptResult<()> {
    if a.nrows() != b.nrows() {
        return Err(SptError::shape_mismatch(
            "transpose_multiply",
            vec![a.nrows(), a.ncols()],
            vec![b.nrows(), b.ncols()],
            "row counts must agree",
        ));
    }
    if c.shape() != (a.ncols(), b.ncols()) {
        return Err(SptError::shape_mismatch(
            "transpose_multiply",
            vec![a.ncols(), b.ncols()],
            vec![c.nrows(), c.ncols()],
            "output shape",
        ));
    }

    store(&to_dense(a).tr_mul(&to_dense(b)), c);
    Ok(())
}

/// `acc ⊙= x`, element-wise over the logical region
///
/// # Errors
///
/// Returns `ShapeMismatch` if the shapes differ.
pub fn hadamard_assign<T: Scalar>(acc: &mut Matrix<T>, x: &Matrix<T>) -> SptResult<()> {
    if acc.shape() != x.shape() {
        return Err(SptError::shape_mismatch(
            "hadamard_assign",
            vec![acc.nrows(), acc.ncols()],
            vec![x.nrows(), x.ncols()],
            "operands must have the same shape",
        ));
    }
    for i in 0..acc.nrows() {
        for (a, &b) in acc.row_mut(i).iter_mut().zip(x.row(i)) {
            *a *= b;
        }
    }
    Ok(())
}

/// Solve `A · X = B`, overwriting `b` with `X`
///
/// Uses an LU decomposition with partial pivoting. Passing the identity as
/// `b` yields `A⁻¹`.
///
/// # Errors
///
/// - `ShapeMismatch` if `a` is not square or `b` has the wrong row count
/// - `ZeroDivision` if `a` is singular to working precision; `b` is left untouched
pub fn solve_in_place<T: Scalar>(a: &Matrix<T>, b: &mut Matrix<T>) -> SptResult<()> {
    let n = a.nrows();
    if a.ncols() != n || b.nrows() != n {
        return Err(SptError::shape_mismatch(
            "solve_in_place",
            vec![n, n],
            vec![a.ncols(), b.nrows()],
            "A must be square with as many rows as B",
        ));
    }
    if n == 0 {
        return Ok(());
    }

    let dense = to_dense(a);
    let scale = dense.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    let threshold = scale * T::epsilon().to_f64_lossy() * n as f64;
    let lu = dense.lu();
    let u = lu.u();
    let singular = |k: usize| {
        SptError::zero_division("solve_in_place", format!("matrix is singular at pivot {}", k))
    };
    if let Some(k) = (0..n).find(|&k| {
        let pivot = u[(k, k)].abs();
        pivot <= threshold || !pivot.is_finite()
    }) {
        return Err(singular(k));
    }
    let x = lu.solve(&to_dense(b)).ok_or_else(|| singular(n - 1))?;
    store(&x, b);
    Ok(())
}

/// Scale every column of `m` to unit 2-norm, writing the removed norms to `lambda`
///
/// The norms are accumulated in `lambda` itself, so no buffer is allocated.
///
/// # Errors
///
/// - `ShapeMismatch` if `lambda.len() != m.ncols()`
/// - `ZeroDivision` if a column norm is zero (or not finite) and `policy` is [`Degeneracy::Fail`];
///   `m` is left untouched in that case
pub fn normalize_columns<T: Scalar>(
    m: &mut Matrix<T>,
    lambda: &mut [T],
    policy: Degeneracy,
) -> SptResult<()> {
    if lambda.len() != m.ncols() {
        return Err(SptError::shape_mismatch(
            "normalize_columns",
            vec![m.ncols()],
            vec![lambda.len()],
            "lambda length must equal the column count",
        ));
    }

    lambda.fill(T::zero());
    for i in 0..m.nrows() {
        for (n, &x) in lambda.iter_mut().zip(m.row(i)) {
            *n += x * x;
        }
    }
    for n in lambda.iter_mut() {
        *n = n.sqrt();
    }

    let degenerate = |n: T| n <= T::min_positive_value() || !n.is_finite();
    if policy == Degeneracy::Fail {
        if let Some(r) = lambda.iter().position(|&n| degenerate(n)) {
            return Err(SptError::zero_division(
                "normalize_columns",
                format!("column {} has norm {}", r, lambda[r]),
            ));
        }
    }
    for (r, n) in lambda.iter_mut().enumerate() {
        if degenerate(*n) {
            log::warn!("normalize_columns: column {} has zero norm, left unscaled", r);
            *n = T::zero();
        }
    }

    for i in 0..m.nrows() {
        for (x, &n) in m.row_mut(i).iter_mut().zip(lambda.iter()) {
            if n > T::zero() {
                *x /= n;
            }
        }
    }
    Ok(())
}

/// Frobenius norm of the logical region
pub fn frobenius_norm<T: Scalar>(m: &Matrix<T>) -> T {
    (0..m.nrows())
        .map(|i| m.row(i).iter().map(|&x| x * x).sum::<T>())
        .sum::<T>()
        .sqrt()
}
