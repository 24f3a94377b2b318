//! Element-wise operations on sparse tensors
//!
//! Binary operations walk both operands in natural order. Operands that are
//! not already sorted that way are sorted on a private copy; inputs are never
//! reordered in place. Results come back sorted in natural order.
//!
//! | Operation | Output pattern |
//! |-----------|----------------|
//! | [`add`], [`sub`], `par_add`, `par_sub` | union |
//! | [`dot_mul`], [`dot_div`] | intersection |
//! | [`dot_mul_eq`] | shared (patterns must be identical) |

use crate::sptensor::SparseTensor;
use sptol_core::{Scalar, SptError, SptResult};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use sptol_core::{partition_ranges, WorkerPool};

impl<T: Scalar> SparseTensor<T> {
    /// Multiply every stored value by `a`
    pub fn mul_scalar(&mut self, a: T) {
        for v in self.values_mut() {
            *v *= a;
        }
    }

    /// Divide every stored value by `a`
    ///
    /// # Errors
    ///
    /// Returns `ZeroDivision` if `a` is zero; values are left untouched.
    pub fn div_scalar(&mut self, a: T) -> SptResult<()> {
        if a.is_zero() {
            return Err(SptError::zero_division(
                "div_scalar",
                "cannot divide a tensor by zero",
            ));
        }
        for v in self.values_mut() {
            *v /= a;
        }
        Ok(())
    }
}

fn check_same_shape<T: Scalar>(
    operation: &str,
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
) -> SptResult<()> {
    if x.ndims() != y.ndims() {
        return Err(SptError::shape_mismatch(
            operation,
            x.ndims().to_vec(),
            y.ndims().to_vec(),
            "operands must have identical mode sizes",
        ));
    }
    Ok(())
}

fn sorted_natural<T: Scalar>(x: &SparseTensor<T>) -> Cow<'_, SparseTensor<T>> {
    if x.is_sorted_by(&x.natural_order()) {
        Cow::Borrowed(x)
    } else {
        let mut sorted = x.clone();
        sorted.sort_index();
        Cow::Owned(sorted)
    }
}

fn compare_across<T>(x: &SparseTensor<T>, i: usize, y: &SparseTensor<T>, j: usize) -> Ordering
where
    T: Scalar,
{
    (0..x.nmodes())
        .map(|m| x.indices(m)[i].cmp(&y.indices(m)[j]))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Walk `x` and `y` in natural order, combining matched and (for unions)
/// unmatched nonzeros
fn merge<T, F>(
    operation: &str,
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
    union: bool,
    combine: F,
) -> SptResult<SparseTensor<T>>
where
    T: Scalar,
    F: FnMut(Option<T>, Option<T>) -> SptResult<T>,
{
    check_same_shape(operation, x, y)?;
    let x = sorted_natural(x);
    let y = sorted_natural(y);
    let (x, y) = (&*x, &*y);

    let mut z = SparseTensor::new(x.ndims())?;
    merge_into(x, 0..x.nnz(), y, 0..y.nnz(), union, combine, &mut z)?;
    z.mark_sorted(z.natural_order());
    Ok(z)
}

/// Merge `x[xs]` with `y[ys]`, appending to `z`
fn merge_into<T, F>(
    x: &SparseTensor<T>,
    xs: Range<usize>,
    y: &SparseTensor<T>,
    ys: Range<usize>,
    union: bool,
    mut combine: F,
    z: &mut SparseTensor<T>,
) -> SptResult<()>
where
    T: Scalar,
    F: FnMut(Option<T>, Option<T>) -> SptResult<T>,
{
    let (mut i, mut j) = (xs.start, ys.start);
    while i < xs.end && j < ys.end {
        match compare_across(x, i, y, j) {
            Ordering::Less => {
                if union {
                    z.push_entry_of(x, i, combine(Some(x.values()[i]), None)?);
                }
                i += 1;
            }
            Ordering::Greater => {
                if union {
                    z.push_entry_of(y, j, combine(None, Some(y.values()[j]))?);
                }
                j += 1;
            }
            Ordering::Equal => {
                let v = combine(Some(x.values()[i]), Some(y.values()[j]))?;
                z.push_entry_of(x, i, v);
                i += 1;
                j += 1;
            }
        }
    }
    if union {
        for i in i..xs.end {
            z.push_entry_of(x, i, combine(Some(x.values()[i]), None)?);
        }
        for j in j..ys.end {
            z.push_entry_of(y, j, combine(None, Some(y.values()[j]))?);
        }
    }
    Ok(())
}

/// First position of `y` whose coordinate is not below nonzero `i` of `x`
#[cfg(feature = "parallel")]
fn lower_bound<T: Scalar>(y: &SparseTensor<T>, x: &SparseTensor<T>, i: usize) -> usize {
    let (mut lo, mut hi) = (0, y.nnz());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if compare_across(y, mid, x, i).is_lt() {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Union merge split over `pool`
///
/// `x` is cut into one contiguous range per worker and `y` at the first
/// coordinate of each range, so the partial results concatenate in order.
#[cfg(feature = "parallel")]
fn par_union<T, F>(
    operation: &str,
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
    pool: &WorkerPool,
    combine: F,
) -> SptResult<SparseTensor<T>>
where
    T: Scalar,
    F: Fn(Option<T>, Option<T>) -> SptResult<T> + Sync,
{
    check_same_shape(operation, x, y)?;
    let x = sorted_natural(x);
    let y = sorted_natural(y);
    let (x, y) = (&*x, &*y);

    let x_ranges = partition_ranges(x.nnz(), pool.nthreads());
    let last = x_ranges.len() - 1;
    let y_start = |k: usize| {
        if k == 0 {
            0
        } else {
            lower_bound(y, x, x_ranges[k].start)
        }
    };
    let parts = pool.install(|| {
        x_ranges
            .par_iter()
            .enumerate()
            .map(|(k, xs)| -> SptResult<SparseTensor<T>> {
                let y_end = if k == last { y.nnz() } else { y_start(k + 1) };
                let mut part = SparseTensor::new(x.ndims())?;
                merge_into(x, xs.clone(), y, y_start(k)..y_end, true, &combine, &mut part)?;
                Ok(part)
            })
            .collect::<SptResult<Vec<_>>>()
    })?;
    log::trace!("{}: merged {} segments", operation, parts.len());

    let mut z = SparseTensor::new(x.ndims())?;
    for part in &parts {
        for (i, &v) in part.values().iter().enumerate() {
            z.push_entry_of(part, i, v);
        }
    }
    z.mark_sorted(z.natural_order());
    Ok(z)
}

/// Element-wise sum `x + y`
///
/// Coordinates present in both operands are kept even when they cancel.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the mode sizes differ.
pub fn add<T: Scalar>(x: &SparseTensor<T>, y: &SparseTensor<T>) -> SptResult<SparseTensor<T>> {
    merge("add", x, y, true, |a, b| {
        Ok(a.unwrap_or_else(T::zero) + b.unwrap_or_else(T::zero))
    })
}

/// Element-wise difference `x - y`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the mode sizes differ.
pub fn sub<T: Scalar>(x: &SparseTensor<T>, y: &SparseTensor<T>) -> SptResult<SparseTensor<T>> {
    merge("sub", x, y, true, |a, b| {
        Ok(a.unwrap_or_else(T::zero) - b.unwrap_or_else(T::zero))
    })
}

/// [`add`] with the merge split across `pool`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the mode sizes differ.
#[cfg(feature = "parallel")]
pub fn par_add<T: Scalar>(
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
    pool: &WorkerPool,
) -> SptResult<SparseTensor<T>> {
    par_union("par_add", x, y, pool, |a, b| {
        Ok(a.unwrap_or_else(T::zero) + b.unwrap_or_else(T::zero))
    })
}

/// [`sub`] with the merge split across `pool`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the mode sizes differ.
#[cfg(feature = "parallel")]
pub fn par_sub<T: Scalar>(
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
    pool: &WorkerPool,
) -> SptResult<SparseTensor<T>> {
    par_union("par_sub", x, y, pool, |a, b| {
        Ok(a.unwrap_or_else(T::zero) - b.unwrap_or_else(T::zero))
    })
}

/// Element-wise product over the shared nonzero pattern
///
/// # Errors
///
/// Returns `ShapeMismatch` if the mode sizes differ.
pub fn dot_mul<T: Scalar>(x: &SparseTensor<T>, y: &SparseTensor<T>) -> SptResult<SparseTensor<T>> {
    merge("dot_mul", x, y, false, |a, b| {
        Ok(a.unwrap_or_else(T::zero) * b.unwrap_or_else(T::zero))
    })
}

/// Element-wise quotient `x / y` over the shared nonzero pattern
///
/// # Errors
///
/// - `ShapeMismatch` if the mode sizes differ
/// - `ZeroDivision` if a matched divisor is zero
pub fn dot_div<T: Scalar>(x: &SparseTensor<T>, y: &SparseTensor<T>) -> SptResult<SparseTensor<T>> {
    merge("dot_div", x, y, false, |a, b| {
        let b = b.unwrap_or_else(T::zero);
        if b.is_zero() {
            return Err(SptError::zero_division(
                "dot_div",
                "divisor tensor stores a zero",
            ));
        }
        Ok(a.unwrap_or_else(T::zero) / b)
    })
}

fn check_same_pattern<T: Scalar>(
    operation: &str,
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
) -> SptResult<()> {
    check_same_shape(operation, x, y)?;
    let same = x.nnz() == y.nnz() && (0..x.nmodes()).all(|m| x.indices(m) == y.indices(m));
    if !same {
        return Err(SptError::value_error(
            operation,
            "operands must store the same coordinates in the same order",
        ));
    }
    Ok(())
}

/// Element-wise product of two tensors with identical storage patterns
///
/// No merge is needed, so the output keeps the storage order of `x`.
///
/// # Errors
///
/// - `ShapeMismatch` if the mode sizes differ
/// - `ValueError` if the coordinates differ in any position
pub fn dot_mul_eq<T: Scalar>(
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
) -> SptResult<SparseTensor<T>> {
    check_same_pattern("dot_mul_eq", x, y)?;
    let mut z = x.clone();
    for (v, &w) in z.values_mut().iter_mut().zip(y.values()) {
        *v *= w;
    }
    Ok(z)
}

/// [`dot_mul_eq`] with the value products spread over `pool`
#[cfg(feature = "parallel")]
pub fn par_dot_mul_eq<T: Scalar>(
    x: &SparseTensor<T>,
    y: &SparseTensor<T>,
    pool: &WorkerPool,
) -> SptResult<SparseTensor<T>> {
    check_same_pattern("par_dot_mul_eq", x, y)?;
    let mut z = x.clone();
    pool.install(|| {
        z.values_mut()
            .par_iter_mut()
            .zip(y.values().par_iter())
            .for_each(|(v, &w)| *v *= w);
    });
    Ok(z)
}
