//! Sparse tensor times dense matrix (TTM)
//!
//! `Y = X ×_mode U` for `U` of shape `ndims[mode] × R`. Every fiber of `X`
//! along `mode` becomes one dense row of length `R` in a [`SemiSparseTensor`].

use crate::semisparse::SemiSparseTensor;
use crate::sptensor::SparseTensor;
use sptol_core::{Matrix, Scalar, SptError, SptResult};
use std::borrow::Cow;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use sptol_core::WorkerPool;

/// Validate the operands and lay out the output fibers
fn prepare<'a, T: Scalar>(
    operation: &str,
    x: &'a SparseTensor<T>,
    u: &Matrix<T>,
    mode: usize,
) -> SptResult<(Cow<'a, SparseTensor<T>>, Vec<usize>, SemiSparseTensor<T>)> {
    SptError::check_mode(operation, mode, x.nmodes())?;
    if u.nrows() != x.ndims()[mode] {
        return Err(SptError::shape_mismatch(
            operation,
            vec![x.ndims()[mode], u.ncols()],
            vec![u.nrows(), u.ncols()],
            format!("matrix rows must match mode {} of the tensor", mode),
        ));
    }

    let x = if x.is_grouped_at_mode(mode) {
        Cow::Borrowed(x)
    } else {
        let mut sorted = x.clone();
        sorted.sort_index_at_mode(mode)?;
        Cow::Owned(sorted)
    };

    let mut ndims = x.ndims().to_vec();
    ndims[mode] = u.ncols();
    let mut y = SemiSparseTensor::new(&ndims, mode)?;
    let fiber_index = SemiSparseTensor::fiber_index(&x, mode)?;
    y.set_indices(&fiber_index, &x)?;
    Ok((x, fiber_index, y))
}

fn accumulate_fiber<T: Scalar>(
    x: &SparseTensor<T>,
    u: &Matrix<T>,
    mode: usize,
    nonzeros: std::ops::Range<usize>,
    out: &mut [T],
) {
    let cols = x.indices(mode);
    let values = x.values();
    for i in nonzeros {
        let v = values[i];
        for (o, &w) in out.iter_mut().zip(u.row(cols[i])) {
            *o += v * w;
        }
    }
}

/// Multiply `x` by `u` along `mode`
///
/// An `x` whose last sort did not end in `mode` is sorted on a copy.
///
/// # Errors
///
/// - `ValueError` if `mode` is out of range or `x` has a single mode
/// - `ShapeMismatch` if `u.nrows() != x.ndims()[mode]`
pub fn ttm<T: Scalar>(
    x: &SparseTensor<T>,
    u: &Matrix<T>,
    mode: usize,
) -> SptResult<SemiSparseTensor<T>> {
    let (x, fiber_index, mut y) = prepare("ttm", x, u, mode)?;
    for (f, bounds) in fiber_index.windows(2).enumerate() {
        accumulate_fiber(&x, u, mode, bounds[0]..bounds[1], y.values_mut().row_mut(f));
    }
    Ok(y)
}

/// [`ttm`] with output fibers computed in parallel on `pool`
///
/// Each fiber is owned by exactly one task, so no reduction is needed.
#[cfg(feature = "parallel")]
pub fn par_ttm<T: Scalar>(
    x: &SparseTensor<T>,
    u: &Matrix<T>,
    mode: usize,
    pool: &WorkerPool,
) -> SptResult<SemiSparseTensor<T>> {
    let (x, fiber_index, mut y) = prepare("par_ttm", x, u, mode)?;
    let rank = u.ncols();
    let stride = y.stride();
    let x = &*x;
    pool.install(|| {
        y.values_mut()
            .as_mut_slice()
            .par_chunks_mut(stride)
            .zip(fiber_index.par_windows(2))
            .for_each(|(row, bounds)| {
                accumulate_fiber(x, u, mode, bounds[0]..bounds[1], &mut row[..rank]);
            });
    });
    Ok(y)
}
