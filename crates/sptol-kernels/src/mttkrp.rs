//! MTTKRP (Matricized Tensor Times Khatri-Rao Product) over sparse tensors
//!
//! MTTKRP is the computational bottleneck of CP-ALS. Instead of building the
//! Khatri-Rao product of the factor matrices, every nonzero computes the
//! rank-length product of its factor rows and adds it to the output row of its
//! target coordinate.
//!
//! The per-nonzero products live in an [`MttkrpScratch`] that callers size
//! once and reuse across modes and iterations. In the parallel kernel each
//! worker owns a contiguous range of nonzeros and a private partial output;
//! partials are summed in worker order, so a fixed thread count always gives
//! bit-identical results.

use sptol_core::{Matrix, Scalar, SptError, SptResult};
use sptol_sparse::SparseTensor;
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use sptol_core::WorkerPool;

/// Reusable workspace for [`mttkrp`] and `par_mttkrp`
///
/// Holds an `nnz × rank` product buffer (rows padded to the matrix stride)
/// and, for the parallel kernel, one `max_rows × rank` partial output per
/// worker.
#[derive(Debug, Clone)]
pub struct MttkrpScratch<T> {
    products: Matrix<T>,
    partials: Vec<Matrix<T>>,
}

impl<T: Scalar> MttkrpScratch<T> {
    /// Workspace for the sequential kernel
    pub fn new(nnz: usize, rank: usize) -> Self {
        Self {
            products: Matrix::new(nnz, rank),
            partials: Vec::new(),
        }
    }

    /// Workspace for the parallel kernel with `nworkers` private outputs of
    /// up to `max_rows` rows each
    pub fn with_workers(nnz: usize, max_rows: usize, rank: usize, nworkers: usize) -> Self {
        Self {
            products: Matrix::new(nnz, rank),
            partials: (0..nworkers).map(|_| Matrix::new(max_rows, rank)).collect(),
        }
    }

    /// Number of nonzeros the product buffer can hold
    pub fn nnz_capacity(&self) -> usize {
        self.products.nrows()
    }

    /// Rank the workspace was sized for
    pub fn rank(&self) -> usize {
        self.products.ncols()
    }

    /// Number of private partial outputs
    pub fn nworkers(&self) -> usize {
        self.partials.len()
    }

    /// Per-nonzero products of the last kernel call
    pub fn products(&self) -> &Matrix<T> {
        &self.products
    }
}

/// Non-target modes in descending index order
///
/// ```
/// use sptol_kernels::descending_mode_order;
/// assert_eq!(descending_mode_order(4, 1), vec![3, 2, 0]);
/// ```
pub fn descending_mode_order(nmodes: usize, mode: usize) -> Vec<usize> {
    (0..nmodes).rev().filter(|&m| m != mode).collect()
}

/// Check every operand before anything is written
fn validate<T: Scalar>(
    operation: &str,
    tensor: &SparseTensor<T>,
    factors: &[Matrix<T>],
    out: &Matrix<T>,
    mode_order: &[usize],
    mode: usize,
    scratch: &MttkrpScratch<T>,
) -> SptResult<()> {
    let nmodes = tensor.nmodes();
    SptError::check_mode(operation, mode, nmodes)?;

    if factors.len() != nmodes {
        return Err(SptError::shape_mismatch(
            operation,
            vec![nmodes],
            vec![factors.len()],
            "one factor matrix per mode is required",
        ));
    }
    let rank = out.ncols();
    for (m, factor) in factors.iter().enumerate() {
        if factor.nrows() != tensor.ndims()[m] || factor.ncols() != rank {
            return Err(SptError::shape_mismatch(
                operation,
                vec![tensor.ndims()[m], rank],
                vec![factor.nrows(), factor.ncols()],
                format!("factor {} must have one row per index of mode {} and one column per rank", m, m),
            ));
        }
    }
    if out.nrows() < tensor.ndims()[mode] {
        return Err(SptError::shape_mismatch(
            operation,
            vec![tensor.ndims()[mode], rank],
            vec![out.nrows(), out.ncols()],
            format!("output needs at least one row per index of mode {}", mode),
        ));
    }

    let mut seen = vec![false; nmodes];
    let valid_order = mode_order.len() + 1 == nmodes
        && mode_order.iter().all(|&m| {
            let fresh = m < nmodes && m != mode && !seen[m];
            if fresh {
                seen[m] = true;
            }
            fresh
        });
    if !valid_order {
        return Err(SptError::value_error(
            operation,
            format!(
                "mode order {:?} must list every mode except {} exactly once",
                mode_order, mode
            ),
        ));
    }

    if scratch.nnz_capacity() < tensor.nnz() || scratch.rank() != rank {
        return Err(SptError::shape_mismatch(
            operation,
            vec![tensor.nnz(), rank],
            vec![scratch.nnz_capacity(), scratch.rank()],
            "scratch must hold one product row per nonzero",
        ));
    }
    Ok(())
}

/// Form the products of `nonzeros` in `products` and add them into `out`
#[allow(clippy::too_many_arguments)]
fn accumulate<T: Scalar>(
    tensor: &SparseTensor<T>,
    factors: &[Matrix<T>],
    mode_order: &[usize],
    mode: usize,
    nonzeros: Range<usize>,
    products: &mut [T],
    stride: usize,
    out: &mut Matrix<T>,
) {
    let rank = out.ncols();
    let values = tensor.values();
    let targets = tensor.indices(mode);
    for (i, row) in nonzeros.zip(products.chunks_exact_mut(stride)) {
        let product = &mut row[..rank];
        product.fill(values[i]);
        for &m in mode_order {
            let factor_row = factors[m].row(tensor.indices(m)[i]);
            for (p, &f) in product.iter_mut().zip(factor_row) {
                *p *= f;
            }
        }
        for (o, &p) in out.row_mut(targets[i]).iter_mut().zip(product.iter()) {
            *o += p;
        }
    }
}

/// Compute MTTKRP of `tensor` along `mode` into `out`
///
/// `out` must have at least `ndims[mode]` rows and one column per rank; all of
/// its logical rows are zeroed first, so rows without nonzeros stay zero.
/// `mode_order` lists the remaining modes in the order their factor rows are
/// folded into each product.
///
/// # Errors
///
/// - `ValueError` if `mode` is out of range or `mode_order` is not a
///   permutation of the other modes
/// - `ShapeMismatch` if a factor, `out` or `scratch` disagrees with the tensor
///   or the rank
///
/// `out` is left untouched on error.
pub fn mttkrp<T: Scalar>(
    tensor: &SparseTensor<T>,
    factors: &[Matrix<T>],
    out: &mut Matrix<T>,
    mode_order: &[usize],
    mode: usize,
    scratch: &mut MttkrpScratch<T>,
) -> SptResult<()> {
    validate("mttkrp", tensor, factors, out, mode_order, mode, scratch)?;
    log::trace!("mttkrp: mode {} over {} nonzeros", mode, tensor.nnz());

    out.fill(T::zero());
    let stride = scratch.products.stride();
    let products = &mut scratch.products.as_mut_slice()[..tensor.nnz() * stride];
    accumulate(
        tensor,
        factors,
        mode_order,
        mode,
        0..tensor.nnz(),
        products,
        stride,
        out,
    );
    Ok(())
}

/// Parallel [`mttkrp`] on `pool`
///
/// Nonzeros are split into contiguous ranges of `ceil(nnz / nthreads)`, at
/// most one per worker, without allocating. Each worker
/// accumulates into its own partial output from `scratch`, and the partials
/// are summed row by row in worker order. Results match the sequential kernel
/// up to floating-point summation order and are reproducible for a given
/// thread count.
///
/// # Errors
///
/// Same as [`mttkrp`], plus `ShapeMismatch` if `scratch` has fewer partial
/// outputs than `pool` has workers or they are too small for `mode`.
#[cfg(feature = "parallel")]
pub fn par_mttkrp<T: Scalar>(
    tensor: &SparseTensor<T>,
    factors: &[Matrix<T>],
    out: &mut Matrix<T>,
    mode_order: &[usize],
    mode: usize,
    scratch: &mut MttkrpScratch<T>,
    pool: &WorkerPool,
) -> SptResult<()> {
    validate("par_mttkrp", tensor, factors, out, mode_order, mode, scratch)?;
    let nworkers = pool.nthreads();
    let rows = tensor.ndims()[mode];
    let rank = out.ncols();
    let partials_fit = scratch.partials.len() >= nworkers
        && scratch.partials[..nworkers]
            .iter()
            .all(|p| p.cap() >= rows && p.ncols() == rank);
    if !partials_fit {
        return Err(SptError::shape_mismatch(
            "par_mttkrp",
            vec![nworkers, rows, rank],
            vec![
                scratch.partials.len(),
                scratch.partials.first().map_or(0, |p| p.cap()),
                scratch.partials.first().map_or(0, |p| p.ncols()),
            ],
            "scratch needs one partial output per worker",
        ));
    }
    log::trace!(
        "par_mttkrp: mode {} over {} nonzeros on {} workers",
        mode,
        tensor.nnz(),
        nworkers
    );

    let nnz = tensor.nnz();
    let chunk = nnz.div_ceil(nworkers).max(1);
    let partials = &mut scratch.partials[..nnz.div_ceil(chunk)];
    for partial in partials.iter_mut() {
        partial.reset_rows(rows)?;
    }

    let stride = scratch.products.stride();
    let products = &mut scratch.products.as_mut_slice()[..nnz * stride];
    out.fill(T::zero());
    let out_stride = out.stride();
    pool.install(|| {
        products
            .par_chunks_mut(chunk * stride)
            .zip(partials.par_iter_mut())
            .enumerate()
            .for_each(|(k, (products, partial))| {
                let start = k * chunk;
                let end = (start + chunk).min(nnz);
                accumulate(
                    tensor,
                    factors,
                    mode_order,
                    mode,
                    start..end,
                    products,
                    stride,
                    partial,
                );
            });

        let partials = &*partials;
        out.as_mut_slice()
            .par_chunks_mut(out_stride)
            .take(rows)
            .enumerate()
            .for_each(|(j, row)| {
                for partial in partials {
                    for (o, &p) in row[..rank].iter_mut().zip(partial.row(j)) {
                        *o += p;
                    }
                }
            });
    });
    Ok(())
}
