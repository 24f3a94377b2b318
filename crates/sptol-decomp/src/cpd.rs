//! CPD-ALS (Canonical Polyadic Decomposition via Alternating Least Squares)
//! for sparse tensors
//!
//! The CP decomposition factorizes a tensor X into a sum of rank-1 tensors:
//!
//! X ≈ Σᵣ λᵣ (a₀ᵣ ∘ a₁ᵣ ∘ ... ∘ aₙ₋₁ᵣ)
//!
//! Each sweep updates the factor matrices one mode at a time:
//!
//! 1. `M = MTTKRP(X, mode)` with the current factors
//! 2. `V = ⊛_{m ≠ mode} AₘᵀAₘ` from the cached Gram matrices
//! 3. `A_mode = M · V⁻¹`, with `V⁻¹` from an LU solve against the identity
//! 4. columns of `A_mode` are scaled to unit norm, the norms go to `λ`
//! 5. the Gram matrix of `A_mode` is refreshed
//!
//! All buffers (Gram matrices, MTTKRP output and scratch, pivots) belong to
//! one solver run and are allocated before the first sweep.

use crate::fit::{FitMetric, ReconstructionFit, SweepState};
use crate::kruskal::KruskalTensor;
use sptol_core::linalg::{self, Degeneracy};
use sptol_core::{Matrix, Scalar, SptError, SptResult, Timer};
use sptol_kernels::{descending_mode_order, mttkrp, MttkrpScratch};
use sptol_sparse::SparseTensor;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use sptol_core::{default_num_threads, WorkerPool};
#[cfg(feature = "parallel")]
use sptol_kernels::par_mttkrp;

/// Seed used by the default random initialization
pub const DEFAULT_SEED: u64 = 0x5eed_cafe;

/// Initialization of the factor matrices
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitStrategy {
    /// Every entry set to the given value
    ///
    /// With rank above one all columns coincide, which makes the first Gram
    /// system singular.
    Constant(f64),
    /// Uniform entries in `[0, 1)`, seeded per mode from `seed`
    Random { seed: u64 },
}

impl Default for InitStrategy {
    fn default() -> Self {
        Self::Random { seed: DEFAULT_SEED }
    }
}

/// Options for a CPD-ALS run
///
/// ```
/// use sptol_core::Degeneracy;
/// use sptol_decomp::CpdOptions;
///
/// let options = CpdOptions::new(8)
///     .with_niters(100)
///     .with_tol(1e-6)
///     .with_degeneracy(Degeneracy::SkipColumn);
/// assert_eq!(options.nthreads, None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CpdOptions {
    /// Number of rank-1 components
    pub rank: usize,
    /// Maximum number of sweeps
    pub niters: usize,
    /// Stop when the fit changes by less than this between sweeps
    pub tol: f64,
    /// Worker threads; `None` runs the sequential solver
    pub nthreads: Option<usize>,
    /// Factor initialization
    pub init: InitStrategy,
    /// Handling of zero-norm columns during normalization
    pub degeneracy: Degeneracy,
}

impl Default for CpdOptions {
    fn default() -> Self {
        Self {
            rank: 1,
            niters: 50,
            tol: 1e-5,
            nthreads: None,
            init: InitStrategy::default(),
            degeneracy: Degeneracy::default(),
        }
    }
}

impl CpdOptions {
    /// Default options for the given rank
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            ..Default::default()
        }
    }

    pub fn with_niters(mut self, niters: usize) -> Self {
        self.niters = niters;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Run the parallel solver on `nthreads` workers
    pub fn with_threads(mut self, nthreads: usize) -> Self {
        self.nthreads = Some(nthreads);
        self
    }

    /// Run the parallel solver with the thread count from `SPTOL_NUM_THREADS`,
    /// or rayon's CPU count when unset
    #[cfg(feature = "parallel")]
    pub fn with_default_threads(self) -> Self {
        self.with_threads(default_num_threads())
    }

    pub fn with_init(mut self, init: InitStrategy) -> Self {
        self.init = init;
        self
    }

    pub fn with_degeneracy(mut self, degeneracy: Degeneracy) -> Self {
        self.degeneracy = degeneracy;
        self
    }

    fn validate<T: Scalar>(&self, tensor: &SparseTensor<T>) -> SptResult<()> {
        let invalid = |reason: String| Err(SptError::value_error("cpd_als", reason));
        if self.rank == 0 {
            return invalid("rank must be at least 1".into());
        }
        if self.niters == 0 {
            return invalid("niters must be at least 1".into());
        }
        if self.tol.is_nan() || self.tol < 0.0 {
            return invalid(format!("tolerance must be a non-negative number, got {}", self.tol));
        }
        if self.nthreads == Some(0) {
            return invalid("thread count must be at least 1".into());
        }
        if tensor.nnz() == 0 {
            return invalid("tensor has no nonzeros".into());
        }
        Ok(())
    }
}

enum Backend {
    Sequential,
    #[cfg(feature = "parallel")]
    Parallel(WorkerPool),
}

impl Backend {
    fn from_options(options: &CpdOptions) -> SptResult<Self> {
        match options.nthreads {
            None => Ok(Self::Sequential),
            #[cfg(feature = "parallel")]
            Some(n) => Ok(Self::Parallel(WorkerPool::new(n)?)),
            #[cfg(not(feature = "parallel"))]
            Some(n) => {
                log::warn!("cpd_als: built without `parallel`, ignoring {} threads", n);
                Ok(Self::Sequential)
            }
        }
    }

    fn nworkers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            #[cfg(feature = "parallel")]
            Self::Parallel(pool) => pool.nthreads(),
        }
    }
}

/// Buffers owned by one solver run
struct AlsWorkspace<T> {
    /// Gram matrix per mode, plus the combined matrix in the last slot
    ata: Vec<Matrix<T>>,
    identity: Matrix<T>,
    inverse: Matrix<T>,
    /// MTTKRP output, `max(ndims) × rank`
    tmp: Matrix<T>,
    scratch: MttkrpScratch<T>,
    mode_order: Vec<usize>,
    lambda: Vec<T>,
}

impl<T: Scalar> AlsWorkspace<T> {
    fn new(tensor: &SparseTensor<T>, rank: usize, backend: &Backend) -> Self {
        let nmodes = tensor.nmodes();
        let max_dim = tensor.ndims().iter().copied().max().unwrap_or(0);
        let scratch = match backend {
            Backend::Sequential => MttkrpScratch::new(tensor.nnz(), rank),
            #[cfg(feature = "parallel")]
            Backend::Parallel(_) => {
                MttkrpScratch::with_workers(tensor.nnz(), max_dim, rank, backend.nworkers())
            }
        };
        Self {
            ata: (0..=nmodes).map(|_| Matrix::new(rank, rank)).collect(),
            identity: Matrix::identity(rank),
            inverse: Matrix::new(rank, rank),
            tmp: Matrix::new(max_dim, rank),
            scratch,
            mode_order: Vec::with_capacity(nmodes.saturating_sub(1)),
            lambda: vec![T::zero(); rank],
        }
    }

    fn compute_grams(&mut self, factors: &[Matrix<T>], backend: &Backend) -> SptResult<()> {
        let nmodes = factors.len();
        let grams = &mut self.ata[..nmodes];
        match backend {
            Backend::Sequential => grams
                .iter_mut()
                .zip(factors)
                .try_for_each(|(g, f)| linalg::transpose_multiply(f, f, g)),
            #[cfg(feature = "parallel")]
            Backend::Parallel(pool) => pool.install(|| {
                grams
                    .par_iter_mut()
                    .zip(factors.par_iter())
                    .try_for_each(|(g, f)| linalg::transpose_multiply(f, f, g))
            }),
        }
    }

    fn update_mode(
        &mut self,
        tensor: &SparseTensor<T>,
        factors: &mut [Matrix<T>],
        mode: usize,
        backend: &Backend,
        degeneracy: Degeneracy,
    ) -> SptResult<()> {
        self.tmp.reset_rows(tensor.ndims()[mode])?;
        self.mode_order.clear();
        self.mode_order
            .extend(descending_mode_order(factors.len(), mode));

        match backend {
            Backend::Sequential => mttkrp(
                tensor,
                factors,
                &mut self.tmp,
                &self.mode_order,
                mode,
                &mut self.scratch,
            )?,
            #[cfg(feature = "parallel")]
            Backend::Parallel(pool) => par_mttkrp(
                tensor,
                factors,
                &mut self.tmp,
                &self.mode_order,
                mode,
                &mut self.scratch,
                pool,
            )?,
        }

        let (combined, grams) = self
            .ata
            .split_last_mut()
            .ok_or_else(|| SptError::internal("cpd_als: Gram matrices missing"))?;
        combined.fill(T::one());
        for (_, gram) in grams.iter().enumerate().filter(|(m, _)| *m != mode) {
            linalg::hadamard_assign(combined, gram)?;
        }

        self.inverse.copy_from(&self.identity);
        linalg::solve_in_place(combined, &mut self.inverse)?;
        linalg::multiply(&self.tmp, &self.inverse, &mut factors[mode])?;
        linalg::normalize_columns(&mut factors[mode], &mut self.lambda, degeneracy)?;
        linalg::transpose_multiply(&factors[mode], &factors[mode], &mut grams[mode])
    }
}

fn initial_factors<T: Scalar>(
    tensor: &SparseTensor<T>,
    rank: usize,
    init: InitStrategy,
) -> Vec<Matrix<T>> {
    tensor
        .ndims()
        .iter()
        .enumerate()
        .map(|(m, &d)| match init {
            InitStrategy::Constant(v) => Matrix::constant(d, rank, T::from_f64_lossy(v)),
            InitStrategy::Random { seed } => Matrix::random(d, rank, seed.wrapping_add(m as u64)),
        })
        .collect()
}

fn check_factors<T: Scalar>(
    tensor: &SparseTensor<T>,
    factors: &[Matrix<T>],
    rank: usize,
) -> SptResult<()> {
    if factors.len() != tensor.nmodes() {
        return Err(SptError::shape_mismatch(
            "cpd_als",
            vec![tensor.nmodes()],
            vec![factors.len()],
            "one initial factor per mode is required",
        ));
    }
    for (m, (f, &d)) in factors.iter().zip(tensor.ndims()).enumerate() {
        if f.shape() != (d, rank) {
            return Err(SptError::shape_mismatch(
                "cpd_als",
                vec![d, rank],
                vec![f.nrows(), f.ncols()],
                format!("initial factor {} must be ndims[{}] × rank", m, m),
            ));
        }
    }
    Ok(())
}

/// Sequential CPD-ALS with default options
///
/// # Errors
///
/// See [`cpd_als_from`].
///
/// # Examples
///
/// ```
/// use sptol_decomp::cpd_als;
/// use sptol_sparse::SparseTensor;
///
/// let x = SparseTensor::from_coords(
///     &[2, 3, 2],
///     &[vec![0, 0, 0], vec![1, 2, 1], vec![0, 1, 1], vec![1, 0, 0]],
///     &[1.0, 2.0, 3.0, 4.0],
/// )
/// .unwrap();
/// let k = cpd_als(&x, 2, 20, 1e-6).unwrap();
/// assert_eq!(k.lambda.len(), 2);
/// assert!(k.iters <= 20);
/// ```
pub fn cpd_als<T: Scalar>(
    tensor: &SparseTensor<T>,
    rank: usize,
    niters: usize,
    tol: f64,
) -> SptResult<KruskalTensor<T>> {
    let options = CpdOptions::new(rank).with_niters(niters).with_tol(tol);
    cpd_als_with(tensor, &options)
}

/// Parallel CPD-ALS on a pool of `nthreads` workers
///
/// Gram matrices and MTTKRP run in fork-join regions; mode updates stay in
/// order. Results agree with [`cpd_als`] up to summation order.
#[cfg(feature = "parallel")]
pub fn par_cpd_als<T: Scalar>(
    tensor: &SparseTensor<T>,
    rank: usize,
    niters: usize,
    tol: f64,
    nthreads: usize,
) -> SptResult<KruskalTensor<T>> {
    let options = CpdOptions::new(rank)
        .with_niters(niters)
        .with_tol(tol)
        .with_threads(nthreads);
    cpd_als_with(tensor, &options)
}

/// CPD-ALS with explicit options and the [`ReconstructionFit`] metric
pub fn cpd_als_with<T: Scalar>(
    tensor: &SparseTensor<T>,
    options: &CpdOptions,
) -> SptResult<KruskalTensor<T>> {
    options.validate(tensor)?;
    let factors = initial_factors(tensor, options.rank, options.init);
    cpd_als_from(tensor, factors, options, &ReconstructionFit)
}

/// CPD-ALS from caller-supplied initial factors and fit metric
///
/// `options.init` is ignored. The first hard error aborts the run and no
/// partial result is returned.
///
/// # Errors
///
/// - `ValueError` for `rank == 0`, `niters == 0`, a negative or NaN `tol`,
///   zero threads or an empty tensor
/// - `ShapeMismatch` if `factors` does not hold one `ndims[m] × rank` matrix
///   per mode
/// - `ZeroDivision` if a Gram system is singular, or a column collapses to
///   zero norm under [`Degeneracy::Fail`]
pub fn cpd_als_from<T, M>(
    tensor: &SparseTensor<T>,
    factors: Vec<Matrix<T>>,
    options: &CpdOptions,
    metric: &M,
) -> SptResult<KruskalTensor<T>>
where
    T: Scalar,
    M: FitMetric<T> + ?Sized,
{
    options.validate(tensor)?;
    check_factors(tensor, &factors, options.rank)?;
    let backend = Backend::from_options(options)?;
    let nmodes = tensor.nmodes();
    log::debug!(
        "cpd_als: rank {} over {} nonzeros in {} modes on {} worker(s)",
        options.rank,
        tensor.nnz(),
        nmodes,
        backend.nworkers()
    );

    let mut timer = Timer::started();
    let mut factors = factors;
    let mut ws = AlsWorkspace::new(tensor, options.rank, &backend);
    ws.compute_grams(&factors, &backend)?;

    let tensor_norm_sq = tensor.norm_squared();
    let tol = T::from_f64_lossy(options.tol);
    let mut fit = T::zero();
    let mut old_fit = T::zero();
    let mut iters = 0;

    for it in 0..options.niters {
        for mode in 0..nmodes {
            ws.update_mode(tensor, &mut factors, mode, &backend, options.degeneracy)?;
        }
        iters = it + 1;

        fit = metric.fit(&SweepState {
            tensor_norm_sq,
            lambda: &ws.lambda,
            factors: &factors,
            grams: &ws.ata[..nmodes],
            last_mttkrp: &ws.tmp,
        })?;
        log::debug!(
            "  its = {:3}  fit = {:0.5}  delta = {:+0.4e}",
            iters,
            fit.to_f64_lossy(),
            (fit - old_fit).to_f64_lossy()
        );
        if it > 0 && (fit - old_fit).abs() < tol {
            break;
        }
        old_fit = fit;
    }

    timer.stop();
    timer.log_elapsed("CPD-ALS");

    Ok(KruskalTensor {
        rank: options.rank,
        nmodes,
        lambda: ws.lambda,
        factors,
        fit,
        iters,
    })
}
