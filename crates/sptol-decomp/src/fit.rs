//! Fit metrics for CPD-ALS convergence
//!
//! A metric sees the solver state after a full sweep and returns a scalar
//! where larger is better. The solver stops once consecutive sweeps differ by
//! less than the tolerance.

use sptol_core::{Matrix, Scalar, SptError, SptResult};

/// Solver state available to a [`FitMetric`] after each sweep
#[derive(Debug, Clone, Copy)]
pub struct SweepState<'a, T> {
    /// `‖X‖²` of the input tensor
    pub tensor_norm_sq: T,
    /// Current component weights
    pub lambda: &'a [T],
    /// Current factor matrices
    pub factors: &'a [Matrix<T>],
    /// Gram matrices `AₘᵀAₘ` of the current factors, one per mode
    pub grams: &'a [Matrix<T>],
    /// MTTKRP of the last mode, computed with the other current factors
    pub last_mttkrp: &'a Matrix<T>,
}

/// Convergence metric evaluated once per sweep
pub trait FitMetric<T: Scalar> {
    /// Fit of the current model
    fn fit(&self, state: &SweepState<'_, T>) -> SptResult<T>;
}

impl<T: Scalar, F> FitMetric<T> for F
where
    F: Fn(&SweepState<'_, T>) -> SptResult<T>,
{
    fn fit(&self, state: &SweepState<'_, T>) -> SptResult<T> {
        self(state)
    }
}

/// Relative reconstruction fit, `1 - ‖X - K‖ / ‖X‖`
///
/// Uses `‖X - K‖² = ‖X‖² + ‖K‖² - 2⟨X, K⟩` where
/// `‖K‖² = λᵀ (⊛ₘ AₘᵀAₘ) λ` and `⟨X, K⟩ = Σᵣ λᵣ Σᵢ A_last[i][r] · M[i][r]`
/// with `M` the last mode's MTTKRP, so the model is never reconstructed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionFit;

impl<T: Scalar> FitMetric<T> for ReconstructionFit {
    fn fit(&self, state: &SweepState<'_, T>) -> SptResult<T> {
        let rank = state.lambda.len();
        let last = state.factors.last().ok_or_else(|| {
            SptError::internal("ReconstructionFit: no factor matrices")
        })?;
        if state.last_mttkrp.nrows() < last.nrows() || state.last_mttkrp.ncols() != rank {
            return Err(SptError::shape_mismatch(
                "ReconstructionFit",
                vec![last.nrows(), rank],
                vec![state.last_mttkrp.nrows(), state.last_mttkrp.ncols()],
                "last MTTKRP must match the last factor",
            ));
        }

        let mut model_norm_sq = T::zero();
        for r in 0..rank {
            for s in 0..rank {
                let gram: T = state.grams.iter().map(|g| g.get(r, s)).product();
                model_norm_sq += state.lambda[r] * state.lambda[s] * gram;
            }
        }

        let mut inner = T::zero();
        for i in 0..last.nrows() {
            for (r, (&a, &m)) in last.row(i).iter().zip(state.last_mttkrp.row(i)).enumerate() {
                inner += state.lambda[r] * a * m;
            }
        }

        if state.tensor_norm_sq <= T::zero() {
            return Ok(T::zero());
        }
        let two = T::one() + T::one();
        let residual_sq = (state.tensor_norm_sq + model_norm_sq - two * inner).max(T::zero());
        Ok(T::one() - residual_sq.sqrt() / state.tensor_norm_sq.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_model_fits_perfectly() {
        // X = 3 · e₀ ∘ e₁ in a 2×2 tensor, K equal to X
        let a0 = Matrix::<f64>::from_rows(&[vec![1.0], vec![0.0]]).unwrap();
        let a1 = Matrix::from_rows(&[vec![0.0], vec![1.0]]).unwrap();
        let grams = vec![Matrix::constant(1, 1, 1.0), Matrix::constant(1, 1, 1.0)];
        // MTTKRP along mode 1: row 1 = 3 · a0[0] = 3
        let m = Matrix::from_rows(&[vec![0.0], vec![3.0]]).unwrap();
        let state = SweepState {
            tensor_norm_sq: 9.0,
            lambda: &[3.0],
            factors: &[a0, a1],
            grams: &grams,
            last_mttkrp: &m,
        };
        let fit: f64 = ReconstructionFit.fit(&state).unwrap();
        assert!((fit - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_model_has_zero_fit() {
        let a = Matrix::<f64>::from_rows(&[vec![1.0], vec![0.0]]).unwrap();
        let grams = vec![Matrix::constant(1, 1, 1.0), Matrix::constant(1, 1, 1.0)];
        let m = Matrix::from_rows(&[vec![0.0], vec![3.0]]).unwrap();
        let state = SweepState {
            tensor_norm_sq: 9.0,
            lambda: &[0.0],
            factors: &[a.clone(), a],
            grams: &grams,
            last_mttkrp: &m,
        };
        assert_eq!(ReconstructionFit.fit(&state).unwrap(), 0.0);
    }

    #[test]
    fn test_closure_metric() {
        let metric = |state: &SweepState<'_, f64>| -> SptResult<f64> { Ok(state.lambda.iter().sum()) };
        let m = Matrix::new(1, 2);
        let state = SweepState {
            tensor_norm_sq: 1.0,
            lambda: &[0.5, 0.25],
            factors: &[],
            grams: &[],
            last_mttkrp: &m,
        };
        assert_eq!(metric.fit(&state).unwrap(), 0.75);
    }
}
