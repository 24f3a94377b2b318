//! Kruskal (CP) form of a decomposed tensor
//!
//! X ≈ Σᵣ λᵣ (a₀ᵣ ∘ a₁ᵣ ∘ ... ∘ aₙ₋₁ᵣ)

use sptol_core::{Matrix, Scalar, SptError, SptResult};

/// Result of a CP decomposition
#[derive(Debug, Clone, PartialEq)]
pub struct KruskalTensor<T> {
    /// Number of rank-1 components
    pub rank: usize,
    /// Number of modes of the decomposed tensor
    pub nmodes: usize,
    /// Component weights, one per rank
    pub lambda: Vec<T>,
    /// Factor matrices with unit-norm columns, `ndims[m] × rank` each
    pub factors: Vec<Matrix<T>>,
    /// Fit reported by the metric after the last sweep
    pub fit: T,
    /// Number of sweeps performed
    pub iters: usize,
}

impl<T: Scalar> KruskalTensor<T> {
    /// Size of each mode, taken from the factor row counts
    pub fn ndims(&self) -> Vec<usize> {
        self.factors.iter().map(|f| f.nrows()).collect()
    }

    /// Reconstructed value at `coord`
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if `coord` does not have one entry per mode
    /// - `ValueError` if an index is out of range
    pub fn value_at(&self, coord: &[usize]) -> SptResult<T> {
        if coord.len() != self.nmodes {
            return Err(SptError::shape_mismatch(
                "KruskalTensor::value_at",
                vec![self.nmodes],
                vec![coord.len()],
                "coordinate must have one index per mode",
            ));
        }
        for (m, (&c, factor)) in coord.iter().zip(&self.factors).enumerate() {
            if c >= factor.nrows() {
                return Err(SptError::value_error(
                    "KruskalTensor::value_at",
                    format!("index {} out of range for mode {} of size {}", c, m, factor.nrows()),
                ));
            }
        }

        let mut value = T::zero();
        for (r, &weight) in self.lambda.iter().enumerate() {
            let term = coord
                .iter()
                .zip(&self.factors)
                .fold(weight, |acc, (&c, factor)| acc * factor.get(c, r));
            value += term;
        }
        Ok(value)
    }

    /// Squared Frobenius norm, `λᵀ (⊛ₘ AₘᵀAₘ) λ`, without reconstructing the tensor
    pub fn norm_squared(&self) -> T {
        let mut total = T::zero();
        for r in 0..self.rank {
            for s in 0..self.rank {
                let gram: T = self
                    .factors
                    .iter()
                    .map(|f| (0..f.nrows()).map(|i| f.get(i, r) * f.get(i, s)).sum::<T>())
                    .product();
                total += self.lambda[r] * self.lambda[s] * gram;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sptol_core::ErrorKind;

    fn rank_one() -> KruskalTensor<f64> {
        KruskalTensor {
            rank: 1,
            nmodes: 2,
            lambda: vec![2.0],
            factors: vec![
                Matrix::from_rows(&[vec![0.6], vec![0.8]]).unwrap(),
                Matrix::from_rows(&[vec![1.0], vec![0.0], vec![0.0]]).unwrap(),
            ],
            fit: 1.0,
            iters: 1,
        }
    }

    #[test]
    fn test_value_at() {
        let k = rank_one();
        assert_eq!(k.ndims(), vec![2, 3]);
        assert!((k.value_at(&[1, 0]).unwrap() - 1.6).abs() < 1e-12);
        assert_eq!(k.value_at(&[1, 2]).unwrap(), 0.0);
    }

    #[test]
    fn test_value_at_rejects_bad_coord() {
        let k = rank_one();
        assert_eq!(k.value_at(&[0]).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        assert_eq!(k.value_at(&[0, 3]).unwrap_err().kind(), ErrorKind::ValueError);
    }

    #[test]
    fn test_norm_squared() {
        // unit columns, so the norm is the weight
        let k = rank_one();
        assert!((k.norm_squared() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_clone_compares_equal() {
        let k = rank_one();
        let mut other = k.clone();
        assert_eq!(k, other);
        other.factors[1].set(2, 0, 0.5);
        assert_ne!(k, other);
    }
}
