//! # sptol-decomp - CP decomposition of sparse tensors
//!
//! CPD-ALS (Canonical Polyadic Decomposition via Alternating Least Squares)
//! over COO sparse tensors:
//!
//! ```text
//! X ≈ Σᵣ λᵣ (a₀ᵣ ∘ a₁ᵣ ∘ ... ∘ aₙ₋₁ᵣ)
//! ```
//!
//! **Entry points:**
//! - [`cpd_als`]: sequential solver with default options
//! - [`par_cpd_als`]: the same on a sized worker pool (feature `parallel`)
//! - [`cpd_als_with`]: explicit [`CpdOptions`] (initialization, degeneracy policy, threads)
//! - [`cpd_als_from`]: caller-supplied initial factors and [`FitMetric`]
//!
//! Sweeps are logged at `debug` level and the total run time at `info` level
//! through the `log` facade.
//!
//! ## Example
//!
//! ```rust
//! use sptol_decomp::{cpd_als_with, CpdOptions, InitStrategy};
//! use sptol_sparse::SparseTensor;
//!
//! let mut x = SparseTensor::new(&[4, 3, 2]).unwrap();
//! for i in 0..4 {
//!     for j in 0..3 {
//!         x.append(&[i, j, (i + j) % 2], (i + 1) as f64 * (j + 1) as f64).unwrap();
//!     }
//! }
//!
//! let options = CpdOptions::new(2)
//!     .with_niters(25)
//!     .with_init(InitStrategy::Random { seed: 7 });
//! let k = cpd_als_with(&x, &options).unwrap();
//! assert_eq!(k.factors.len(), 3);
//! assert!(k.fit <= 1.0);
//! ```

pub mod cpd;
pub mod fit;
pub mod kruskal;


#[cfg(feature = "parallel")]
pub use cpd::par_cpd_als;
pub use cpd::{cpd_als, cpd_als_from, cpd_als_with, CpdOptions, InitStrategy, DEFAULT_SEED};
pub use fit::{FitMetric, ReconstructionFit, SweepState};
pub use kruskal::KruskalTensor;
pub use sptol_core::Degeneracy;
