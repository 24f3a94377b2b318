//! # sptol-kernels
//!
//! MTTKRP (matricized tensor times Khatri-Rao product) over COO sparse tensors.
//!
//! For a tensor `X` and factor matrices `U₀..Uₙ₋₁` of rank `R`, MTTKRP along
//! `mode` computes
//!
//! ```text
//! M[c_mode][r] = Σ_i v_i · Π_{m ≠ mode} U_m[c_m(i)][r]
//! ```
//!
//! without materializing the Khatri-Rao product: each nonzero forms its own
//! rank-length product row in a reusable [`MttkrpScratch`] and scatters it
//! into the output row of its target coordinate.
//!
//! ## Quick Start
//!
//! ```rust
//! use sptol_core::Matrix;
//! use sptol_kernels::{descending_mode_order, mttkrp, MttkrpScratch};
//! use sptol_sparse::SparseTensor;
//!
//! let x = SparseTensor::from_coords(
//!     &[2, 2, 2],
//!     &[vec![0, 0, 0], vec![1, 1, 1]],
//!     &[2.0, 3.0],
//! )
//! .unwrap();
//! let factors: Vec<Matrix<f64>> = (0..3).map(|_| Matrix::constant(2, 1, 1.0)).collect();
//!
//! let mut out = Matrix::new(2, 1);
//! let mut scratch = MttkrpScratch::new(x.nnz(), 1);
//! let order = descending_mode_order(3, 0);
//! mttkrp(&x, &factors, &mut out, &order, 0, &mut scratch).unwrap();
//! assert_eq!(out.row(0), &[2.0]);
//! assert_eq!(out.row(1), &[3.0]);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default) - [`par_mttkrp`], which gives every worker a
//!   private partial output and reduces them in worker order

pub mod mttkrp;


pub use mttkrp::{descending_mode_order, mttkrp, MttkrpScratch};

#[cfg(feature = "parallel")]
pub use mttkrp::par_mttkrp;
