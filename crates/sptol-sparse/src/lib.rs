//! # sptol-sparse
//!
//! Sparse tensor storage and operations for sptol.
//!
//! This crate provides:
//! - [`SparseTensor`] - COO storage with per-mode index arrays and mode-ordered sorting
//! - [`SemiSparseTensor`] - one dense mode per fiber, the output of TTM
//! - Element-wise arithmetic (`add`, `sub`, `dot_mul`, `dot_div`, scalar scaling),
//!   with parallel `par_add` / `par_sub`
//! - Kronecker and Khatri-Rao products of sparse tensors
//! - Sparse tensor times dense matrix (`ttm`, `par_ttm`)
//!
//! ## Quick Start
//!
//! ```
//! use sptol_sparse::SparseTensor;
//!
//! let mut x = SparseTensor::<f64>::new(&[2, 3, 4]).unwrap();
//! x.append(&[1, 2, 3], 5.0).unwrap();
//! x.append(&[0, 1, 2], 1.0).unwrap();
//! x.sort_index_at_mode(0).unwrap();
//!
//! assert_eq!(x.sort_key(), 0);
//! assert_eq!(x.get(&[1, 2, 3]), Some(5.0));
//! ```
//!
//! ## Features
//!
//! - `parallel` (default) - parallel sorting plus parallel add / sub, TTM and Hadamard variants

pub mod kron;
pub mod ops;
pub mod semisparse;
pub mod sptensor;
pub mod ttm;

pub use kron::{khatri_rao, kronecker};
pub use ops::{add, dot_div, dot_mul, dot_mul_eq, sub};
#[cfg(feature = "parallel")]
pub use ops::{par_add, par_dot_mul_eq, par_sub};
pub use semisparse::SemiSparseTensor;
pub use sptensor::SparseTensor;
#[cfg(feature = "parallel")]
pub use ttm::par_ttm;
pub use ttm::ttm;
