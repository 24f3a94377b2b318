//! # sptol-core
//!
//! Shared building blocks for the sptol sparse tensor stack.
//!
//! This crate provides:
//! - [`SptError`] - the error taxonomy used by every sptol crate
//! - [`Scalar`] - the floating-point element trait
//! - [`Matrix`] - a row-major dense matrix with a padded row stride
//! - [`linalg`] - the small dense backend CPD-ALS relies on, on top of nalgebra
//!   (multiply, transpose-multiply, LU solve, column normalisation)
//! - [`WorkerPool`] - a sized rayon pool for fork-join regions (feature `parallel`)
//! - [`Timer`] - wall-clock timing for reporting
//!
//! ## Features
//!
//! - `parallel` (default) - enable [`WorkerPool`] backed by rayon

pub mod error;
pub mod linalg;
pub mod matrix;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod scalar;
pub mod timer;

#[cfg(test)]
mod property_tests;

pub use error::{ErrorKind, SptError, SptResult};
pub use linalg::Degeneracy;
pub use matrix::{Matrix, STRIDE_ALIGN};
#[cfg(feature = "parallel")]
pub use parallel::{default_num_threads, partition_ranges, WorkerPool, NUM_THREADS_ENV};
pub use scalar::Scalar;
pub use timer::Timer;
