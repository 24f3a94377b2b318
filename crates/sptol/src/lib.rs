//! # sptol - Sparse Tensor Algebra
//!
//! Sparse tensor storage, MTTKRP and CPD-ALS, sequential and multi-threaded.
//!
//! This is the **meta crate** that re-exports all sptol components for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use sptol::prelude::*;
//!
//! let mut x = SparseTensor::<f64>::new(&[3, 3, 2])?;
//! x.append(&[0, 1, 0], 1.0)?;
//! x.append(&[2, 2, 1], 2.0)?;
//! x.append(&[1, 0, 1], 3.0)?;
//! x.sort_index_at_mode(0)?;
//!
//! let k = cpd_als(&x, 1, 20, 1e-6)?;
//! assert_eq!(k.factors.len(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Dense Primitives ([`core`])
//!
//! Error taxonomy, the strided [`core::Matrix`], the dense linear-algebra
//! backend and the worker pool.
//!
//! ```
//! use sptol::core::{linalg, Matrix};
//!
//! let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
//! let mut gram = Matrix::new(2, 2);
//! linalg::transpose_multiply(&a, &a, &mut gram).unwrap();
//! assert_eq!(gram.row(0), &[10.0, 14.0]);
//! assert_eq!(a.stride(), 8);
//! ```
//!
//! ### Sparse Tensors ([`sparse`])
//!
//! COO and semi-sparse storage, sorting, element-wise operations and TTM.
//!
//! ```
//! use sptol::sparse::{SemiSparseTensor, SparseTensor};
//!
//! let mut x = SparseTensor::from_coords(
//!     &[2, 3],
//!     &[vec![1, 2], vec![0, 0], vec![1, 0]],
//!     &[1.0, 2.0, 3.0],
//! )
//! .unwrap();
//! x.sort_index_at_mode(1).unwrap();
//! let rows = SemiSparseTensor::from_sparse(&x, 1).unwrap();
//! assert_eq!(rows.fiber(1), &[3.0, 0.0, 1.0]);
//! ```
//!
//! ### Kernels ([`kernels`])
//!
//! MTTKRP with a reusable scratch workspace.
//!
//! ### Decompositions ([`decomp`])
//!
//! CPD-ALS with pluggable fit metric and explicit degeneracy policy.
//!
//! ## Features
//!
//! - `parallel` (default) - rayon-backed parallel sort, TTM, MTTKRP and CPD-ALS

pub use sptol_core as core;
pub use sptol_decomp as decomp;
pub use sptol_kernels as kernels;
pub use sptol_sparse as sparse;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use sptol::prelude::*;
    //!
    //! let x = SparseTensor::<f64>::new(&[10, 20, 30]).unwrap();
    //! assert_eq!(x.nnz(), 0);
    //! ```

    // Core types
    pub use crate::core::{Degeneracy, ErrorKind, Matrix, Scalar, SptError, SptResult, Timer};
    #[cfg(feature = "parallel")]
    pub use crate::core::WorkerPool;

    // Sparse storage
    pub use crate::sparse::{SemiSparseTensor, SparseTensor};

    // Kernels
    pub use crate::kernels::{descending_mode_order, mttkrp, MttkrpScratch};
    #[cfg(feature = "parallel")]
    pub use crate::kernels::par_mttkrp;

    // Decomposition
    pub use crate::decomp::{
        cpd_als, cpd_als_from, cpd_als_with, CpdOptions, FitMetric, InitStrategy, KruskalTensor,
        ReconstructionFit,
    };
    #[cfg(feature = "parallel")]
    pub use crate::decomp::par_cpd_als;
}
