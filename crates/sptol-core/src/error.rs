//! Error types shared by all sptol crates
//!
//! Every fallible operation returns [`SptResult`]. Errors fall into four kinds:
//!
//! - **ShapeMismatch**: tensor/factor dimensions or ranks disagree
//! - **ValueError**: invalid parameters (zero rank, bad mode index, unsorted input)
//! - **ZeroDivision**: zero-norm column normalisation, singular solve, division by zero
//! - **Internal**: failures outside the numeric contract (thread pool creation)
//!
//! # Examples
//!
//! ```
//! use sptol_core::{ErrorKind, SptError};
//!
//! let err = SptError::shape_mismatch("mttkrp", vec![4], vec![3], "factor 1 rows");
//! assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
//! assert!(err.to_string().contains("mttkrp"));
//! ```

use thiserror::Error;

/// Top-level error type for sptol operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SptError {
    /// Dimension or rank disagreement between operands
    #[error("{operation}: shape mismatch - expected {expected:?}, got {actual:?}. {context}")]
    ShapeMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: String,
    },

    /// Invalid argument value
    #[error("{operation}: invalid value - {reason}")]
    ValueError { operation: String, reason: String },

    /// Numeric degeneracy
    #[error("{operation}: division by zero - {reason}")]
    ZeroDivision { operation: String, reason: String },

    /// Failure outside the numeric contract
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`SptError`], for matching on the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ShapeMismatch,
    ValueError,
    ZeroDivision,
    Internal,
}

/// Result type alias for sptol operations
pub type SptResult<T> = Result<T, SptError>;

impl SptError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: impl Into<String>,
    ) -> Self {
        SptError::ShapeMismatch {
            operation: operation.into(),
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn value_error(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        SptError::ValueError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a zero division error
    pub fn zero_division(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        SptError::ZeroDivision {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        SptError::Internal(message.into())
    }

    /// Error kind, independent of the message payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            SptError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            SptError::ValueError { .. } => ErrorKind::ValueError,
            SptError::ZeroDivision { .. } => ErrorKind::ZeroDivision,
            SptError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check a mode index against the number of modes
    pub fn check_mode(operation: &str, mode: usize, nmodes: usize) -> SptResult<()> {
        if mode >= nmodes {
            return Err(SptError::value_error(
                operation,
                format!("mode {} out of range for tensor with {} modes", mode, nmodes),
            ));
        }
        Ok(())
    }
}
