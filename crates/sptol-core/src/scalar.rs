//! Element type accepted by sptol containers and kernels

use num_traits::{Float, NumAssign};
use std::fmt::{Debug, Display};
use std::iter::{Product, Sum};

/// Floating-point scalar stored in tensors and matrices
///
/// Implemented for `f32` and `f64` through the blanket impl below.
pub trait Scalar:
    Float + NumAssign + Sum + Product + Debug + Display + Default + Send + Sync + 'static
{
    /// Lossy conversion from `f64`, used for tolerances and random draws
    fn from_f64_lossy(value: f64) -> Self {
        <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::nan)
    }

    /// Lossy conversion to `f64`, used for fit reporting
    fn to_f64_lossy(self) -> f64 {
        num_traits::ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }
}

impl<T> Scalar for T where
    T: Float + NumAssign + Sum + Product + Debug + Display + Default + Send + Sync + 'static
{
}
