//! Row-major dense matrix with a padded row stride
//!
//! The logical `nrows × ncols` region lives inside a buffer of `cap` rows by
//! `stride` columns. `stride` is `ncols` rounded up to [`STRIDE_ALIGN`], so the
//! start of every row is aligned for vectorised kernels. Offsets are always
//! computed with `stride`, never with `ncols`.
//!
//! # Examples
//!
//! ```
//! use sptol_core::Matrix;
//!
//! let mut m = Matrix::<f64>::new(2, 3);
//! assert_eq!(m.stride(), 8);
//! m.set(1, 2, 4.0);
//! assert_eq!(m.row(1), &[0.0, 0.0, 4.0]);
//! ```

use crate::error::{SptError, SptResult};
use crate::scalar::Scalar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Row stride granularity, in elements
pub const STRIDE_ALIGN: usize = 8;

/// Round `ncols` up to the stride granularity
pub fn padded_stride(ncols: usize) -> usize {
    ncols.div_ceil(STRIDE_ALIGN).max(1) * STRIDE_ALIGN
}

/// Dense matrix stored row-major with padded rows
///
/// Equality compares the logical shape and entries only; capacity and padding
/// are ignored.
#[derive(Debug, Clone)]
pub struct Matrix<T> {
    nrows: usize,
    ncols: usize,
    cap: usize,
    stride: usize,
    values: Vec<T>,
}

impl<T: Scalar> Matrix<T> {
    /// Zero-filled `nrows × ncols` matrix
    pub fn new(nrows: usize, ncols: usize) -> Self {
        let stride = padded_stride(ncols);
        Self {
            nrows,
            ncols,
            cap: nrows,
            stride,
            values: vec![T::zero(); nrows * stride],
        }
    }

    /// Zero-filled matrix with room for `cap` rows before reallocating
    pub fn with_capacity(nrows: usize, ncols: usize, cap: usize) -> Self {
        let cap = cap.max(nrows);
        let stride = padded_stride(ncols);
        Self {
            nrows,
            ncols,
            cap,
            stride,
            values: vec![T::zero(); cap * stride],
        }
    }

    /// Matrix with every logical entry set to `value`
    pub fn constant(nrows: usize, ncols: usize, value: T) -> Self {
        let mut m = Self::new(nrows, ncols);
        m.fill(value);
        m
    }

    /// Identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m.set(i, i, T::one());
        }
        m
    }

    /// Matrix filled with uniform draws from `[0, 1)` using a seeded generator
    pub fn random(nrows: usize, ncols: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::random_with(nrows, ncols, &mut rng)
    }

    /// Matrix filled with uniform draws from `[0, 1)` using the given generator
    pub fn random_with<R: Rng>(nrows: usize, ncols: usize, rng: &mut R) -> Self {
        let mut m = Self::new(nrows, ncols);
        for i in 0..nrows {
            for x in m.row_mut(i) {
                *x = T::from_f64_lossy(rng.gen::<f64>());
            }
        }
        m
    }

    /// Build from a list of equally long rows
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<T>]) -> SptResult<Self> {
        let ncols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::new(rows.len(), ncols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(SptError::shape_mismatch(
                    "Matrix::from_rows",
                    vec![ncols],
                    vec![row.len()],
                    format!("row {} has a different length", i),
                ));
            }
            m.row_mut(i).copy_from_slice(row);
        }
        Ok(m)
    }

    /// Number of logical rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of logical columns
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of allocated rows
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Distance in elements between the starts of consecutive rows
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Entry at `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the logical region.
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(i < self.nrows && j < self.ncols, "index ({}, {}) out of bounds", i, j);
        self.values[i * self.stride + j]
    }

    /// Set entry `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is outside the logical region.
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        assert!(i < self.nrows && j < self.ncols, "index ({}, {}) out of bounds", i, j);
        self.values[i * self.stride + j] = value;
    }

    /// Logical columns of row `i`
    pub fn row(&self, i: usize) -> &[T] {
        let start = i * self.stride;
        &self.values[start..start + self.ncols]
    }

    /// Mutable logical columns of row `i`
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        let start = i * self.stride;
        &mut self.values[start..start + self.ncols]
    }

    /// Padded storage of the logical rows, `nrows * stride` elements
    pub fn as_slice(&self) -> &[T] {
        &self.values[..self.nrows * self.stride]
    }

    /// Mutable padded storage of the logical rows
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.nrows * self.stride;
        &mut self.values[..len]
    }

    /// Set every logical entry to `value`, leaving padding at zero
    pub fn fill(&mut self, value: T) {
        for i in 0..self.nrows {
            self.row_mut(i).fill(value);
        }
    }

    /// Zero the whole allocation, including rows past `nrows`
    pub fn clear(&mut self) {
        self.values.fill(T::zero());
    }

    /// Append one row, doubling the capacity when full
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `row.len() != ncols`.
    pub fn append_row(&mut self, row: &[T]) -> SptResult<()> {
        if row.len() != self.ncols {
            return Err(SptError::shape_mismatch(
                "Matrix::append_row",
                vec![self.ncols],
                vec![row.len()],
                "row length must equal the column count",
            ));
        }
        if self.nrows == self.cap {
            let new_cap = (self.cap * 2).max(2);
            self.values.resize(new_cap * self.stride, T::zero());
            self.cap = new_cap;
        }
        self.nrows += 1;
        let last = self.nrows - 1;
        self.row_mut(last).copy_from_slice(row);
        Ok(())
    }

    /// Change the logical row count, reallocating when it exceeds the capacity
    ///
    /// New rows are zero. Columns cannot be resized in place.
    pub fn resize_rows(&mut self, nrows: usize) {
        if nrows > self.cap {
            self.values.resize(nrows * self.stride, T::zero());
            self.cap = nrows;
        } else if nrows < self.nrows {
            let start = nrows * self.stride;
            let end = self.nrows * self.stride;
            self.values[start..end].fill(T::zero());
        }
        self.nrows = nrows;
    }

    /// Reuse the allocation for `nrows` logical rows, zeroing every row
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `nrows` exceeds the capacity; scratch buffers
    /// are sized once and must not grow.
    pub fn reset_rows(&mut self, nrows: usize) -> SptResult<()> {
        if nrows > self.cap {
            return Err(SptError::shape_mismatch(
                "Matrix::reset_rows",
                vec![self.cap],
                vec![nrows],
                "requested rows exceed the allocated capacity",
            ));
        }
        self.clear();
        self.nrows = nrows;
        Ok(())
    }

    /// Copy shape and logical contents of `src`, reusing the allocation when possible
    pub fn copy_from(&mut self, src: &Matrix<T>) {
        self.ncols = src.ncols;
        self.stride = src.stride;
        self.cap = src.nrows.max(self.values.len() / self.stride.max(1));
        self.values.resize(self.cap * self.stride, T::zero());
        self.values.fill(T::zero());
        self.values[..src.nrows * src.stride].copy_from_slice(src.as_slice());
        self.nrows = src.nrows;
    }

    /// Copy of the logical rows as nested vectors
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.nrows).map(|i| self.row(i).to_vec()).collect()
    }

    /// `(nrows, ncols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }
}

impl<T> Matrix<T> {
    fn logical_row(&self, i: usize) -> &[T] {
        let start = i * self.stride;
        &self.values[start..start + self.ncols]
    }
}

impl<T: PartialEq> PartialEq for Matrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nrows == other.nrows
            && self.ncols == other.ncols
            && (0..self.nrows).all(|i| self.logical_row(i) == other.logical_row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_rounding() {
        assert_eq!(padded_stride(1), 8);
        assert_eq!(padded_stride(8), 8);
        assert_eq!(padded_stride(9), 16);
        assert_eq!(padded_stride(0), 8);
    }

    #[test]
    fn test_new_is_zeroed() {
        let m = Matrix::<f64>::new(3, 5);
        assert_eq!(m.shape(), (3, 5));
        assert_eq!(m.stride(), 8);
        assert_eq!(m.as_slice().len(), 24);
        assert!(m.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_identity() {
        let m = Matrix::<f32>::identity(3);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(m.get(i, j), if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_constant_leaves_padding() {
        let m = Matrix::<f64>::constant(2, 3, 1.5);
        assert_eq!(m.row(0), &[1.5, 1.5, 1.5]);
        assert_eq!(m.as_slice()[3], 0.0);
    }

    #[test]
    fn test_append_row_doubles_capacity() {
        let mut m = Matrix::<f64>::new(0, 2);
        m.append_row(&[1.0, 2.0]).unwrap();
        m.append_row(&[3.0, 4.0]).unwrap();
        m.append_row(&[5.0, 6.0]).unwrap();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.cap(), 4);
        assert_eq!(m.row(2), &[5.0, 6.0]);

        assert!(m.append_row(&[1.0]).is_err());
    }

    #[test]
    fn test_resize_rows() {
        let mut m = Matrix::<f64>::constant(2, 2, 1.0);
        m.resize_rows(4);
        assert_eq!(m.nrows(), 4);
        assert_eq!(m.row(3), &[0.0, 0.0]);

        m.resize_rows(1);
        m.resize_rows(2);
        assert_eq!(m.row(1), &[0.0, 0.0]);
    }

    #[test]
    fn test_reset_rows_within_capacity() {
        let mut m = Matrix::<f64>::constant(5, 2, 3.0);
        m.reset_rows(2).unwrap();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.row(1), &[0.0, 0.0]);
        assert!(m.reset_rows(6).is_err());
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Matrix::<f64>::random(4, 3, 7);
        let b = Matrix::<f64>::random(4, 3, 7);
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let ok = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(ok.get(1, 0), 3.0);
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_copy_from() {
        let src = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        let mut dst = Matrix::<f64>::new(4, 1);
        dst.copy_from(&src);
        assert_eq!(dst.shape(), (1, 3));
        assert_eq!(dst.row(0), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_eq_ignores_capacity() {
        let mut grown = Matrix::<f64>::new(0, 3);
        grown.append_row(&[1.0, 2.0, 3.0]).unwrap();
        let exact = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert_ne!(grown.cap(), exact.cap());
        assert_eq!(grown, exact);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Factors<T> {
        weights: Vec<T>,
        mats: Vec<Matrix<T>>,
    }

    #[test]
    fn test_eq_through_derived_container() {
        let a = Factors {
            weights: vec![1.0f32],
            mats: vec![Matrix::from_rows(&[vec![1.0, 2.0]]).unwrap()],
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.mats[0].set(0, 1, 3.0);
        assert_ne!(a, b);
        // padding beyond the logical columns never takes part
        b.mats[0].set(0, 1, 2.0);
        b.mats[0].as_mut_slice()[5] = 7.0;
        assert_eq!(a, b);
    }
}
