//! COO sparse tensor with per-mode index arrays
//!
//! Nonzero `i` sits at `(inds[0][i], ..., inds[n-1][i])` with value `values[i]`.
//! Sorting reorders every index array and the value array together so that
//! coordinates ascend lexicographically under a mode order whose last entry,
//! the *sort key*, is the least significant mode.

use sptol_core::{Matrix, Scalar, SptError, SptResult};
use std::cmp::Ordering;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Tensors with at least this many nonzeros are sorted with rayon
#[cfg(feature = "parallel")]
const PAR_SORT_THRESHOLD: usize = 1 << 15;

/// Sparse tensor in coordinate format
///
/// Coordinates are expected to be unique; [`SparseTensor::from_coords`]
/// enforces it, [`SparseTensor::append`] does not.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor<T> {
    ndims: Vec<usize>,
    sort_key: usize,
    sort_order: Option<Vec<usize>>,
    inds: Vec<Vec<usize>>,
    values: Vec<T>,
}

impl<T: Scalar> SparseTensor<T> {
    /// Empty tensor with the given mode sizes
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if `ndims` is empty or contains a zero.
    pub fn new(ndims: &[usize]) -> SptResult<Self> {
        if ndims.is_empty() {
            return Err(SptError::value_error(
                "SparseTensor::new",
                "a tensor needs at least one mode",
            ));
        }
        if let Some(m) = ndims.iter().position(|&d| d == 0) {
            return Err(SptError::value_error(
                "SparseTensor::new",
                format!("mode {} has size zero", m),
            ));
        }
        Ok(Self {
            ndims: ndims.to_vec(),
            sort_key: ndims.len() - 1,
            sort_order: None,
            inds: vec![Vec::new(); ndims.len()],
            values: Vec::new(),
        })
    }

    /// Build from coordinate tuples and values
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if lengths disagree or a coordinate has the wrong arity
    /// - `ValueError` if a coordinate is out of range or repeated
    pub fn from_coords(ndims: &[usize], coords: &[Vec<usize>], values: &[T]) -> SptResult<Self> {
        if coords.len() != values.len() {
            return Err(SptError::shape_mismatch(
                "SparseTensor::from_coords",
                vec![coords.len()],
                vec![values.len()],
                "one value per coordinate",
            ));
        }
        let mut tensor = Self::new(ndims)?;
        for m in 0..ndims.len() {
            tensor.inds[m].reserve(coords.len());
        }
        tensor.values.reserve(values.len());
        for (coord, &value) in coords.iter().zip(values) {
            tensor.append(coord, value)?;
        }

        let mut sorted = tensor.clone();
        sorted.sort_index();
        let order = sorted.natural_order();
        if let Some(i) = (1..sorted.nnz()).find(|&i| sorted.compare(i - 1, i, &order).is_eq()) {
            return Err(SptError::value_error(
                "SparseTensor::from_coords",
                format!("duplicate coordinate {:?}", sorted.coord(i)),
            ));
        }
        Ok(tensor)
    }

    /// Append one nonzero; amortised O(1)
    ///
    /// Clears the recorded sort order. Duplicates are not detected.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if `coord` has the wrong number of modes
    /// - `ValueError` if a coordinate is out of range
    pub fn append(&mut self, coord: &[usize], value: T) -> SptResult<()> {
        self.check_coord("SparseTensor::append", coord)?;
        for (ind, &c) in self.inds.iter_mut().zip(coord) {
            ind.push(c);
        }
        self.values.push(value);
        self.sort_order = None;
        Ok(())
    }

    pub(crate) fn check_coord(&self, operation: &str, coord: &[usize]) -> SptResult<()> {
        if coord.len() != self.nmodes() {
            return Err(SptError::shape_mismatch(
                operation,
                vec![self.nmodes()],
                vec![coord.len()],
                "coordinate arity must equal the number of modes",
            ));
        }
        if let Some(m) = (0..coord.len()).find(|&m| coord[m] >= self.ndims[m]) {
            return Err(SptError::value_error(
                operation,
                format!(
                    "coordinate {:?} out of range on mode {} (size {})",
                    coord, m, self.ndims[m]
                ),
            ));
        }
        Ok(())
    }

    /// Number of modes
    pub fn nmodes(&self) -> usize {
        self.ndims.len()
    }

    /// Size of each mode
    pub fn ndims(&self) -> &[usize] {
        &self.ndims
    }

    /// Number of stored nonzeros
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Least significant mode of the last sort
    pub fn sort_key(&self) -> usize {
        self.sort_key
    }

    /// Mode order of the last sort, if no append happened since
    pub fn sort_order(&self) -> Option<&[usize]> {
        self.sort_order.as_deref()
    }

    /// Coordinates of all nonzeros along `mode`
    pub fn indices(&self, mode: usize) -> &[usize] {
        &self.inds[mode]
    }

    /// Nonzero values
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable nonzero values; the coordinate layout cannot change through this
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Coordinate tuple of nonzero `i`
    pub fn coord(&self, i: usize) -> Vec<usize> {
        self.inds.iter().map(|ind| ind[i]).collect()
    }

    /// Value at `coord`, found by linear scan
    pub fn get(&self, coord: &[usize]) -> Option<T> {
        if coord.len() != self.nmodes() {
            return None;
        }
        (0..self.nnz())
            .find(|&i| self.inds.iter().zip(coord).all(|(ind, &c)| ind[i] == c))
            .map(|i| self.values[i])
    }

    /// Iterate over `(coordinate, value)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, T)> + '_ {
        (0..self.nnz()).map(move |i| (self.coord(i), self.values[i]))
    }

    /// Sum of squared values
    pub fn norm_squared(&self) -> T {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Mode order `0, 1, ..., n-1`
    pub fn natural_order(&self) -> Vec<usize> {
        (0..self.nmodes()).collect()
    }

    /// Mode order with `mode` last and the others ascending
    pub fn order_at_mode(&self, mode: usize) -> Vec<usize> {
        (0..self.nmodes())
            .filter(|&m| m != mode)
            .chain(std::iter::once(mode))
            .collect()
    }

    /// Sort in natural mode order; the last mode becomes the sort key
    pub fn sort_index(&mut self) {
        let order = self.natural_order();
        self.sort_checked(&order);
    }

    /// Sort with `mode` as the least significant mode
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if `mode` is out of range.
    pub fn sort_index_at_mode(&mut self, mode: usize) -> SptResult<()> {
        SptError::check_mode("sort_index_at_mode", mode, self.nmodes())?;
        let order = self.order_at_mode(mode);
        self.sort_checked(&order);
        Ok(())
    }

    /// Sort under an arbitrary mode permutation, most significant first
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if `order` is not a permutation of the modes.
    pub fn sort_by_order(&mut self, order: &[usize]) -> SptResult<()> {
        validate_permutation("sort_by_order", order, self.nmodes())?;
        self.sort_checked(order);
        Ok(())
    }

    /// Whether storage order ascends under `order`
    pub fn is_sorted_by(&self, order: &[usize]) -> bool {
        (1..self.nnz()).all(|i| self.compare(i - 1, i, order).is_le())
    }

    /// Whether the tensor is currently sorted with `mode` as sort key
    pub fn is_sorted_at_mode(&self, mode: usize) -> bool {
        mode < self.nmodes() && self.sort_order() == Some(&self.order_at_mode(mode)[..])
    }

    /// Whether the last sort ended in `mode`, so fibers along it are contiguous
    pub fn is_grouped_at_mode(&self, mode: usize) -> bool {
        self.sort_order().and_then(<[usize]>::last) == Some(&mode)
    }

    /// Sparse modes that order the fibers along `mode`, most significant first
    ///
    /// Taken from the last sort when it ended in `mode`, otherwise the
    /// remaining modes ascending.
    pub fn fiber_order(&self, mode: usize) -> Vec<usize> {
        match self.sort_order() {
            Some(order) if order.last() == Some(&mode) => order[..order.len() - 1].to_vec(),
            _ => (0..self.nmodes()).filter(|&m| m != mode).collect(),
        }
    }

    pub(crate) fn compare(&self, a: usize, b: usize, order: &[usize]) -> Ordering {
        order
            .iter()
            .map(|&m| self.inds[m][a].cmp(&self.inds[m][b]))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn sort_checked(&mut self, order: &[usize]) {
        if let Some(&key) = order.last() {
            self.sort_key = key;
        }
        self.sort_order = Some(order.to_vec());
        if self.nnz() <= 1 {
            return;
        }

        let mut perm: Vec<usize> = (0..self.nnz()).collect();
        let cmp = |&a: &usize, &b: &usize| self.compare(a, b, order);
        #[cfg(feature = "parallel")]
        {
            if perm.len() >= PAR_SORT_THRESHOLD {
                perm.par_sort_unstable_by(cmp);
            } else {
                perm.sort_unstable_by(cmp);
            }
        }
        #[cfg(not(feature = "parallel"))]
        perm.sort_unstable_by(cmp);

        self.permute(&perm);
    }

    fn permute(&mut self, perm: &[usize]) {
        for ind in self.inds.iter_mut() {
            let permuted: Vec<usize> = perm.iter().map(|&p| ind[p]).collect();
            *ind = permuted;
        }
        let values: Vec<T> = perm.iter().map(|&p| self.values[p]).collect();
        self.values = values;
    }

    /// Push nonzero `i` of `src` with a new value, skipping validation
    pub(crate) fn push_entry_of(&mut self, src: &SparseTensor<T>, i: usize, value: T) {
        for (dst, ind) in self.inds.iter_mut().zip(&src.inds) {
            dst.push(ind[i]);
        }
        self.values.push(value);
        self.sort_order = None;
    }

    pub(crate) fn mark_sorted(&mut self, order: Vec<usize>) {
        if let Some(&key) = order.last() {
            self.sort_key = key;
        }
        self.sort_order = Some(order);
    }

    /// Dense copy of a two-mode tensor
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` unless the tensor has exactly two modes.
    pub fn to_matrix(&self) -> SptResult<Matrix<T>> {
        if self.nmodes() != 2 {
            return Err(SptError::shape_mismatch(
                "SparseTensor::to_matrix",
                vec![2],
                vec![self.nmodes()],
                "only two-mode tensors convert to a matrix",
            ));
        }
        let mut m = Matrix::new(self.ndims[0], self.ndims[1]);
        for i in 0..self.nnz() {
            let (r, c) = (self.inds[0][i], self.inds[1][i]);
            let v = m.get(r, c) + self.values[i];
            m.set(r, c, v);
        }
        Ok(m)
    }

    /// Drop entries whose magnitude is at most `epsilon`
    pub fn prune(&mut self, epsilon: T) {
        let keep: Vec<usize> = (0..self.nnz())
            .filter(|&i| self.values[i].abs() > epsilon)
            .collect();
        if keep.len() == self.nnz() {
            return;
        }
        let order = self.sort_order.take();
        self.permute(&keep);
        self.sort_order = order;
    }

    /// Whether all stored values are zero
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| v.is_zero())
    }
}

pub(crate) fn validate_permutation(operation: &str, order: &[usize], nmodes: usize) -> SptResult<()> {
    if order.len() != nmodes {
        return Err(SptError::value_error(
            operation,
            format!("mode order {:?} must list all {} modes", order, nmodes),
        ));
    }
    let mut seen = vec![false; nmodes];
    for &m in order {
        if m >= nmodes || seen[m] {
            return Err(SptError::value_error(
                operation,
                format!("mode order {:?} is not a permutation", order),
            ));
        }
        seen[m] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sptol_core::ErrorKind;

    fn sample() -> SparseTensor<f64> {
        SparseTensor::from_coords(
            &[3, 3, 2],
            &[
                vec![2, 0, 1],
                vec![0, 1, 0],
                vec![1, 0, 1],
                vec![0, 0, 1],
                vec![0, 1, 1],
            ],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_shape() {
        assert_eq!(
            SparseTensor::<f64>::new(&[]).unwrap_err().kind(),
            ErrorKind::ValueError
        );
        assert_eq!(
            SparseTensor::<f64>::new(&[2, 0]).unwrap_err().kind(),
            ErrorKind::ValueError
        );
        let t = SparseTensor::<f64>::new(&[2, 3]).unwrap();
        assert_eq!(t.nnz(), 0);
        assert_eq!(t.sort_key(), 1);
    }

    #[test]
    fn test_append_validates() {
        let mut t = SparseTensor::<f64>::new(&[2, 2]).unwrap();
        assert_eq!(t.append(&[0], 1.0).unwrap_err().kind(), ErrorKind::ShapeMismatch);
        assert_eq!(t.append(&[0, 2], 1.0).unwrap_err().kind(), ErrorKind::ValueError);
        t.append(&[1, 1], 1.0).unwrap();
        assert_eq!(t.nnz(), 1);
    }

    #[test]
    fn test_from_coords_rejects_duplicates() {
        let err = SparseTensor::from_coords(&[2, 2], &[vec![0, 1], vec![0, 1]], &[1.0, 2.0])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueError);
    }

    #[test]
    fn test_sort_index_natural() {
        let mut t = sample();
        t.sort_index();
        let coords: Vec<_> = (0..t.nnz()).map(|i| t.coord(i)).collect();
        assert_eq!(
            coords,
            vec![
                vec![0, 0, 1],
                vec![0, 1, 0],
                vec![0, 1, 1],
                vec![1, 0, 1],
                vec![2, 0, 1]
            ]
        );
        assert_eq!(t.values(), &[4.0, 2.0, 5.0, 3.0, 1.0]);
        assert_eq!(t.sort_key(), 2);
    }

    #[test]
    fn test_sort_at_mode_zero() {
        let mut t = sample();
        t.sort_index_at_mode(0).unwrap();
        assert_eq!(t.sort_key(), 0);
        // order is (1, 2, 0)
        let coords: Vec<_> = (0..t.nnz()).map(|i| t.coord(i)).collect();
        assert_eq!(
            coords,
            vec![
                vec![0, 0, 1],
                vec![1, 0, 1],
                vec![2, 0, 1],
                vec![0, 1, 0],
                vec![0, 1, 1]
            ]
        );
        assert!(t.is_sorted_at_mode(0));
        assert!(!t.is_sorted_at_mode(1));
    }

    #[test]
    fn test_sort_by_order_rejects_bad_permutation() {
        let mut t = sample();
        assert_eq!(
            t.sort_by_order(&[0, 0, 1]).unwrap_err().kind(),
            ErrorKind::ValueError
        );
        assert_eq!(t.sort_by_order(&[0, 1]).unwrap_err().kind(), ErrorKind::ValueError);
        assert_eq!(
            t.sort_index_at_mode(3).unwrap_err().kind(),
            ErrorKind::ValueError
        );
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut t = sample();
        t.sort_by_order(&[2, 0, 1]).unwrap();
        let once = t.clone();
        t.sort_by_order(&[2, 0, 1]).unwrap();
        assert_eq!(t, once);
    }

    #[test]
    fn test_append_clears_sort_order() {
        let mut t = sample();
        t.sort_index();
        assert!(t.sort_order().is_some());
        t.append(&[2, 2, 0], 9.0).unwrap();
        assert!(t.sort_order().is_none());
    }

    #[test]
    fn test_get_after_sort() {
        let mut t = sample();
        t.sort_index_at_mode(1).unwrap();
        assert_eq!(t.get(&[1, 0, 1]), Some(3.0));
        assert_eq!(t.get(&[2, 2, 1]), None);
    }

    #[test]
    fn test_to_matrix() {
        let t = SparseTensor::from_coords(&[2, 3], &[vec![0, 2], vec![1, 0]], &[1.5, -2.0])
            .unwrap();
        let m = t.to_matrix().unwrap();
        assert_eq!(m.to_rows(), vec![vec![0.0, 0.0, 1.5], vec![-2.0, 0.0, 0.0]]);
        assert!(sample().to_matrix().is_err());
    }

    #[test]
    fn test_prune() {
        let mut t =
            SparseTensor::from_coords(&[4], &[vec![0], vec![1], vec![2]], &[1.0, 1e-9, -3.0])
                .unwrap();
        t.prune(1e-6);
        assert_eq!(t.nnz(), 2);
        assert_eq!(t.values(), &[1.0, -3.0]);
    }

    #[test]
    fn test_norm_squared() {
        assert_eq!(sample().norm_squared(), 1.0 + 4.0 + 9.0 + 16.0 + 25.0);
    }
}
