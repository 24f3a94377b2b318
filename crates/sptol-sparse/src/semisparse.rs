//! Semi-sparse tensors: sparse coordinates over dense fibers
//!
//! One designated mode is stored densely. Every other mode stays sparse, and
//! each distinct combination of their coordinates owns one dense row (a
//! *fiber*) of length `ndims[mode]`, padded to the matrix stride. `nnz` counts
//! fibers, not scalars. The index array of the dense mode is kept empty.

use crate::sptensor::SparseTensor;
use sptol_core::{Matrix, Scalar, SptError, SptResult};
use std::cmp::Ordering;

/// Sparse tensor of dense fibers
#[derive(Debug, Clone, PartialEq)]
pub struct SemiSparseTensor<T> {
    ndims: Vec<usize>,
    mode: usize,
    inds: Vec<Vec<usize>>,
    /// Sparse modes by fiber sort priority
    order: Vec<usize>,
    values: Matrix<T>,
}

impl<T: Scalar> SemiSparseTensor<T> {
    /// Empty semi-sparse tensor, dense along `mode`
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if there are fewer than two modes, a mode has size
    /// zero or `mode` is out of range.
    pub fn new(ndims: &[usize], mode: usize) -> SptResult<Self> {
        if ndims.len() < 2 {
            return Err(SptError::value_error(
                "SemiSparseTensor::new",
                "a semi-sparse tensor needs at least two modes",
            ));
        }
        SptError::check_mode("SemiSparseTensor::new", mode, ndims.len())?;
        if let Some(m) = ndims.iter().position(|&d| d == 0) {
            return Err(SptError::value_error(
                "SemiSparseTensor::new",
                format!("mode {} has size zero", m),
            ));
        }
        Ok(Self {
            ndims: ndims.to_vec(),
            mode,
            inds: vec![Vec::new(); ndims.len()],
            order: (0..ndims.len()).filter(|&m| m != mode).collect(),
            values: Matrix::new(0, ndims[mode]),
        })
    }

    /// Group the nonzeros of `src` into fibers along `mode`
    ///
    /// `src` must be sorted with `mode` last in its mode order so that each
    /// fiber is contiguous. The fibers keep the order of the other modes from
    /// that sort. Cells of a fiber without a nonzero stay zero.
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if `mode` is out of range, the sort key differs
    /// from `mode` or the nonzeros are not in fiber order.
    pub fn from_sparse(src: &SparseTensor<T>, mode: usize) -> SptResult<Self> {
        let mut dest = Self::new(src.ndims(), mode)?;
        if src.sort_key() != mode {
            return Err(SptError::value_error(
                "SemiSparseTensor::from_sparse",
                format!(
                    "source sort key is mode {}, expected mode {}",
                    src.sort_key(),
                    mode
                ),
            ));
        }

        let prefix = src.fiber_order(mode);
        let zeros = vec![T::zero(); src.ndims()[mode]];
        for i in 0..src.nnz() {
            let new_fiber = if i == 0 {
                true
            } else {
                match src.compare(i - 1, i, &prefix) {
                    Ordering::Less => true,
                    Ordering::Equal => false,
                    Ordering::Greater => {
                        return Err(SptError::value_error(
                            "SemiSparseTensor::from_sparse",
                            format!("nonzero {} breaks fiber order; sort at mode {} first", i, mode),
                        ))
                    }
                }
            };
            if new_fiber {
                for &m in &prefix {
                    dest.inds[m].push(src.indices(m)[i]);
                }
                dest.values.append_row(&zeros)?;
            }
            let f = dest.nnz() - 1;
            dest.values.row_mut(f)[src.indices(mode)[i]] += src.values()[i];
        }
        dest.order = prefix;
        Ok(dest)
    }

    /// Expand back to coordinate format, dropping entries with `|v| <= epsilon`
    ///
    /// When the fibers are strictly ascending in their mode order, the result is
    /// marked sorted by that order followed by `mode`.
    pub fn to_sparse(&self, epsilon: T) -> SptResult<SparseTensor<T>> {
        let mut dest = SparseTensor::new(&self.ndims)?;
        let mut coord = vec![0; self.nmodes()];
        for f in 0..self.nnz() {
            for (m, c) in coord.iter_mut().enumerate() {
                if m != self.mode {
                    *c = self.inds[m][f];
                }
            }
            for (j, &v) in self.values.row(f).iter().enumerate() {
                if v.abs() > epsilon {
                    coord[self.mode] = j;
                    dest.append(&coord, v)?;
                }
            }
        }
        if self.is_sorted() {
            dest.mark_sorted(self.order.iter().copied().chain([self.mode]).collect());
        }
        Ok(dest)
    }

    /// Number of modes
    pub fn nmodes(&self) -> usize {
        self.ndims.len()
    }

    /// Size of each mode
    pub fn ndims(&self) -> &[usize] {
        &self.ndims
    }

    /// The dense mode
    pub fn mode(&self) -> usize {
        self.mode
    }

    /// Number of fibers
    pub fn nnz(&self) -> usize {
        self.values.nrows()
    }

    /// Row stride of the fiber matrix
    pub fn stride(&self) -> usize {
        self.values.stride()
    }

    /// Fiber coordinates along sparse mode `m`; empty for the dense mode
    pub fn indices(&self, m: usize) -> &[usize] {
        &self.inds[m]
    }

    /// Fibers as a `nnz × ndims[mode]` matrix
    pub fn values(&self) -> &Matrix<T> {
        &self.values
    }

    /// Mutable fiber matrix
    pub fn values_mut(&mut self) -> &mut Matrix<T> {
        &mut self.values
    }

    /// Dense values of fiber `f`
    pub fn fiber(&self, f: usize) -> &[T] {
        self.values.row(f)
    }

    /// Value at a full coordinate, scanning the fibers
    pub fn get(&self, coord: &[usize]) -> Option<T> {
        if coord.len() != self.nmodes() || coord[self.mode] >= self.ndims[self.mode] {
            return None;
        }
        (0..self.nnz())
            .find(|&f| {
                (0..self.nmodes())
                    .filter(|&m| m != self.mode)
                    .all(|m| self.inds[m][f] == coord[m])
            })
            .map(|f| self.values.get(f, coord[self.mode]))
    }

    fn sparse_modes(&self) -> Vec<usize> {
        (0..self.nmodes()).filter(|&m| m != self.mode).collect()
    }

    fn compare(&self, a: usize, b: usize, modes: &[usize]) -> Ordering {
        modes
            .iter()
            .map(|&m| self.inds[m][a].cmp(&self.inds[m][b]))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn is_sorted(&self) -> bool {
        (1..self.nnz()).all(|f| self.compare(f - 1, f, &self.order).is_lt())
    }

    /// Sort fibers by their sparse coordinates, ascending mode by mode
    pub fn sort_index(&mut self) {
        let modes = self.sparse_modes();
        self.order.clone_from(&modes);
        if self.nnz() <= 1 {
            return;
        }
        let mut perm: Vec<usize> = (0..self.nnz()).collect();
        perm.sort_unstable_by(|&a, &b| self.compare(a, b, &modes));

        for &m in &modes {
            let permuted: Vec<usize> = perm.iter().map(|&p| self.inds[m][p]).collect();
            self.inds[m] = permuted;
        }
        let mut values = Matrix::new(self.nnz(), self.values.ncols());
        for (f, &p) in perm.iter().enumerate() {
            values.row_mut(f).copy_from_slice(self.values.row(p));
        }
        self.values = values;
    }

    /// Positions in `reference` where each fiber along `mode` starts, plus `nnz` as sentinel
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if `reference` is not sorted with `mode` last.
    pub fn fiber_index(reference: &SparseTensor<T>, mode: usize) -> SptResult<Vec<usize>> {
        SptError::check_mode("fiber_index", mode, reference.nmodes())?;
        if reference.sort_key() != mode {
            return Err(SptError::value_error(
                "fiber_index",
                format!(
                    "reference sort key is mode {}, expected mode {}",
                    reference.sort_key(),
                    mode
                ),
            ));
        }
        let prefix = reference.fiber_order(mode);
        let mut index = Vec::new();
        for i in 0..reference.nnz() {
            if i == 0 || reference.compare(i - 1, i, &prefix).is_ne() {
                index.push(i);
            }
        }
        index.push(reference.nnz());
        Ok(index)
    }

    /// Lay out fibers following `fiber_index` over `reference`, all values zero
    ///
    /// `reference` must share every mode size with `self` except the dense mode.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the mode counts or sizes of the sparse modes differ
    /// - `ValueError` if `fiber_index` is empty or not ascending within `reference`
    pub fn set_indices(
        &mut self,
        fiber_index: &[usize],
        reference: &SparseTensor<T>,
    ) -> SptResult<()> {
        let same_sparse_dims = reference.nmodes() == self.nmodes()
            && (0..self.nmodes())
                .filter(|&m| m != self.mode)
                .all(|m| reference.ndims()[m] == self.ndims[m]);
        if !same_sparse_dims {
            return Err(SptError::shape_mismatch(
                "set_indices",
                self.ndims.clone(),
                reference.ndims().to_vec(),
                "sparse modes must agree with the reference",
            ));
        }
        let well_formed = !fiber_index.is_empty()
            && fiber_index.windows(2).all(|w| w[0] < w[1])
            && fiber_index.last().is_some_and(|&end| end <= reference.nnz());
        if !well_formed {
            return Err(SptError::value_error(
                "set_indices",
                "fiber index must ascend strictly and stay within the reference",
            ));
        }

        let nfibers = fiber_index.len() - 1;
        for m in self.sparse_modes() {
            self.inds[m] = fiber_index[..nfibers]
                .iter()
                .map(|&i| reference.indices(m)[i])
                .collect();
        }
        self.order = reference.fiber_order(self.mode);
        self.values = Matrix::new(nfibers, self.ndims[self.mode]);
        Ok(())
    }
}
