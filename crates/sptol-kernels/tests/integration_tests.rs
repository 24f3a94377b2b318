//! Integration tests for sptol-kernels with sptol-sparse tensors
//!
//! These tests run MTTKRP on tensors built and reordered through the sparse
//! tensor API.

use sptol_core::{linalg, ErrorKind, Matrix};
use sptol_kernels::{descending_mode_order, mttkrp, MttkrpScratch};
use sptol_sparse::{ttm, SparseTensor};

#[test]
fn test_toy_cube_all_ones() {
    // two nonzeros in a 2×2×2 cube, rank-1 all-ones factors
    let x = SparseTensor::from_coords(&[2, 2, 2], &[vec![0, 0, 0], vec![1, 0, 1]], &[3.0, 5.0])
        .unwrap();
    let factors: Vec<Matrix<f64>> = (0..3).map(|_| Matrix::constant(2, 1, 1.0)).collect();
    let mut scratch = MttkrpScratch::new(x.nnz(), 1);
    let mut out = Matrix::new(2, 1);

    mttkrp(&x, &factors, &mut out, &descending_mode_order(3, 0), 0, &mut scratch).unwrap();
    assert_eq!(out.to_rows(), vec![vec![3.0], vec![5.0]]);

    // both nonzeros share index 0 on mode 1
    mttkrp(&x, &factors, &mut out, &descending_mode_order(3, 1), 1, &mut scratch).unwrap();
    assert_eq!(out.to_rows(), vec![vec![8.0], vec![0.0]]);
}

#[test]
fn test_shape_mismatch_leaves_output() {
    let x = SparseTensor::from_coords(&[2, 2, 2], &[vec![0, 1, 1]], &[1.0]).unwrap();
    let factors = vec![
        Matrix::constant(2, 2, 1.0),
        Matrix::constant(5, 2, 1.0),
        Matrix::constant(2, 2, 1.0),
    ];
    let mut scratch = MttkrpScratch::new(x.nnz(), 2);
    let mut out = Matrix::constant(2, 2, 42.0);
    let before = out.clone();

    let err = mttkrp(&x, &factors, &mut out, &[2, 1], 0, &mut scratch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    assert_eq!(out, before);
}

#[test]
fn test_scratch_reused_across_modes() {
    let x = SparseTensor::from_coords(
        &[3, 4, 2],
        &[vec![0, 3, 1], vec![2, 0, 0], vec![1, 1, 1], vec![2, 3, 0]],
        &[1.0, -2.0, 0.5, 4.0],
    )
    .unwrap();
    let factors: Vec<Matrix<f64>> = x
        .ndims()
        .iter()
        .enumerate()
        .map(|(m, &d)| Matrix::random(d, 3, m as u64))
        .collect();
    let mut scratch = MttkrpScratch::new(x.nnz(), 3);
    let mut out = Matrix::new(4, 3);

    for mode in [0, 1, 2, 0] {
        out.reset_rows(x.ndims()[mode]).unwrap();
        mttkrp(&x, &factors, &mut out, &descending_mode_order(3, mode), mode, &mut scratch)
            .unwrap();
        let total: f64 = (0..out.nrows()).flat_map(|i| out.row(i).to_vec()).sum();
        assert!(total.is_finite());
        assert_eq!(out.nrows(), x.ndims()[mode]);
    }
}

#[test]
fn test_mttkrp_agrees_with_ttm_chain() {
    // for a two-mode tensor, MTTKRP along mode 0 is X · U₁
    let x = SparseTensor::from_coords(
        &[3, 2],
        &[vec![0, 0], vec![2, 1], vec![1, 1]],
        &[2.0, -1.0, 3.0],
    )
    .unwrap();
    let u0 = Matrix::constant(3, 2, 1.0);
    let u1 = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();

    let mut out = Matrix::new(3, 2);
    let mut scratch = MttkrpScratch::new(x.nnz(), 2);
    mttkrp(&x, &[u0, u1.clone()], &mut out, &[1], 0, &mut scratch).unwrap();

    let y = ttm(&x, &u1, 1).unwrap();
    let mut dense = Matrix::new(3, 2);
    linalg::multiply(&x.to_matrix().unwrap(), &u1, &mut dense).unwrap();
    assert_eq!(out, dense);
    for f in 0..y.nnz() {
        assert_eq!(y.fiber(f), out.row(y.indices(0)[f]));
    }
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_kernel_on_sorted_tensor() {
    use sptol_core::WorkerPool;
    use sptol_kernels::par_mttkrp;

    let coords: Vec<Vec<usize>> = (0..6)
        .flat_map(|i| (0..5).map(move |j| vec![i, j, (i + j) % 4]))
        .collect();
    let values: Vec<f64> = (0..coords.len()).map(|k| k as f64 * 0.25 - 3.0).collect();
    let mut x = SparseTensor::from_coords(&[6, 5, 4], &coords, &values).unwrap();
    x.sort_index_at_mode(1).unwrap();

    let factors: Vec<Matrix<f64>> = [6, 5, 4]
        .iter()
        .enumerate()
        .map(|(m, &d)| Matrix::random(d, 4, 100 + m as u64))
        .collect();
    let order = descending_mode_order(3, 1);
    let pool = WorkerPool::new(3).unwrap();
    let mut scratch = MttkrpScratch::with_workers(x.nnz(), 6, 4, 3);

    let mut seq = Matrix::new(5, 4);
    let mut par = Matrix::new(5, 4);
    mttkrp(&x, &factors, &mut seq, &order, 1, &mut scratch).unwrap();
    par_mttkrp(&x, &factors, &mut par, &order, 1, &mut scratch, &pool).unwrap();
    for i in 0..5 {
        for (a, b) in seq.row(i).iter().zip(par.row(i)) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
