//! Integration tests for CPD-ALS on sparse tensors built through sptol-sparse

use sptol_core::{ErrorKind, Matrix};
use sptol_decomp::{cpd_als, cpd_als_from, cpd_als_with, CpdOptions, FitMetric, SweepState};
use sptol_sparse::SparseTensor;
use std::cell::RefCell;

/// Sparse rank-2 tensor: two disjoint blocks with distinct profiles
fn block_tensor() -> SparseTensor<f64> {
    let mut x = SparseTensor::new(&[6, 5, 4]).unwrap();
    for i in 0..3 {
        for j in 0..2 {
            for k in 0..2 {
                x.append(&[i, j, k], (i + 1) as f64 * (j + 1) as f64 * (k + 2) as f64)
                    .unwrap();
            }
        }
    }
    for i in 3..6 {
        for j in 2..5 {
            for k in 2..4 {
                x.append(&[i, j, k], 0.5 * (6 - i) as f64 * (j as f64) * (k as f64))
                    .unwrap();
            }
        }
    }
    x
}

#[test]
fn test_recovers_block_structure() {
    let x = block_tensor();
    let k = cpd_als(&x, 2, 200, 1e-12).unwrap();
    assert!(k.fit > 0.999, "fit {}", k.fit);

    for (coord, value) in x.iter() {
        let approx = k.value_at(&coord).unwrap();
        assert!((approx - value).abs() < 1e-2 * (1.0 + value.abs()), "{:?}", coord);
    }
    // a cell between the blocks stays empty
    assert!(k.value_at(&[0, 4, 3]).unwrap().abs() < 1e-2);
}

#[test]
fn test_sorted_input_gives_same_result() {
    let x = block_tensor();
    let mut sorted = x.clone();
    sorted.sort_index_at_mode(1).unwrap();

    let a = cpd_als(&x, 2, 10, 0.0).unwrap();
    let b = cpd_als(&sorted, 2, 10, 0.0).unwrap();
    assert!((a.fit - b.fit).abs() < 1e-10);
    for (la, lb) in a.lambda.iter().zip(&b.lambda) {
        assert!((la - lb).abs() < 1e-8 * (1.0 + lb.abs()));
    }
}

#[test]
fn test_same_initial_factors_are_reproducible() {
    let x = block_tensor();
    let options = CpdOptions::new(2).with_niters(15);
    let init: Vec<Matrix<f64>> = x
        .ndims()
        .iter()
        .enumerate()
        .map(|(m, &d)| Matrix::random(d, 2, 1000 + m as u64))
        .collect();

    let metric = sptol_decomp::ReconstructionFit;
    let a = cpd_als_from(&x, init.clone(), &options, &metric).unwrap();
    let b = cpd_als_from(&x, init, &options, &metric).unwrap();
    assert_eq!(a, b);
}

/// Records every fit the solver reports
struct Recorder(RefCell<Vec<f64>>);

impl FitMetric<f64> for Recorder {
    fn fit(&self, state: &SweepState<'_, f64>) -> sptol_core::SptResult<f64> {
        let fit = sptol_decomp::ReconstructionFit.fit(state)?;
        self.0.borrow_mut().push(fit);
        Ok(fit)
    }
}

#[test]
fn test_fit_reported_every_sweep() {
    let x = block_tensor();
    let options = CpdOptions::new(2).with_niters(6).with_tol(0.0);
    let init: Vec<Matrix<f64>> = x
        .ndims()
        .iter()
        .enumerate()
        .map(|(m, &d)| Matrix::random(d, 2, m as u64))
        .collect();
    let recorder = Recorder(RefCell::new(Vec::new()));

    let k = cpd_als_from(&x, init, &options, &recorder).unwrap();
    let fits = recorder.0.into_inner();
    assert_eq!(fits.len(), 6);
    assert_eq!(k.iters, 6);
    assert_eq!(fits.last().copied(), Some(k.fit));
    // ALS does not increase the residual
    for w in fits.windows(2) {
        assert!(w[1] >= w[0] - 1e-9, "{:?}", fits);
    }
}

#[test]
fn test_errors_abort_without_result() {
    let x = block_tensor();
    let err = cpd_als_with(&x, &CpdOptions::new(2).with_tol(-0.5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueError);
    assert!(err.to_string().contains("tolerance"));
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_solver_thread_counts() {
    use sptol_decomp::par_cpd_als;

    let x = block_tensor();
    let seq = cpd_als(&x, 2, 12, 0.0).unwrap();
    for nthreads in [1, 2, 8] {
        let par = par_cpd_als(&x, 2, 12, 0.0, nthreads).unwrap();
        assert!((par.fit - seq.fit).abs() < 1e-8, "{} threads", nthreads);
        for (fp, fs) in par.factors.iter().zip(&seq.factors) {
            for i in 0..fs.nrows() {
                for (a, b) in fp.row(i).iter().zip(fs.row(i)) {
                    assert!((a - b).abs() < 1e-6, "{} threads", nthreads);
                }
            }
        }
    }
}
