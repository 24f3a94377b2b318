//! CPD-ALS on a random sparse tensor
//!
//! Builds a sparse tensor from a planted rank-3 model plus noise, decomposes
//! it with the sequential and the parallel solver and compares the results.
//!
//! Run with:
//! ```bash
//! cargo run -p sptol-decomp --example cpd_als
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sptol_core::{Matrix, Timer};
use sptol_decomp::{cpd_als_with, CpdOptions, InitStrategy, KruskalTensor};
use sptol_sparse::SparseTensor;

fn planted_tensor(ndims: &[usize], rank: usize, nnz: usize) -> anyhow::Result<SparseTensor<f64>> {
    let mut rng = StdRng::seed_from_u64(2017);
    let factors: Vec<Matrix<f64>> = ndims
        .iter()
        .map(|&d| Matrix::random_with(d, rank, &mut rng))
        .collect();
    let model = KruskalTensor {
        rank,
        nmodes: ndims.len(),
        lambda: vec![1.0; rank],
        factors,
        fit: 0.0,
        iters: 0,
    };

    let mut x = SparseTensor::new(ndims)?;
    let mut coord = vec![0; ndims.len()];
    for _ in 0..nnz {
        for (c, &d) in coord.iter_mut().zip(ndims) {
            *c = rng.gen_range(0..d);
        }
        if x.get(&coord).is_none() {
            let noise: f64 = rng.gen_range(-0.01..0.01);
            x.append(&coord, model.value_at(&coord)? + noise)?;
        }
    }
    Ok(x)
}

fn main() -> anyhow::Result<()> {
    println!("{}", "=".repeat(80));
    println!("CPD-ALS Decomposition Example");
    println!("{}", "=".repeat(80));
    println!();

    let ndims = [40, 30, 20];
    let rank = 3;
    let mut timer = Timer::started();
    let x = planted_tensor(&ndims, rank, 4000)?;
    timer.stop();

    println!("Tensor shape: {:?}", x.ndims());
    println!("Nonzeros: {}", x.nnz());
    println!("Built in {:.3} s", timer.elapsed_secs());
    println!();

    // ========================================================================
    // Sequential solver
    // ========================================================================
    println!("Sequential CPD-ALS");
    println!("{}", "-".repeat(80));

    let options = CpdOptions::new(rank)
        .with_niters(50)
        .with_tol(1e-6)
        .with_init(InitStrategy::Random { seed: 1 });
    timer.start();
    let seq = cpd_als_with(&x, &options)?;
    timer.stop();
    report(&seq, timer.elapsed_secs());

    // ========================================================================
    // Parallel solver
    // ========================================================================
    println!("Parallel CPD-ALS");
    println!("{}", "-".repeat(80));

    let options = options.with_default_threads();
    timer.start();
    let par = cpd_als_with(&x, &options)?;
    timer.stop();
    println!("  - Threads: {}", options.nthreads.unwrap_or(1));
    report(&par, timer.elapsed_secs());

    println!("Fit difference: {:.3e}", (seq.fit - par.fit).abs());
    Ok(())
}

fn report(k: &KruskalTensor<f64>, secs: f64) {
    println!("  - Iterations: {}", k.iters);
    println!("  - Final fit: {:.6}", k.fit);
    println!("  - Lambda: {:?}", k.lambda);
    println!("  - Time: {:.3} s", secs);
    println!();
}
