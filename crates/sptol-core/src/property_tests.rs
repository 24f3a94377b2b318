//! Property-based tests for the dense backend

use crate::linalg::{multiply, solve_in_place, transpose_multiply};
use crate::Matrix;
use proptest::prelude::*;

fn diag_dominant(n: usize, seed: u64) -> Matrix<f64> {
    let mut a = Matrix::<f64>::random(n, n, seed);
    for i in 0..n {
        let v = a.get(i, i) + n as f64;
        a.set(i, i, v);
    }
    a
}

proptest! {
    /// Solving against the identity produces an inverse
    #[test]
    fn prop_solve_gives_inverse(n in 1usize..9, seed in any::<u64>()) {
        let orig = diag_dominant(n, seed);
        let mut inv = Matrix::identity(n);
        solve_in_place(&orig, &mut inv).unwrap();

        let mut prod = Matrix::new(n, n);
        multiply(&orig, &inv, &mut prod).unwrap();
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                prop_assert!((prod.get(i, j) - expected).abs() < 1e-9);
            }
        }
    }

    /// Gram matrices are symmetric with a non-negative diagonal
    #[test]
    fn prop_gram_symmetric(rows in 1usize..20, cols in 1usize..10, seed in any::<u64>()) {
        let a = Matrix::<f64>::random(rows, cols, seed);
        let mut g = Matrix::new(cols, cols);
        transpose_multiply(&a, &a, &mut g).unwrap();
        for i in 0..cols {
            prop_assert!(g.get(i, i) >= 0.0);
            for j in 0..cols {
                prop_assert!((g.get(i, j) - g.get(j, i)).abs() < 1e-12);
            }
        }
    }
}
