//! Gauss–Seidel relaxation
//!
//! Forward sweeps that update each unknown from the most recent neighboring
//! values and the row diagonal. Rows whose diagonal is near zero are skipped:
//! a Laplacian row only has a zero diagonal when the node is isolated, in
//! which case its unknown is unconstrained anyway.

use crate::sparse::CsrMatrix;
use crate::traits::Smoother;
use ndarray::Array1;

const DIAGONAL_TOLERANCE: f64 = 1e-12;

/// Gauss–Seidel relaxation smoother.
///
/// Stateless between calls; each call performs a bounded number of forward
/// sweeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussSeidelRelaxation;

impl Smoother for GaussSeidelRelaxation {
    fn relax(
        &self,
        a: &CsrMatrix,
        b: &Array1<f64>,
        initial_guess: &Array1<f64>,
        max_iterations: usize,
    ) -> Array1<f64> {
        assert_eq!(b.len(), a.num_rows, "rhs size mismatch");
        assert_eq!(initial_guess.len(), a.num_rows, "initial guess size mismatch");

        let n = a.num_rows;
        let mut x = initial_guess.clone();

        for _ in 0..max_iterations {
            for i in 0..n {
                let mut sigma = 0.0;
                let mut diag = 0.0;
                for (j, v) in a.row_entries(i) {
                    if j == i {
                        diag = v;
                    } else {
                        sigma += v * x[j];
                    }
                }
                if diag.abs() <= DIAGONAL_TOLERANCE {
                    continue;
                }
                x[i] = (b[i] - sigma) / diag;
            }
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn laplacian_1d(n: usize) -> CsrMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            let mut degree = 0.0;
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
                degree += 1.0;
            }
            if i < n - 1 {
                triplets.push((i, i + 1, -1.0));
                degree += 1.0;
            }
            triplets.push((i, i, degree + 1.0)); // shifted to make it SPD
        }
        CsrMatrix::from_triplets(n, n, triplets)
    }

    fn residual_norm(a: &CsrMatrix, x: &Array1<f64>, b: &Array1<f64>) -> f64 {
        let r = b - &a.matvec(x);
        r.dot(&r).sqrt()
    }

    #[test]
    fn test_relax_reduces_residual() {
        let a = laplacian_1d(20);
        let b = Array1::from_iter((0..20).map(|i| ((i * 7) % 5) as f64 - 2.0));
        let smoother = GaussSeidelRelaxation;

        let x0 = Array1::zeros(20);
        let r0 = residual_norm(&a, &x0, &b);

        let x = smoother.relax_from_zero(&a, &b, 5);
        let r = residual_norm(&a, &x, &b);

        assert!(r < r0, "residual should decrease: {} -> {}", r0, r);
    }

    #[test]
    fn test_relax_converges_on_small_spd_system() {
        let a = CsrMatrix::from_triplets(
            2,
            2,
            vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
        );
        let b = array![1.0, 2.0];
        let smoother = GaussSeidelRelaxation;

        let x = smoother.relax_from_zero(&a, &b, 100);
        let ax = a.matvec(&x);
        assert_relative_eq!(ax[0], b[0], epsilon = 1e-8);
        assert_relative_eq!(ax[1], b[1], epsilon = 1e-8);
    }

    #[test]
    fn test_zero_diagonal_row_is_skipped() {
        // Isolated node: all-zero row. Its value must stay at the guess.
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 2.0)]);
        let b = array![4.0, 7.0];
        let smoother = GaussSeidelRelaxation;

        let guess = array![0.0, 1.5];
        let x = smoother.relax(&a, &b, &guess, 3);
        assert_relative_eq!(x[0], 2.0);
        assert_relative_eq!(x[1], 1.5);
    }

    #[test]
    fn test_relax_is_stateless() {
        let a = laplacian_1d(10);
        let b = Array1::from_elem(10, 1.0);
        let smoother = GaussSeidelRelaxation;

        let x1 = smoother.relax_from_zero(&a, &b, 4);
        let x2 = smoother.relax_from_zero(&a, &b, 4);
        for i in 0..10 {
            assert_relative_eq!(x1[i], x2[i]);
        }
    }
}
