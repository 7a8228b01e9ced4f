//! Dense LU decomposition for the coarsest hierarchy level
//!
//! The coarsest matrix is small (bounded by the setup floor), so a dense
//! factorization with partial pivoting is computed once per setup and reused
//! across all solves.

use crate::error::SolverError;
use ndarray::{Array1, Array2};

const PIVOT_TOLERANCE: f64 = 1e-30;

/// LU factorization with partial pivoting.
///
/// L is unit lower triangular and stored below the diagonal of `lu`; U
/// occupies the diagonal and above.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    lu: Array2<f64>,
    pivots: Vec<usize>,
    n: usize,
}

impl LuFactorization {
    /// Factor a square matrix.
    ///
    /// Fails with [`SolverError::SingularMatrix`] when a pivot falls below
    /// tolerance.
    pub fn compute(a: &Array2<f64>) -> Result<Self, SolverError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(SolverError::NotSquare {
                rows: n,
                cols: a.ncols(),
            });
        }

        let mut lu = a.clone();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            let mut max_val = lu[[k, k]].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = lu[[i, k]].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < PIVOT_TOLERANCE {
                return Err(SolverError::SingularMatrix);
            }

            if max_row != k {
                for j in 0..n {
                    lu.swap([k, j], [max_row, j]);
                }
                pivots.swap(k, max_row);
            }

            let pivot = lu[[k, k]];
            for i in (k + 1)..n {
                let mult = lu[[i, k]] / pivot;
                lu[[i, k]] = mult;
                for j in (k + 1)..n {
                    let update = mult * lu[[k, j]];
                    lu[[i, j]] -= update;
                }
            }
        }

        Ok(Self { lu, pivots, n })
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Solve `A x = b` with the precomputed factors.
    ///
    /// # Panics
    ///
    /// Panics if `b` does not match the factored dimension. Pivots were
    /// verified nonzero during factorization, so the substitution itself
    /// cannot fail.
    pub fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        assert_eq!(b.len(), self.n, "rhs size mismatch");

        let mut x = b.clone();

        // Apply row permutations
        for i in 0..self.n {
            let pivot = self.pivots[i];
            if pivot != i {
                x.swap(i, pivot);
            }
        }

        // Forward substitution: Ly = Pb
        for i in 0..self.n {
            for j in 0..i {
                let l_ij = self.lu[[i, j]];
                x[i] -= l_ij * x[j];
            }
        }

        // Backward substitution: Ux = y
        for i in (0..self.n).rev() {
            for j in (i + 1)..self.n {
                let u_ij = self.lu[[i, j]];
                x[i] -= u_ij * x[j];
            }
            x[i] /= self.lu[[i, i]];
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_lu_solve() {
        let a = array![[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let lu = LuFactorization::compute(&a).expect("factorization should succeed");

        let b = array![1.0, 2.0, 3.0];
        let x = lu.solve(&b);

        let ax = a.dot(&x);
        for i in 0..3 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lu_reuse_for_multiple_rhs() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let lu = LuFactorization::compute(&a).expect("factorization should succeed");

        for b in [array![1.0, 0.0], array![0.0, 1.0], array![3.0, -3.0]] {
            let x = lu.solve(&b);
            let ax = a.dot(&x);
            assert_relative_eq!(ax[0], b[0], epsilon = 1e-12);
            assert_relative_eq!(ax[1], b[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lu_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            LuFactorization::compute(&a),
            Err(SolverError::SingularMatrix)
        ));
    }

    #[test]
    fn test_lu_requires_pivoting() {
        // Zero leading entry forces a row swap.
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let lu = LuFactorization::compute(&a).expect("factorization should succeed");
        let x = lu.solve(&array![5.0, 7.0]);
        assert_relative_eq!(x[0], 7.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 5.0, epsilon = 1e-12);
    }
}
