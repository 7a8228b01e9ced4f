//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value
//! - `row_ptrs`: Index into values/col_indices where each row starts
//!
//! All matrices in this crate are real-valued; the Laplacian family the
//! solver operates on is symmetric with nonnegative diagonal dominance.

use ndarray::{Array1, Array2};
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Compressed Sparse Row (CSR) matrix
///
/// Memory-efficient storage for sparse matrices with O(nnz) space.
/// Matrix-vector products are O(nnz) instead of O(n²).
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<f64>,
    /// Column indices for each value
    pub col_indices: Vec<usize>,
    /// Row pointers: row_ptrs[i] is the start index for row i,
    /// row_ptrs[num_rows] equals nnz
    pub row_ptrs: Vec<usize>,
}

impl CsrMatrix {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix from COO (coordinate) triplets
    ///
    /// Triplets are (row, col, value). Duplicate entries are summed;
    /// explicit zeros produced by summation are kept.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Self {
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut rows: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());

        for (r, c, v) in triplets {
            debug_assert!(r < num_rows && c < num_cols, "triplet out of bounds");
            if rows.last() == Some(&r) && col_indices.last() == Some(&c) {
                *values.last_mut().unwrap() += v;
            } else {
                rows.push(r);
                col_indices.push(c);
                values.push(v);
            }
        }

        let mut row_ptrs = vec![0usize; num_rows + 1];
        for &r in &rows {
            row_ptrs[r + 1] += 1;
        }
        for i in 0..num_rows {
            row_ptrs[i + 1] += row_ptrs[i];
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Whether the matrix is square
    pub fn is_square(&self) -> bool {
        self.num_rows == self.num_cols
    }

    /// Range of indices in values/col_indices for a given row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// (col, value) pairs for a row, in column order
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Number of off-diagonal non-zeros in a row (the node degree for a
    /// Laplacian)
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_entries(row)
            .filter(|&(j, v)| j != row && v != 0.0)
            .count()
    }

    /// Element at (i, j), zero if not stored
    pub fn get(&self, i: usize, j: usize) -> f64 {
        for idx in self.row_range(i) {
            if self.col_indices[idx] == j {
                return self.values[idx];
            }
        }
        0.0
    }

    /// Matrix-vector product: y = A * x
    ///
    /// Runs in parallel when the `rayon` feature is enabled and the matrix
    /// is large enough to benefit.
    pub fn matvec(&self, x: &Array1<f64>) -> Array1<f64> {
        assert_eq!(x.len(), self.num_cols, "input vector size mismatch");

        #[cfg(feature = "rayon")]
        {
            if self.num_rows >= 256 {
                return self.matvec_parallel(x);
            }
        }

        self.matvec_sequential(x)
    }

    fn matvec_sequential(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut y = Array1::zeros(self.num_rows);
        for i in 0..self.num_rows {
            let mut sum = 0.0;
            for idx in self.row_range(i) {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            y[i] = sum;
        }
        y
    }

    #[cfg(feature = "rayon")]
    fn matvec_parallel(&self, x: &Array1<f64>) -> Array1<f64> {
        let x_slice = x.as_slice().expect("array should be contiguous");

        let results: Vec<f64> = (0..self.num_rows)
            .into_par_iter()
            .map(|i| {
                let mut sum = 0.0;
                for idx in self.row_range(i) {
                    sum += self.values[idx] * x_slice[self.col_indices[idx]];
                }
                sum
            })
            .collect();

        Array1::from_vec(results)
    }

    /// Transpose matrix-vector product: y = A^T * x
    pub fn matvec_transpose(&self, x: &Array1<f64>) -> Array1<f64> {
        assert_eq!(x.len(), self.num_rows, "input vector size mismatch");

        let mut y = Array1::zeros(self.num_cols);
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                y[self.col_indices[idx]] += self.values[idx] * x[i];
            }
        }
        y
    }

    /// Transposed copy of the matrix
    pub fn transpose(&self) -> CsrMatrix {
        let mut triplets = Vec::with_capacity(self.nnz());
        for i in 0..self.num_rows {
            for (j, v) in self.row_entries(i) {
                triplets.push((j, i, v));
            }
        }
        CsrMatrix::from_triplets(self.num_cols, self.num_rows, triplets)
    }

    /// Sparse matrix product C = A * B
    ///
    /// Row-wise accumulation with sorted merging; entries whose magnitude
    /// drops below 1e-15 after summation are dropped to keep Galerkin and
    /// Schur products sparse.
    pub fn matmul(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!(
            self.num_cols, other.num_rows,
            "matrix dimension mismatch: A.cols ({}) != B.rows ({})",
            self.num_cols, other.num_rows
        );

        let m = self.num_rows;
        let n = other.num_cols;

        if m == 0 || n == 0 || self.nnz() == 0 || other.nnz() == 0 {
            return CsrMatrix::new(m, n);
        }

        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(self.nnz() * 4);

        for i in 0..m {
            let mut row_data: Vec<(usize, f64)> = Vec::new();
            for (k, a_ik) in self.row_entries(i) {
                for (j, b_kj) in other.row_entries(k) {
                    row_data.push((j, a_ik * b_kj));
                }
            }
            if row_data.is_empty() {
                continue;
            }

            row_data.sort_unstable_by_key(|&(j, _)| j);

            let mut current_j = row_data[0].0;
            let mut current_val = row_data[0].1;
            for &(j, val) in &row_data[1..] {
                if j == current_j {
                    current_val += val;
                } else {
                    if current_val.abs() > 1e-15 {
                        triplets.push((i, current_j, current_val));
                    }
                    current_j = j;
                    current_val = val;
                }
            }
            if current_val.abs() > 1e-15 {
                triplets.push((i, current_j, current_val));
            }
        }

        CsrMatrix::from_triplets(m, n, triplets)
    }

    /// Principal submatrix on the given row/column index set
    ///
    /// `indices` selects rows and columns in order; entries coupling the
    /// selected set to its complement are dropped. Used to split a
    /// disconnected system into its components.
    pub fn principal_submatrix(&self, indices: &[usize]) -> CsrMatrix {
        let mut local = vec![usize::MAX; self.num_rows];
        for (li, &gi) in indices.iter().enumerate() {
            local[gi] = li;
        }

        let mut triplets = Vec::new();
        for (li, &gi) in indices.iter().enumerate() {
            for (j, v) in self.row_entries(gi) {
                if local[j] != usize::MAX {
                    triplets.push((li, local[j], v));
                }
            }
        }
        CsrMatrix::from_triplets(indices.len(), indices.len(), triplets)
    }

    /// Convert to a dense matrix (coarsest-level direct solves, debugging)
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.num_rows, self.num_cols));
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                dense[[i, self.col_indices[idx]]] = self.values[idx];
            }
        }
        dense
    }
}
