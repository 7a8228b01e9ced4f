//! Sparse matrix structures (CSR format)
//!
//! This module provides Compressed Sparse Row (CSR) format for efficient
//! storage and matrix-vector operations with the symmetric, real-valued
//! matrices of the graph Laplacian family.

mod csr;

pub use csr::CsrMatrix;
