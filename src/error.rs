//! Error types for solver setup and solve phases.
//!
//! Non-convergence is deliberately *not* an error: a solver that exhausts its
//! iteration or time budget returns a normal [`SolverStatus`](crate::SolverStatus)
//! with `converged = false`. The variants here cover precondition violations
//! and numerical failures that make a result meaningless.

use thiserror::Error;

/// Errors raised by hierarchy setup and solve operations.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("matrix is not square: {rows} x {cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("matrix is empty")]
    EmptyMatrix,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("graph is disconnected; connected input required")]
    Disconnected,

    #[error("zero or negative diagonal entry at row {row}")]
    ZeroDiagonal { row: usize },

    #[error("coarsest-level matrix is singular")]
    SingularMatrix,

    #[error("solver has not been set up; call setup first")]
    NotSetup,
}
