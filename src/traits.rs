//! Core contracts for relaxation and linear solving
//!
//! This module defines the seams external callers and internal components
//! plug into:
//! - [`Smoother`]: stateless relaxation applied at any hierarchy level
//! - [`LinearSolver`]: the stable facade (setup / setup_connected / solve /
//!   parallel_solve) callers use without knowledge of hierarchy internals
//! - [`SolverStatus`]: per-solve result record

use crate::error::SolverError;
use crate::graph::Graph;
use crate::sparse::CsrMatrix;
use ndarray::Array1;
use std::time::Duration;

/// Status of a solver after one solve invocation.
///
/// Created fresh per solve and never mutated after return. Non-convergence
/// is reported here (`converged = false`), not as an error.
#[derive(Debug, Clone, Copy)]
pub struct SolverStatus {
    /// Number of cycles (or accelerated iterations) executed
    pub num_iters: usize,
    /// Final absolute residual norm ‖Ax − b‖
    pub residual: f64,
    /// Whether the requested residual reduction was reached
    pub converged: bool,
}

/// Stateless relaxation operator.
///
/// A bounded number of local sweeps reduces high-frequency error components;
/// rows with a non-positive or near-zero diagonal must be left untouched
/// rather than poison the iterate.
pub trait Smoother: Send + Sync {
    /// Relax `A x = b` starting from `initial_guess`, performing at most
    /// `max_iterations` sweeps. Returns the improved iterate.
    fn relax(
        &self,
        a: &CsrMatrix,
        b: &Array1<f64>,
        initial_guess: &Array1<f64>,
        max_iterations: usize,
    ) -> Array1<f64>;

    /// Relax starting from the zero vector.
    fn relax_from_zero(&self, a: &CsrMatrix, b: &Array1<f64>, max_iterations: usize) -> Array1<f64> {
        self.relax(a, b, &Array1::zeros(b.len()), max_iterations)
    }
}

/// Abstract contract for solvers of linear systems.
///
/// A solver is set up once per matrix and then reused across many solves
/// against different right-hand sides. Setup state is internal; a failed
/// setup must leave the solver in a state where subsequent solves fail
/// cleanly with [`SolverError::NotSetup`].
pub trait LinearSolver {
    /// Set the solver up for the given matrix. The input may correspond to
    /// a disconnected graph.
    fn setup(&mut self, matrix: &CsrMatrix) -> Result<(), SolverError>;

    /// Set the solver up for a matrix whose underlying graph is connected.
    ///
    /// Fails with [`SolverError::Disconnected`] when the precondition does
    /// not hold.
    fn setup_connected(&mut self, matrix: &CsrMatrix) -> Result<(), SolverError>;

    /// Set the solver up for the Laplacian matrix of the given graph.
    fn setup_graph(&mut self, graph: &Graph) -> Result<(), SolverError> {
        self.setup(&graph.laplacian())
    }

    /// Set the solver up for the Laplacian matrix of the given connected
    /// graph.
    fn setup_connected_graph(&mut self, graph: &Graph) -> Result<(), SolverError> {
        self.setup_connected(&graph.laplacian())
    }

    /// Solve one system against the currently set-up matrix.
    ///
    /// `result` supplies the initial iterate and receives the solution.
    /// The budgets are polled between cycles, so the most recent in-flight
    /// cycle always completes before a timeout is honored.
    fn solve(
        &self,
        rhs: &Array1<f64>,
        result: &mut Array1<f64>,
        max_convergence_time: Duration,
        max_iterations: usize,
    ) -> Result<SolverStatus, SolverError>;

    /// Solve many right-hand sides against the same set-up matrix.
    ///
    /// The default implementation solves them one at a time in sequence;
    /// implementations may exploit cross-system parallelism but must
    /// preserve the per-system numerical contract.
    fn parallel_solve(
        &self,
        rhs: &[Array1<f64>],
        results: &mut [Array1<f64>],
        max_convergence_time: Duration,
        max_iterations: usize,
    ) -> Result<Vec<SolverStatus>, SolverError> {
        assert_eq!(rhs.len(), results.len(), "rhs/results length mismatch");
        rhs.iter()
            .zip(results.iter_mut())
            .map(|(b, x)| self.solve(b, x, max_convergence_time, max_iterations))
            .collect()
    }
}
