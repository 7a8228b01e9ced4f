//! User-facing solver facade
//!
//! [`Lamg`] wraps hierarchy construction and cycling behind the
//! [`LinearSolver`] contract. `setup` accepts matrices of disconnected
//! graphs by decomposing into connected components and running one
//! independent solver per component; `setup_connected` skips the
//! decomposition and fails fast when the input is not connected.

use crate::error::SolverError;
use crate::graph::matrix_components;
use crate::multigrid::{LamgConfig, MultiLevelSetup, SetupConfig, SolverLamg};
use crate::smoother::GaussSeidelRelaxation;
use crate::sparse::CsrMatrix;
use crate::traits::{LinearSolver, SolverStatus};
use ndarray::Array1;
use std::time::{Duration, Instant};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One connected piece of a decomposed problem
struct Component {
    /// Global indices of the component, ascending
    nodes: Vec<usize>,
    solver: SolverLamg<GaussSeidelRelaxation>,
}

enum LamgState {
    Connected(SolverLamg<GaussSeidelRelaxation>),
    Decomposed {
        /// Global problem size
        n: usize,
        components: Vec<Component>,
    },
}

/// Multigrid solver for Laplacian systems.
///
/// Set up once per matrix, then solve any number of right-hand sides. A
/// solver that was never set up, or whose last setup failed, reports
/// [`SolverError::NotSetup`] on solve.
pub struct Lamg {
    setup_config: SetupConfig,
    lamg_config: LamgConfig,
    state: Option<LamgState>,
}

impl Default for Lamg {
    fn default() -> Self {
        Self::new()
    }
}

impl Lamg {
    pub fn new() -> Self {
        Self::with_configs(SetupConfig::default(), LamgConfig::default())
    }

    /// Solver targeting the given residual reduction per solve
    pub fn with_tolerance(tolerance: f64) -> Self {
        let lamg_config = LamgConfig {
            desired_residual_reduction: tolerance,
            ..LamgConfig::default()
        };
        Self::with_configs(SetupConfig::default(), lamg_config)
    }

    pub fn with_configs(setup_config: SetupConfig, lamg_config: LamgConfig) -> Self {
        Self {
            setup_config,
            lamg_config,
            state: None,
        }
    }

    /// Whether a matrix is currently set up
    pub fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    /// Number of connected components of the set-up matrix, if any
    pub fn num_components(&self) -> Option<usize> {
        match &self.state {
            Some(LamgState::Connected(_)) => Some(1),
            Some(LamgState::Decomposed { components, .. }) => Some(components.len()),
            None => None,
        }
    }

    fn build_solver(
        &self,
        matrix: &CsrMatrix,
    ) -> Result<SolverLamg<GaussSeidelRelaxation>, SolverError> {
        let hierarchy =
            MultiLevelSetup::with_config(GaussSeidelRelaxation, self.setup_config.clone())
                .setup(matrix)?;
        SolverLamg::new(hierarchy, GaussSeidelRelaxation, self.lamg_config.clone())
    }

    fn validate(matrix: &CsrMatrix) -> Result<(), SolverError> {
        if !matrix.is_square() {
            return Err(SolverError::NotSquare {
                rows: matrix.num_rows,
                cols: matrix.num_cols,
            });
        }
        if matrix.num_rows == 0 {
            return Err(SolverError::EmptyMatrix);
        }
        Ok(())
    }
}

impl LinearSolver for Lamg {
    fn setup(&mut self, matrix: &CsrMatrix) -> Result<(), SolverError> {
        self.state = None;
        Self::validate(matrix)?;

        let components = matrix_components(matrix);
        if components.len() == 1 {
            let solver = self.build_solver(matrix)?;
            self.state = Some(LamgState::Connected(solver));
            return Ok(());
        }

        log::info!("decomposing into {} components", components.len());
        let mut built = Vec::with_capacity(components.len());
        for nodes in components {
            let sub = matrix.principal_submatrix(&nodes);
            let solver = self.build_solver(&sub)?;
            built.push(Component { nodes, solver });
        }
        self.state = Some(LamgState::Decomposed {
            n: matrix.num_rows,
            components: built,
        });
        Ok(())
    }

    fn setup_connected(&mut self, matrix: &CsrMatrix) -> Result<(), SolverError> {
        self.state = None;
        Self::validate(matrix)?;

        if matrix_components(matrix).len() != 1 {
            return Err(SolverError::Disconnected);
        }
        let solver = self.build_solver(matrix)?;
        self.state = Some(LamgState::Connected(solver));
        Ok(())
    }

    fn solve(
        &self,
        rhs: &Array1<f64>,
        result: &mut Array1<f64>,
        max_convergence_time: Duration,
        max_iterations: usize,
    ) -> Result<SolverStatus, SolverError> {
        match &self.state {
            None => Err(SolverError::NotSetup),
            Some(LamgState::Connected(solver)) => {
                solver.solve(rhs, result, max_convergence_time, max_iterations)
            }
            Some(LamgState::Decomposed { n, components }) => {
                if rhs.len() != *n {
                    return Err(SolverError::DimensionMismatch {
                        expected: *n,
                        got: rhs.len(),
                    });
                }
                if result.len() != *n {
                    return Err(SolverError::DimensionMismatch {
                        expected: *n,
                        got: result.len(),
                    });
                }

                // Each component is an independent singular system; solve
                // them separately and merge the statuses. The time budget
                // covers the whole call, so later components only get what
                // the earlier ones left over.
                let start = Instant::now();
                let mut num_iters = 0;
                let mut residual_sq = 0.0;
                let mut converged = true;

                for component in components {
                    let local_rhs =
                        Array1::from_iter(component.nodes.iter().map(|&g| rhs[g]));
                    let mut local_x =
                        Array1::from_iter(component.nodes.iter().map(|&g| result[g]));

                    let remaining = max_convergence_time.saturating_sub(start.elapsed());
                    let status = component.solver.solve(
                        &local_rhs,
                        &mut local_x,
                        remaining,
                        max_iterations,
                    )?;

                    for (li, &g) in component.nodes.iter().enumerate() {
                        result[g] = local_x[li];
                    }
                    num_iters = num_iters.max(status.num_iters);
                    residual_sq += status.residual * status.residual;
                    converged &= status.converged;
                }

                Ok(SolverStatus {
                    num_iters,
                    residual: residual_sq.sqrt(),
                    converged,
                })
            }
        }
    }

    #[cfg(feature = "rayon")]
    fn parallel_solve(
        &self,
        rhs: &[Array1<f64>],
        results: &mut [Array1<f64>],
        max_convergence_time: Duration,
        max_iterations: usize,
    ) -> Result<Vec<SolverStatus>, SolverError> {
        assert_eq!(rhs.len(), results.len(), "rhs/results length mismatch");
        rhs.par_iter()
            .zip(results.par_iter_mut())
            .map(|(b, x)| self.solve(b, x, max_convergence_time, max_iterations))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_before_setup_fails() {
        let solver = Lamg::new();
        let b = Array1::zeros(3);
        let mut x = Array1::zeros(3);
        assert!(matches!(
            solver.solve(&b, &mut x, Duration::from_secs(1), 10),
            Err(SolverError::NotSetup)
        ));
    }

    #[test]
    fn test_setup_connected_rejects_disconnected() {
        let mut g = Graph::new(4);
        g.add_edge(0, 1, 1.0);
        g.add_edge(2, 3, 1.0);

        let mut solver = Lamg::new();
        assert!(matches!(
            solver.setup_connected_graph(&g),
            Err(SolverError::Disconnected)
        ));
        assert!(!solver.is_setup());
    }

    #[test]
    fn test_exhausted_time_budget_spans_all_components() {
        let mut g = Graph::new(6);
        g.add_edge(0, 1, 1.0);
        g.add_edge(1, 2, 1.0);
        g.add_edge(3, 4, 1.0);
        g.add_edge(4, 5, 1.0);

        let mut solver = Lamg::new();
        solver.setup_graph(&g).unwrap();
        assert_eq!(solver.num_components(), Some(2));

        // A spent budget leaves every component at zero cycles; no
        // component gets a fresh allowance of its own.
        let b = ndarray::array![1.0, 0.0, -1.0, 2.0, 0.0, -2.0];
        let mut x = Array1::zeros(6);
        let status = solver.solve(&b, &mut x, Duration::ZERO, 100).unwrap();

        assert_eq!(status.num_iters, 0);
        assert!(!status.converged);
    }

    #[test]
    fn test_decomposed_setup_and_solve() {
        // Two disjoint paths
        let mut g = Graph::new(6);
        g.add_edge(0, 1, 1.0);
        g.add_edge(1, 2, 1.0);
        g.add_edge(3, 4, 1.0);
        g.add_edge(4, 5, 1.0);

        let mut solver = Lamg::new();
        solver.setup_graph(&g).unwrap();
        assert_eq!(solver.num_components(), Some(2));

        // Zero-sum rhs per component
        let b = ndarray::array![1.0, 0.0, -1.0, 2.0, 0.0, -2.0];
        let mut x = Array1::zeros(6);
        let status = solver
            .solve(&b, &mut x, Duration::from_secs(10), 100)
            .unwrap();
        assert!(status.converged);

        let lap = g.laplacian();
        let ax = lap.matvec(&x);
        for i in 0..6 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-8);
        }
    }
}
