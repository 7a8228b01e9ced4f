//! # lamg
//!
//! Multigrid solver for large sparse Laplacian systems `L x = b`, where `L`
//! is the Laplacian matrix of a weighted undirected graph. Such systems are
//! symmetric positive semidefinite with the constant vector in the null
//! space; solutions are defined up to that constant and the solver pins
//! them to zero mean.
//!
//! The solver builds a hierarchy of successively smaller problems by two
//! complementary coarsening moves: exact elimination of independent
//! low-degree indices (a closed-form Schur complement) and affinity-guided
//! aggregation of strongly-coupled indices (a Galerkin coarse operator).
//! Cycling over the hierarchy combines Gauss-Seidel relaxation with coarse
//! corrections and a dense LU solve at the coarsest level.
//!
//! ## Usage
//!
//! ```
//! use lamg::{Graph, Lamg, LinearSolver};
//! use ndarray::Array1;
//! use std::time::Duration;
//!
//! let mut graph = Graph::new(4);
//! graph.add_edge(0, 1, 1.0);
//! graph.add_edge(1, 2, 2.0);
//! graph.add_edge(2, 3, 1.0);
//!
//! let mut solver = Lamg::new();
//! solver.setup_connected_graph(&graph).unwrap();
//!
//! // Right-hand sides must sum to zero for a consistent system
//! let b = ndarray::array![1.0, 0.0, 0.0, -1.0];
//! let mut x = Array1::zeros(4);
//! let status = solver
//!     .solve(&b, &mut x, Duration::from_secs(10), 100)
//!     .unwrap();
//! assert!(status.converged);
//! ```
//!
//! ## Features
//!
//! - `rayon` (default): parallel matrix-vector products and cross-system
//!   `parallel_solve`

pub mod direct;
pub mod error;
pub mod graph;
pub mod multigrid;
pub mod parallel;
pub mod smoother;
pub mod sparse;
pub mod traits;

mod lamg;

pub use crate::lamg::Lamg;
pub use error::SolverError;
pub use graph::{matrix_components, Graph};
pub use multigrid::{
    Acceleration, CycleType, LamgConfig, Level, LevelHierarchy, LevelKind, MultiLevelSetup,
    SetupConfig, SolverLamg,
};
pub use smoother::GaussSeidelRelaxation;
pub use sparse::CsrMatrix;
pub use traits::{LinearSolver, Smoother, SolverStatus};
