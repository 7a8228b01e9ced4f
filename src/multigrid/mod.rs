//! Multigrid hierarchy: levels, setup and cycling
//!
//! The module splits along the two phases of the solver's life:
//! - [`MultiLevelSetup`] turns a matrix into a [`LevelHierarchy`] of
//!   elimination and aggregation [`Level`]s
//! - [`SolverLamg`] runs cycles (optionally CG-accelerated) over a built
//!   hierarchy

mod hierarchy;
mod level;
mod setup;
mod solver;

pub use hierarchy::LevelHierarchy;
pub use level::{EliminationStage, Level, LevelKind};
pub use setup::{MultiLevelSetup, SetupConfig};
pub use solver::{Acceleration, CycleType, LamgConfig, SolverLamg};
