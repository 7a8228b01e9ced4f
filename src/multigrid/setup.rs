//! Hierarchy construction: elimination and aggregation coarsening
//!
//! Setup repeatedly shrinks the problem until it is small enough for a
//! direct solve. Per iteration it first attempts exact elimination of an
//! independent set of low-degree indices (a closed-form Schur complement,
//! no approximation); when too few indices qualify it falls back to
//! affinity-guided aggregation, which clusters strongly-coupled indices and
//! forms the Galerkin coarse operator. When neither coarsening shrinks the
//! problem meaningfully the hierarchy ends where it is.

use super::hierarchy::LevelHierarchy;
use super::level::{EliminationStage, Level};
use crate::error::SolverError;
use crate::sparse::CsrMatrix;
use crate::traits::Smoother;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIAGONAL_TOLERANCE: f64 = 1e-12;

/// Tunables of the hierarchy construction.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Problem sizes at or below this are solved directly, no coarsening
    pub max_direct_solve_size: usize,
    /// Hard cap on hierarchy depth
    pub max_levels: usize,
    /// Maximum off-diagonal degree for an index to qualify for elimination
    pub elimination_max_degree: usize,
    /// Elimination stages must remove at least this fraction of indices
    pub min_elimination_fraction: f64,
    /// Maximum successive elimination stages folded into one level
    pub max_elimination_stages: usize,
    /// Maximum number of indices per aggregate
    pub max_aggregate_size: usize,
    /// Number of relaxed test vectors driving the affinity measure
    pub num_test_vectors: usize,
    /// Relaxation sweeps applied to each test vector
    pub test_vector_sweeps: usize,
    /// A coarsening keeping more than this fraction of indices is rejected
    /// and terminates the hierarchy
    pub max_coarsening_ratio: f64,
    /// Seed for the test-vector randomness; setup is deterministic given
    /// the matrix and this seed
    pub seed: u64,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            max_direct_solve_size: 200,
            max_levels: 50,
            elimination_max_degree: 4,
            min_elimination_fraction: 0.01,
            max_elimination_stages: 2,
            max_aggregate_size: 8,
            num_test_vectors: 4,
            test_vector_sweeps: 3,
            max_coarsening_ratio: 0.95,
            seed: 0,
        }
    }
}

/// Hierarchy builder parameterized over the smoother used to relax test
/// vectors.
#[derive(Debug, Clone)]
pub struct MultiLevelSetup<S: Smoother> {
    smoother: S,
    config: SetupConfig,
}

impl<S: Smoother> MultiLevelSetup<S> {
    pub fn new(smoother: S) -> Self {
        Self {
            smoother,
            config: SetupConfig::default(),
        }
    }

    pub fn with_config(smoother: S, config: SetupConfig) -> Self {
        Self { smoother, config }
    }

    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    /// Build the level hierarchy for a Laplacian-like matrix.
    ///
    /// The matrix must be square and nonempty, and every index coupled to
    /// another index must carry a positive diagonal entry.
    pub fn setup(&self, matrix: &CsrMatrix) -> Result<LevelHierarchy, SolverError> {
        if !matrix.is_square() {
            return Err(SolverError::NotSquare {
                rows: matrix.num_rows,
                cols: matrix.num_cols,
            });
        }
        if matrix.num_rows == 0 {
            return Err(SolverError::EmptyMatrix);
        }
        for i in 0..matrix.num_rows {
            if matrix.get(i, i) <= DIAGONAL_TOLERANCE && matrix.row_degree(i) > 0 {
                return Err(SolverError::ZeroDiagonal { row: i });
            }
        }

        let mut hierarchy = LevelHierarchy::new(Level::Finest {
            matrix: matrix.clone(),
        });
        let mut current = matrix.clone();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        while hierarchy.num_levels() < self.config.max_levels
            && current.num_rows > self.config.max_direct_solve_size
        {
            if let Some((stages, coarse)) = self.eliminate(&current) {
                log::debug!(
                    "level {}: elimination {} -> {} ({} stages)",
                    hierarchy.num_levels(),
                    current.num_rows,
                    coarse.num_rows,
                    stages.len()
                );
                hierarchy.push(Level::new_elimination(coarse.clone(), stages));
                current = coarse;
                continue;
            }

            if let Some((p, seeds, coarse)) = self.aggregate(&current, &mut rng) {
                log::debug!(
                    "level {}: aggregation {} -> {}",
                    hierarchy.num_levels(),
                    current.num_rows,
                    coarse.num_rows
                );
                hierarchy.push(Level::Aggregation {
                    matrix: coarse.clone(),
                    p,
                    seeds,
                });
                current = coarse;
                continue;
            }

            // Neither coarsening makes progress; solve at this size.
            break;
        }

        log::info!(
            "hierarchy: {} levels, coarsest {}, grid complexity {:.3}, operator complexity {:.3}",
            hierarchy.num_levels(),
            hierarchy.coarsest().dim(),
            hierarchy.grid_complexity(),
            hierarchy.operator_complexity()
        );

        Ok(hierarchy)
    }

    /// Attempt an elimination level.
    ///
    /// Up to `max_elimination_stages` rounds, each picking a maximal
    /// independent set of indices with off-diagonal degree at most
    /// `elimination_max_degree` and eliminating them exactly. Returns `None`
    /// when even the first round removes too few indices to be worthwhile.
    fn eliminate(&self, matrix: &CsrMatrix) -> Option<(Vec<EliminationStage>, CsrMatrix)> {
        let mut stages = Vec::new();
        let mut current = matrix.clone();

        while stages.len() < self.config.max_elimination_stages {
            let n = current.num_rows;
            let Some((f_set, c_set)) = self.independent_low_degree_set(&current) else {
                break;
            };
            if (f_set.len() as f64) < self.config.min_elimination_fraction * n as f64 {
                break;
            }

            let (stage, coarse) = eliminate_stage(&current, f_set, c_set);
            stages.push(stage);
            current = coarse;
        }

        if stages.is_empty() {
            None
        } else {
            Some((stages, current))
        }
    }

    /// Greedy scan for an independent set of low-degree indices.
    ///
    /// An index joins the F-set when its degree qualifies, its diagonal is
    /// invertible and none of its neighbors was already taken; its
    /// neighbors are then pinned to the C-set.
    fn independent_low_degree_set(&self, a: &CsrMatrix) -> Option<(Vec<usize>, Vec<usize>)> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Undecided,
            Fine,
            Coarse,
        }

        let n = a.num_rows;
        let mut marks = vec![Mark::Undecided; n];
        let mut f_set = Vec::new();

        for i in 0..n {
            if marks[i] != Mark::Undecided {
                continue;
            }
            let degree = a.row_degree(i);
            if degree == 0 || degree > self.config.elimination_max_degree {
                marks[i] = Mark::Coarse;
                continue;
            }
            if a.get(i, i) <= DIAGONAL_TOLERANCE {
                marks[i] = Mark::Coarse;
                continue;
            }

            marks[i] = Mark::Fine;
            f_set.push(i);
            for (j, v) in a.row_entries(i) {
                if j != i && v != 0.0 {
                    marks[j] = Mark::Coarse;
                }
            }
        }

        if f_set.is_empty() {
            return None;
        }
        let c_set: Vec<usize> = (0..n).filter(|&i| marks[i] != Mark::Fine).collect();
        Some((f_set, c_set))
    }

    /// Attempt an aggregation level.
    ///
    /// Test vectors are random iterates relaxed against the homogeneous
    /// system; their pointwise correlation (affinity) ranks neighbor pairs,
    /// and each index greedily joins its highest-affinity neighbor's
    /// aggregate. Returns `None` when the clustering keeps too many
    /// aggregates to shrink the problem.
    fn aggregate(
        &self,
        a: &CsrMatrix,
        rng: &mut StdRng,
    ) -> Option<(CsrMatrix, Vec<usize>, CsrMatrix)> {
        let n = a.num_rows;
        let tvs = self.test_vectors(a, rng);

        // Squared norms across test vectors, per index
        let mut norms = vec![0.0f64; n];
        for tv in &tvs {
            for i in 0..n {
                norms[i] += tv[i] * tv[i];
            }
        }
        let affinity = |i: usize, j: usize| -> f64 {
            let mut dot = 0.0;
            for tv in &tvs {
                dot += tv[i] * tv[j];
            }
            let denom = norms[i] * norms[j];
            if denom <= 0.0 {
                0.0
            } else {
                (dot * dot) / denom
            }
        };

        const UNAGGREGATED: usize = usize::MAX;
        let mut aggregate_of = vec![UNAGGREGATED; n];
        let mut aggregate_size: Vec<usize> = Vec::new();
        let mut seeds: Vec<usize> = Vec::new();

        for i in 0..n {
            if aggregate_of[i] != UNAGGREGATED {
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for (j, v) in a.row_entries(i) {
                if j == i || v == 0.0 {
                    continue;
                }
                if aggregate_of[j] != UNAGGREGATED
                    && aggregate_size[aggregate_of[j]] >= self.config.max_aggregate_size
                {
                    continue;
                }
                let c = affinity(i, j);
                if best.map_or(true, |(_, bc)| c > bc) {
                    best = Some((j, c));
                }
            }

            match best {
                Some((j, _)) if aggregate_of[j] != UNAGGREGATED => {
                    let agg = aggregate_of[j];
                    aggregate_of[i] = agg;
                    aggregate_size[agg] += 1;
                }
                Some((j, _)) => {
                    let agg = seeds.len();
                    seeds.push(i);
                    aggregate_of[i] = agg;
                    aggregate_of[j] = agg;
                    aggregate_size.push(2);
                }
                None => {
                    let agg = seeds.len();
                    seeds.push(i);
                    aggregate_of[i] = agg;
                    aggregate_size.push(1);
                }
            }
        }

        let nc = seeds.len();
        if (nc as f64) > self.config.max_coarsening_ratio * n as f64 {
            return None;
        }

        let p = CsrMatrix::from_triplets(
            n,
            nc,
            (0..n).map(|i| (i, aggregate_of[i], 1.0)).collect(),
        );
        let coarse = p.transpose().matmul(&a.matmul(&p));
        Some((p, seeds, coarse))
    }

    /// Random test vectors relaxed toward the near-null space of the
    /// operator
    fn test_vectors(&self, a: &CsrMatrix, rng: &mut StdRng) -> Vec<Array1<f64>> {
        let n = a.num_rows;
        let zero = Array1::zeros(n);
        (0..self.config.num_test_vectors)
            .map(|_| {
                let guess = Array1::from_iter((0..n).map(|_| rng.random_range(-1.0..1.0)));
                self.smoother
                    .relax(a, &zero, &guess, self.config.test_vector_sweeps)
            })
            .collect()
    }
}

/// Eliminate one independent F-set exactly.
///
/// A_FF is diagonal because the F-set is independent, so the stage
/// operators are closed-form: P = −A_FF⁻¹·A_FC, q = diag(A_FF)⁻¹, and the
/// coarse matrix is the Schur complement A_CC + A_CF·P.
fn eliminate_stage(
    a: &CsrMatrix,
    f_set: Vec<usize>,
    c_set: Vec<usize>,
) -> (EliminationStage, CsrMatrix) {
    let n = a.num_rows;
    let nc = c_set.len();

    const NOT_LOCAL: usize = usize::MAX;
    let mut local_c = vec![NOT_LOCAL; n];
    for (lc, &c) in c_set.iter().enumerate() {
        local_c[c] = lc;
    }
    let mut local_f = vec![NOT_LOCAL; n];
    for (lf, &f) in f_set.iter().enumerate() {
        local_f[f] = lf;
    }

    let mut q = Array1::zeros(f_set.len());
    let mut p_triplets = Vec::new();
    for (lf, &f) in f_set.iter().enumerate() {
        let diag = a.get(f, f);
        q[lf] = 1.0 / diag;
        for (j, v) in a.row_entries(f) {
            if j != f && v != 0.0 {
                // Neighbors of an F index are all in the C-set
                p_triplets.push((lf, local_c[j], -v / diag));
            }
        }
    }
    let p = CsrMatrix::from_triplets(f_set.len(), nc, p_triplets);

    // Schur complement rows: C-C entries pass through, C-F couplings are
    // routed through the corresponding P row.
    let mut coarse_triplets = Vec::new();
    for (lc, &c) in c_set.iter().enumerate() {
        for (j, v) in a.row_entries(c) {
            if v == 0.0 {
                continue;
            }
            if local_c[j] != NOT_LOCAL {
                coarse_triplets.push((lc, local_c[j], v));
            } else {
                let lf = local_f[j];
                for (cj, pv) in p.row_entries(lf) {
                    coarse_triplets.push((lc, cj, v * pv));
                }
            }
        }
    }
    let coarse = CsrMatrix::from_triplets(nc, nc, coarse_triplets);

    (EliminationStage::new(p, q, f_set, c_set), coarse)
}
