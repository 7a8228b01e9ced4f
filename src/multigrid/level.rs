//! Hierarchy levels and coarsening-stage operators
//!
//! A level is a tagged variant rather than a class hierarchy: elimination
//! and aggregation levels share the coarsen/restrict/interpolate contract
//! but carry different operator data, dispatched by pattern matching.

use crate::parallel::parallel_map_indexed;
use crate::sparse::CsrMatrix;
use ndarray::Array1;

/// Coarsening kind of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    /// The caller-supplied finest problem; no transfer operators
    Finest,
    /// Exact Schur-complement elimination of an independent F-set
    Elimination,
    /// Approximate aggregation of strongly-coupled index clusters
    Aggregation,
}

/// One elimination stage: a disjoint C-set/F-set split of the stage's fine
/// index set together with the operators eliminating the F variables.
///
/// The F-set is an independent set, so A_FF is diagonal and elimination is
/// closed-form: P = −A_FF⁻¹·A_FC reconstructs F values from coarse ones and
/// q = diag(A_FF)⁻¹ converts the fine rhs's F components into the
/// back-substitution correction. The rhs restriction operator is R = Pᵀ.
#[derive(Debug, Clone)]
pub struct EliminationStage {
    /// Interpolation P (|F| × |C|): x_F = P·x_C + q ⊙ b_F
    p: CsrMatrix,
    /// Diagonal correction q = 1 / diag(A_FF)
    q: Array1<f64>,
    /// Eliminated fine-only indices, ascending
    f_set: Vec<usize>,
    /// Retained indices, ascending
    c_set: Vec<usize>,
    /// Size of the stage's fine index set (|C| + |F|)
    num_fine: usize,
}

impl EliminationStage {
    pub fn new(
        p: CsrMatrix,
        q: Array1<f64>,
        f_set: Vec<usize>,
        c_set: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(p.num_rows, f_set.len());
        debug_assert_eq!(p.num_cols, c_set.len());
        debug_assert_eq!(q.len(), f_set.len());
        let num_fine = f_set.len() + c_set.len();
        Self {
            p,
            q,
            f_set,
            c_set,
            num_fine,
        }
    }

    /// Size of the stage's fine index set
    pub fn num_fine(&self) -> usize {
        self.num_fine
    }

    /// Number of retained (coarse) indices
    pub fn num_coarse(&self) -> usize {
        self.c_set.len()
    }

    /// Retained indices, ascending
    pub fn c_set(&self) -> &[usize] {
        &self.c_set
    }

    /// Eliminated indices, ascending
    pub fn f_set(&self) -> &[usize] {
        &self.f_set
    }
}

/// One entry of the level hierarchy.
///
/// Every non-finest level owns the coarse matrix produced by its coarsening
/// together with the operators connecting it to the next finer level. The
/// matrix is immutable once the level is built.
#[derive(Debug, Clone)]
pub enum Level {
    Finest {
        matrix: CsrMatrix,
    },
    Elimination {
        matrix: CsrMatrix,
        stages: Vec<EliminationStage>,
        /// Composed map from this level's coarse indices to the fine
        /// indices they originate from, through all stages
        c_index_fine: Vec<usize>,
    },
    Aggregation {
        matrix: CsrMatrix,
        /// Piecewise-constant membership matrix (fine × coarse)
        p: CsrMatrix,
        /// Seed fine index per aggregate
        seeds: Vec<usize>,
    },
}

impl Level {
    /// Build an elimination level from the Schur-complement matrix and its
    /// coarsening stages, composing the coarse-to-fine index map.
    pub fn new_elimination(matrix: CsrMatrix, stages: Vec<EliminationStage>) -> Self {
        let mut c_index_fine: Vec<usize> = (0..matrix.num_rows).collect();
        for stage in stages.iter().rev() {
            for idx in c_index_fine.iter_mut() {
                *idx = stage.c_set[*idx];
            }
        }
        Level::Elimination {
            matrix,
            stages,
            c_index_fine,
        }
    }

    pub fn kind(&self) -> LevelKind {
        match self {
            Level::Finest { .. } => LevelKind::Finest,
            Level::Elimination { .. } => LevelKind::Elimination,
            Level::Aggregation { .. } => LevelKind::Aggregation,
        }
    }

    /// The matrix owned by this level
    pub fn matrix(&self) -> &CsrMatrix {
        match self {
            Level::Finest { matrix }
            | Level::Elimination { matrix, .. }
            | Level::Aggregation { matrix, .. } => matrix,
        }
    }

    /// Problem size at this level
    pub fn dim(&self) -> usize {
        self.matrix().num_rows
    }

    /// Elimination stages, when this is an elimination level
    pub fn stages(&self) -> Option<&[EliminationStage]> {
        match self {
            Level::Elimination { stages, .. } => Some(stages),
            _ => None,
        }
    }

    /// Project a fine vector onto this level's index set by direct lookup.
    ///
    /// Elimination levels subsample the composed C indices; aggregation
    /// levels take the aggregate seed's value. No weighting is applied.
    pub fn coarsen_vector(&self, xf: &Array1<f64>) -> Array1<f64> {
        match self {
            Level::Finest { .. } => unreachable!("finest level has no coarsening operators"),
            Level::Elimination { c_index_fine, .. } => {
                Array1::from_vec(parallel_map_indexed(c_index_fine.len(), |i| {
                    xf[c_index_fine[i]]
                }))
            }
            Level::Aggregation { seeds, .. } => {
                Array1::from_vec(parallel_map_indexed(seeds.len(), |i| xf[seeds[i]]))
            }
        }
    }

    /// Restrict a fine right-hand side (or residual) to this level.
    ///
    /// Elimination levels fold the F components into the C system stage by
    /// stage (bc = b_C + Pᵀ·b_F), recording the intermediate rhs before each
    /// stage; interpolation consumes those records in reverse. Aggregation
    /// levels apply the cluster restriction Pᵀ and record nothing.
    pub fn restrict(&self, bf: &Array1<f64>) -> (Array1<f64>, Vec<Array1<f64>>) {
        match self {
            Level::Finest { .. } => unreachable!("finest level has no coarsening operators"),
            Level::Elimination { stages, .. } => {
                let mut b_stages = Vec::with_capacity(stages.len() + 1);
                let mut bc = bf.clone();
                for stage in stages {
                    b_stages.push(bc.clone());
                    let b_c = extract_sub_vector(&bc, &stage.c_set);
                    let b_f = extract_sub_vector(&bc, &stage.f_set);
                    bc = b_c + stage.p.matvec_transpose(&b_f);
                }
                b_stages.push(bc.clone());
                (bc, b_stages)
            }
            Level::Aggregation { p, .. } => (p.matvec_transpose(bf), Vec::new()),
        }
    }

    /// Interpolate a coarse solution back to the next finer level.
    ///
    /// Elimination levels back-substitute stage by stage in strict reverse
    /// coarsening order (LIFO over `b_stages`): per stage the F values are
    /// reconstructed as P·x_C + q ⊙ b_F and merged with the unchanged C
    /// values. Aggregation levels broadcast each aggregate's value over its
    /// members via P.
    pub fn interpolate(&self, xc: &Array1<f64>, b_stages: &[Array1<f64>]) -> Array1<f64> {
        match self {
            Level::Finest { .. } => unreachable!("finest level has no coarsening operators"),
            Level::Elimination { stages, .. } => {
                let mut current = xc.clone();
                for (k, stage) in stages.iter().enumerate().rev() {
                    let b_f = extract_sub_vector(&b_stages[k], &stage.f_set);
                    let mut x_f = stage.p.matvec(&current);
                    for i in 0..x_f.len() {
                        x_f[i] += stage.q[i] * b_f[i];
                    }

                    let mut xf = Array1::zeros(stage.num_fine);
                    for (i, &fi) in stage.f_set.iter().enumerate() {
                        xf[fi] = x_f[i];
                    }
                    for (i, &ci) in stage.c_set.iter().enumerate() {
                        xf[ci] = current[i];
                    }
                    current = xf;
                }
                current
            }
            Level::Aggregation { p, .. } => p.matvec(xc),
        }
    }
}

/// Gather `vector[elements[i]]` into a new vector
fn extract_sub_vector(vector: &Array1<f64>, elements: &[usize]) -> Array1<f64> {
    Array1::from_vec(parallel_map_indexed(elements.len(), |i| {
        vector[elements[i]]
    }))
}
