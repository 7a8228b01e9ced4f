//! Ordered collection of hierarchy levels

use super::level::{Level, LevelKind};

/// Levels ordered finest to coarsest.
///
/// Built once by the setup phase and treated as immutable by the solve
/// phase. Index 0 is always the finest (caller-supplied) problem.
#[derive(Debug, Clone)]
pub struct LevelHierarchy {
    levels: Vec<Level>,
}

impl LevelHierarchy {
    pub fn new(finest: Level) -> Self {
        debug_assert_eq!(finest.kind(), LevelKind::Finest);
        Self {
            levels: vec![finest],
        }
    }

    pub fn push(&mut self, level: Level) {
        debug_assert_ne!(level.kind(), LevelKind::Finest);
        debug_assert!(level.dim() < self.coarsest().dim());
        self.levels.push(level);
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn at(&self, index: usize) -> &Level {
        &self.levels[index]
    }

    pub fn finest(&self) -> &Level {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &Level {
        self.levels.last().unwrap()
    }

    /// Sum of level dimensions divided by the finest dimension.
    ///
    /// Close to 1 means cheap extra levels; setup keeps this low by only
    /// accepting coarsenings that shrink the problem.
    pub fn grid_complexity(&self) -> f64 {
        let total: usize = self.levels.iter().map(|l| l.dim()).sum();
        total as f64 / self.finest().dim() as f64
    }

    /// Sum of level nonzeros divided by the finest nonzeros
    pub fn operator_complexity(&self) -> f64 {
        let total: usize = self.levels.iter().map(|l| l.matrix().nnz()).sum();
        total as f64 / self.finest().matrix().nnz() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CsrMatrix;

    fn diag(n: usize) -> CsrMatrix {
        CsrMatrix::from_triplets(n, n, (0..n).map(|i| (i, i, 1.0)).collect())
    }

    #[test]
    fn test_ordering_and_complexity() {
        let mut h = LevelHierarchy::new(Level::Finest { matrix: diag(8) });
        h.push(Level::Aggregation {
            matrix: diag(4),
            p: CsrMatrix::new(8, 4),
            seeds: vec![0, 2, 4, 6],
        });
        h.push(Level::Aggregation {
            matrix: diag(2),
            p: CsrMatrix::new(4, 2),
            seeds: vec![0, 2],
        });

        assert_eq!(h.num_levels(), 3);
        assert_eq!(h.finest().dim(), 8);
        assert_eq!(h.coarsest().dim(), 2);
        assert!(h.at(1).dim() > h.at(2).dim());
        assert!((h.grid_complexity() - 14.0 / 8.0).abs() < 1e-14);
        assert!((h.operator_complexity() - 14.0 / 8.0).abs() < 1e-14);
    }
}
