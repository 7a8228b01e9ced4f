//! Undirected weighted graphs and their Laplacian matrices
//!
//! The solver consumes graphs only to derive Laplacians (L = D − A, rows
//! summing to zero) and to answer connectivity queries for the
//! `setup`/`setup_connected` preconditions. Traversal beyond BFS component
//! discovery is out of scope here.

use crate::sparse::CsrMatrix;
use std::collections::VecDeque;

/// Undirected graph with positive edge weights, stored as adjacency lists.
#[derive(Debug, Clone)]
pub struct Graph {
    n: usize,
    adj: Vec<Vec<(usize, f64)>>,
}

impl Graph {
    /// Create a graph with `n` nodes and no edges
    pub fn new(n: usize) -> Self {
        Self {
            n,
            adj: vec![Vec::new(); n],
        }
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.n
    }

    /// Add an undirected edge with the given weight.
    ///
    /// Self-loops are ignored: they do not contribute to the Laplacian.
    ///
    /// # Panics
    ///
    /// Panics if an endpoint is out of range or the weight is not positive.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) {
        assert!(u < self.n && v < self.n, "edge endpoint out of range");
        assert!(weight > 0.0, "edge weight must be positive");
        if u == v {
            return;
        }
        self.adj[u].push((v, weight));
        self.adj[v].push((u, weight));
    }

    /// Neighbors of a node as (node, weight) pairs
    pub fn neighbors(&self, u: usize) -> &[(usize, f64)] {
        &self.adj[u]
    }

    /// Weighted degree of a node
    pub fn weighted_degree(&self, u: usize) -> f64 {
        self.adj[u].iter().map(|&(_, w)| w).sum()
    }

    /// Laplacian matrix L = D − A
    ///
    /// Diagonal entries are weighted degrees, off-diagonals negative edge
    /// weights; every row sums to zero.
    pub fn laplacian(&self) -> CsrMatrix {
        let mut triplets = Vec::with_capacity(self.n + 2 * self.num_edges());
        for u in 0..self.n {
            let mut degree = 0.0;
            for &(v, w) in &self.adj[u] {
                degree += w;
                triplets.push((u, v, -w));
            }
            triplets.push((u, u, degree));
        }
        CsrMatrix::from_triplets(self.n, self.n, triplets)
    }

    /// Number of edges
    pub fn num_edges(&self) -> usize {
        self.adj.iter().map(|a| a.len()).sum::<usize>() / 2
    }

    /// Whether the graph is connected (the empty graph counts as connected)
    pub fn is_connected(&self) -> bool {
        if self.n == 0 {
            return true;
        }
        let mut visited = vec![false; self.n];
        let mut queue = VecDeque::from([0usize]);
        visited[0] = true;
        let mut seen = 1;
        while let Some(u) = queue.pop_front() {
            for &(v, _) in &self.adj[u] {
                if !visited[v] {
                    visited[v] = true;
                    seen += 1;
                    queue.push_back(v);
                }
            }
        }
        seen == self.n
    }
}

/// Connected components of the graph underlying a sparse matrix.
///
/// Two indices are adjacent when the matrix couples them with a nonzero
/// off-diagonal entry. Each component's node list is sorted ascending, and
/// components are ordered by their smallest node.
pub fn matrix_components(a: &CsrMatrix) -> Vec<Vec<usize>> {
    let n = a.num_rows;
    let mut visited = vec![false; n];
    let mut components = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        while let Some(u) = queue.pop_front() {
            component.push(u);
            for (j, v) in a.row_entries(u) {
                if j != u && v != 0.0 && !visited[j] {
                    visited[j] = true;
                    queue.push_back(j);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    components
}
