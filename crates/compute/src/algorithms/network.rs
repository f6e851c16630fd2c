//! Compact weighted network used by the multi-level community algorithms.
//!
//! Unlike [`GraphStore`], a `Network` can be collapsed into a coarser one
//! (one vertex per community) while keeping every quantity the quality
//! functions need: strengths, self-loops and vertex sizes.

use netjobs_graph::GraphStore;

#[derive(Debug, Clone)]
pub struct Network {
    /// Neighbor lists excluding self-loops.
    pub adj: Vec<Vec<(usize, f64)>>,
    /// Adjacency diagonal (twice the self-loop weight).
    pub self_loops: Vec<f64>,
    /// Weighted degree including the diagonal.
    pub strength: Vec<f64>,
    /// Number of original vertices represented by each vertex.
    pub size: Vec<f64>,
    /// Sum of all strengths (`2m`).
    pub total_strength: f64,
}

impl Network {
    pub fn from_store(graph: &GraphStore) -> Self {
        let n = graph.vertex_count();
        let mut adj = vec![Vec::new(); n];
        let mut self_loops = vec![0.0; n];
        let mut strength = vec![0.0; n];

        for v in 0..n {
            for (u, w) in graph.neighbors(v) {
                if u == v {
                    self_loops[v] += w;
                } else {
                    adj[v].push((u, w));
                }
                strength[v] += w;
            }
        }

        let total_strength = strength.iter().sum();
        Self {
            adj,
            self_loops,
            strength,
            size: vec![1.0; n],
            total_strength,
        }
    }

    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    /// Collapse every community of `membership` into a single vertex.
    ///
    /// `membership` must use labels `0..k`.
    pub fn aggregate(&self, membership: &[usize]) -> Network {
        let k = membership.iter().copied().max().map_or(0, |m| m + 1);
        let mut weights: Vec<std::collections::BTreeMap<usize, f64>> =
            vec![std::collections::BTreeMap::new(); k];
        let mut self_loops = vec![0.0; k];
        let mut strength = vec![0.0; k];
        let mut size = vec![0.0; k];

        for v in 0..self.len() {
            let cv = membership[v];
            self_loops[cv] += self.self_loops[v];
            strength[cv] += self.strength[v];
            size[cv] += self.size[v];
            for &(u, w) in &self.adj[v] {
                let cu = membership[u];
                if cu == cv {
                    self_loops[cv] += w;
                } else {
                    *weights[cv].entry(cu).or_insert(0.0) += w;
                }
            }
        }

        Network {
            adj: weights.into_iter().map(|m| m.into_iter().collect()).collect(),
            self_loops,
            strength,
            size,
            total_strength: self.total_strength,
        }
    }
}

/// Renumber labels to `0..k` in order of first appearance. Returns `k`.
pub fn renumber(membership: &mut [usize]) -> usize {
    let mut mapping = std::collections::HashMap::new();
    for label in membership.iter_mut() {
        let next = mapping.len();
        *label = *mapping.entry(*label).or_insert(next);
    }
    mapping.len()
}

/// Modularity of a membership vector with resolution `gamma`.
pub fn modularity(network: &Network, membership: &[usize], gamma: f64) -> f64 {
    let two_m = network.total_strength;
    if two_m <= 0.0 {
        return 0.0;
    }
    let k = membership.iter().copied().max().map_or(0, |m| m + 1);
    let mut internal = vec![0.0; k];
    let mut totals = vec![0.0; k];

    for v in 0..network.len() {
        let c = membership[v];
        internal[c] += network.self_loops[v];
        totals[c] += network.strength[v];
        for &(u, w) in &network.adj[v] {
            if membership[u] == c {
                internal[c] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&totals)
        .map(|(&inside, &total)| inside / two_m - gamma * (total / two_m).powi(2))
        .sum()
}
