//! Quality functions and the local-moving phase shared by multilevel and Leiden.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::network::{modularity, Network};

/// Objective optimised by the modularity-family algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quality {
    Modularity { resolution: f64 },
    /// Constant Potts model.
    Cpm { resolution: f64 },
}

impl Quality {
    /// Per-vertex weight used in the null-model penalty.
    pub fn vertex_weight(&self, network: &Network, v: usize) -> f64 {
        match self {
            Quality::Modularity { .. } => network.strength[v],
            Quality::Cpm { .. } => network.size[v],
        }
    }

    /// Penalty scale so that moving `v` into `c` gains
    /// `w(v, c) - scale * weight(v) * weight(c)`.
    pub fn scale(&self, network: &Network) -> f64 {
        match *self {
            Quality::Modularity { resolution } => {
                if network.total_strength > 0.0 {
                    resolution / network.total_strength
                } else {
                    0.0
                }
            }
            Quality::Cpm { resolution } => resolution,
        }
    }

    pub fn evaluate(&self, network: &Network, membership: &[usize]) -> f64 {
        match *self {
            Quality::Modularity { resolution } => modularity(network, membership, resolution),
            Quality::Cpm { resolution } => {
                let k = membership.iter().copied().max().map_or(0, |m| m + 1);
                let mut internal = vec![0.0; k];
                let mut sizes = vec![0.0; k];
                for v in 0..network.len() {
                    let c = membership[v];
                    internal[c] += network.self_loops[v] / 2.0;
                    sizes[c] += network.size[v];
                    for &(u, w) in &network.adj[v] {
                        if membership[u] == c {
                            internal[c] += w / 2.0;
                        }
                    }
                }
                internal
                    .iter()
                    .zip(&sizes)
                    .map(|(&e, &n)| e - resolution * n * (n - 1.0) / 2.0)
                    .sum()
            }
        }
    }
}

/// Weights from `v` to each neighboring community, in first-seen order.
pub(crate) struct NeighborWeights {
    weight: Vec<f64>,
    seen: Vec<bool>,
    touched: Vec<usize>,
}

impl NeighborWeights {
    pub fn new(capacity: usize) -> Self {
        Self {
            weight: vec![0.0; capacity],
            seen: vec![false; capacity],
            touched: Vec::new(),
        }
    }

    pub fn collect(&mut self, network: &Network, v: usize, membership: &[usize]) {
        self.collect_where(network, v, membership, |_| true);
    }

    /// Like [`collect`](Self::collect), skipping neighbors rejected by `keep`.
    pub fn collect_where(
        &mut self,
        network: &Network,
        v: usize,
        membership: &[usize],
        keep: impl Fn(usize) -> bool,
    ) {
        self.clear();
        for &(u, w) in &network.adj[v] {
            if !keep(u) {
                continue;
            }
            let c = membership[u];
            if !self.seen[c] {
                self.seen[c] = true;
                self.touched.push(c);
            }
            self.weight[c] += w;
        }
    }

    pub fn get(&self, c: usize) -> f64 {
        self.weight[c]
    }

    pub fn communities(&self) -> &[usize] {
        &self.touched
    }

    fn clear(&mut self) {
        for &c in &self.touched {
            self.weight[c] = 0.0;
            self.seen[c] = false;
        }
        self.touched.clear();
    }
}

/// Move single vertices between communities until no move improves quality.
///
/// Returns `true` when at least one vertex changed community.
pub fn local_moving(
    network: &Network,
    membership: &mut [usize],
    quality: Quality,
    rng: &mut StdRng,
) -> bool {
    let n = network.len();
    if n == 0 {
        return false;
    }
    let scale = quality.scale(network);
    let mut totals = vec![0.0; n];
    let mut counts = vec![0usize; n];
    for v in 0..n {
        totals[membership[v]] += quality.vertex_weight(network, v);
        counts[membership[v]] += 1;
    }
    let mut empties: Vec<usize> = (0..n).filter(|&c| counts[c] == 0).collect();

    let mut order: Vec<usize> = (0..n).collect();
    let mut neighbors = NeighborWeights::new(n);
    let mut any_moved = false;

    loop {
        order.shuffle(rng);
        let mut moved = false;

        for &v in &order {
            let current = membership[v];
            let vw = quality.vertex_weight(network, v);
            neighbors.collect(network, v, membership);

            totals[current] -= vw;
            counts[current] -= 1;

            let mut best = current;
            let mut best_gain = neighbors.get(current) - scale * vw * totals[current];

            for &c in neighbors.communities() {
                let gain = neighbors.get(c) - scale * vw * totals[c];
                if gain > best_gain + 1e-12 {
                    best = c;
                    best_gain = gain;
                }
            }

            // Being alone scores zero.
            if best_gain < 0.0 && counts[current] > 0 {
                if let Some(&empty) = empties.last() {
                    best = empty;
                }
            }

            totals[best] += vw;
            counts[best] += 1;
            if best != current {
                if empties.last() == Some(&best) {
                    empties.pop();
                }
                if counts[current] == 0 {
                    empties.push(current);
                }
                membership[v] = best;
                moved = true;
                any_moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    any_moved
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::super::network::test_graphs::*;
    use super::*;

    #[test]
    fn local_moving_finds_cliques() {
        let g = two_cliques();
        let net = Network::from_store(&g);
        let mut membership: Vec<usize> = (0..net.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let moved = local_moving(&net, &mut membership, Quality::Modularity { resolution: 1.0 }, &mut rng);
        assert!(moved);
        assert_two_cliques_split(&g, &membership);
    }

    #[test]
    fn local_moving_is_stable_on_optimum() {
        let g = two_cliques();
        let net = Network::from_store(&g);
        let mut membership: Vec<usize> = (0..net.len())
            .map(|v| if g.name(v).starts_with('a') { 0 } else { 1 })
            .collect();
        let mut rng = StdRng::seed_from_u64(1);

        let moved = local_moving(&net, &mut membership, Quality::Modularity { resolution: 1.0 }, &mut rng);
        assert!(!moved);
    }

    #[test]
    fn cpm_high_resolution_keeps_singletons() {
        let g = two_cliques();
        let net = Network::from_store(&g);
        let mut membership: Vec<usize> = (0..net.len()).collect();
        let mut rng = StdRng::seed_from_u64(3);

        local_moving(&net, &mut membership, Quality::Cpm { resolution: 5.0 }, &mut rng);
        let mut labels = membership.clone();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), net.len());
    }

    #[test]
    fn cpm_quality_counts_internal_edges() {
        let g = from_edges(&[("a", "b", 1.0), ("b", "c", 1.0), ("a", "c", 1.0)]);
        let net = Network::from_store(&g);
        let q = Quality::Cpm { resolution: 0.5 }.evaluate(&net, &[0, 0, 0]);
        // 3 internal edges minus 0.5 * C(3, 2)
        assert!((q - 1.5).abs() < 1e-12);
    }
}
