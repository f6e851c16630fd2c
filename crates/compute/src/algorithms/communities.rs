use std::collections::HashMap;

use netjobs_core::PayloadError;
use netjobs_graph::GraphStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::options::AlgorithmOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelPropagationParams {
    pub max_iterations: usize,
    pub seed: u64,
}

impl LabelPropagationParams {
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, PayloadError> {
        Ok(Self {
            max_iterations: options.positive_usize_or("iterations", 100)?,
            seed: options.u64_or("seed", 0)?,
        })
    }
}

/// Detect communities via label propagation.
///
/// Each vertex starts with a unique label. On each sweep (in a seeded random
/// order) every vertex adopts the label carrying the most edge weight among
/// its neighbors. Ties are broken by choosing the smallest label for
/// determinism.
///
/// Returns one label per vertex id.
pub fn label_propagation(graph: &GraphStore, params: &LabelPropagationParams) -> Vec<usize> {
    let n = graph.vertex_count();
    let mut labels: Vec<usize> = (0..n).collect();
    if n == 0 {
        return labels;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut order: Vec<usize> = (0..n).collect();

    for iteration in 0..params.max_iterations {
        order.shuffle(&mut rng);
        let mut changed = false;

        for &v in &order {
            let mut label_weights: HashMap<usize, f64> = HashMap::new();
            for (u, w) in graph.neighbors(v) {
                if u != v {
                    *label_weights.entry(labels[u]).or_default() += w;
                }
            }

            if label_weights.is_empty() {
                continue; // isolated vertex keeps its label
            }

            let max_weight = label_weights.values().copied().fold(f64::MIN, f64::max);
            let best_label = label_weights
                .iter()
                .filter(|(_, &weight)| weight >= max_weight - 1e-12)
                .map(|(&label, _)| label)
                .min()
                .unwrap_or(labels[v]);

            if labels[v] != best_label {
                labels[v] = best_label;
                changed = true;
            }
        }

        if !changed {
            info!(iterations = iteration + 1, "label propagation converged");
            return labels;
        }
    }

    info!(
        iterations = params.max_iterations,
        "label propagation completed without convergence"
    );
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::network::test_graphs::*;

    fn defaults() -> LabelPropagationParams {
        LabelPropagationParams::from_options(&AlgorithmOptions::new()).unwrap()
    }

    #[test]
    fn communities_connected_components() {
        // Two disconnected pairs: (alice-bob) and (carol-dave)
        let g = from_edges(&[("alice", "bob", 1.0), ("carol", "dave", 1.0)]);
        let labels = label_propagation(&g, &defaults());

        let id = |n: &str| g.vertex_id(n).unwrap();
        assert_eq!(labels[id("alice")], labels[id("bob")]);
        assert_eq!(labels[id("carol")], labels[id("dave")]);
        assert_ne!(labels[id("alice")], labels[id("carol")]);
    }

    #[test]
    fn weak_bridge_does_not_merge_cliques() {
        let g = two_cliques();
        let labels = label_propagation(&g, &defaults());
        assert_two_cliques_split(&g, &labels);
    }

    #[test]
    fn same_seed_same_labels() {
        let g = two_cliques();
        let params = LabelPropagationParams {
            max_iterations: 50,
            seed: 11,
        };
        assert_eq!(label_propagation(&g, &params), label_propagation(&g, &params));
    }

    #[test]
    fn communities_empty() {
        let g = GraphStore::new();
        assert!(label_propagation(&g, &defaults()).is_empty());
    }

    #[test]
    fn rejects_zero_iterations() {
        let options: AlgorithmOptions = [("iterations", "0")].into_iter().collect();
        assert!(LabelPropagationParams::from_options(&options).is_err());
    }
}
