//! Multilevel modularity optimisation (Louvain method).

use netjobs_core::PayloadError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::network::{renumber, Network};
use super::partition::{local_moving, Quality};
use crate::options::AlgorithmOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct MultilevelParams {
    pub resolution: f64,
}

impl MultilevelParams {
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, PayloadError> {
        Ok(Self {
            resolution: options.f64_or("resolution", 1.0)?,
        })
    }
}

/// Alternate local moving and aggregation until a level brings no move.
pub fn multilevel(network: &Network, params: &MultilevelParams) -> Vec<usize> {
    let quality = Quality::Modularity {
        resolution: params.resolution,
    };
    let mut rng = StdRng::seed_from_u64(0);
    let mut membership: Vec<usize> = (0..network.len()).collect();
    let mut level = network.clone();
    let mut depth = 0;

    loop {
        let mut local: Vec<usize> = (0..level.len()).collect();
        if !local_moving(&level, &mut local, quality, &mut rng) {
            break;
        }
        let communities = renumber(&mut local);
        for label in membership.iter_mut() {
            *label = local[*label];
        }
        depth += 1;
        debug!(level = depth, communities, "multilevel pass");

        if communities == level.len() {
            break;
        }
        level = level.aggregate(&local);
    }

    renumber(&mut membership);
    membership
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::network::modularity;
    use crate::algorithms::network::test_graphs::*;

    #[test]
    fn splits_two_cliques() {
        let g = two_cliques();
        let net = Network::from_store(&g);
        let labels = multilevel(&net, &MultilevelParams { resolution: 1.0 });
        assert_two_cliques_split(&g, &labels);
        assert!(modularity(&net, &labels, 1.0) > 0.4);
    }

    #[test]
    fn ring_of_cliques_collapses_per_clique() {
        let mut edges = Vec::new();
        let names: Vec<Vec<String>> = (0..4)
            .map(|c| (0..5).map(|i| format!("c{}v{}", c, i)).collect())
            .collect();
        for clique in &names {
            for i in 0..clique.len() {
                for j in (i + 1)..clique.len() {
                    edges.push((clique[i].as_str(), clique[j].as_str(), 1.0));
                }
            }
        }
        for c in 0..4 {
            edges.push((names[c][0].as_str(), names[(c + 1) % 4][1].as_str(), 1.0));
        }
        let g = from_edges(&edges);
        let net = Network::from_store(&g);
        let labels = multilevel(&net, &MultilevelParams { resolution: 1.0 });

        let k = labels.iter().max().unwrap() + 1;
        assert_eq!(k, 4);
        for clique in &names {
            let first = labels[g.vertex_id(&clique[0]).unwrap()];
            for name in clique {
                assert_eq!(labels[g.vertex_id(name).unwrap()], first);
            }
        }
    }

    #[test]
    fn edgeless_graph_keeps_singletons() {
        let mut g = netjobs_graph::GraphStore::new();
        g.upsert_vertex("x");
        g.upsert_vertex("y");
        let labels = multilevel(&Network::from_store(&g), &MultilevelParams { resolution: 1.0 });
        assert_eq!(labels, vec![0, 1]);
    }
}
