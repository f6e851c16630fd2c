use std::collections::BTreeMap;

use tracing::debug;

use super::network::{renumber, Network};

/// Greedy agglomerative modularity maximisation (Clauset, Newman & Moore).
///
/// Starting from singletons, repeatedly merges the pair of adjacent
/// communities with the largest modularity gain until no adjacent pair is
/// left, then cuts the merge dendrogram at its highest modularity.
pub fn fastgreedy(network: &Network) -> Vec<usize> {
    let n = network.len();
    let two_m = network.total_strength;
    if n == 0 || two_m <= 0.0 {
        return (0..n).collect();
    }

    // e_ij: fraction of edge ends joining community i to j
    let mut links: Vec<BTreeMap<usize, f64>> = network
        .adj
        .iter()
        .map(|row| row.iter().map(|&(u, w)| (u, w / two_m)).collect())
        .collect();
    let mut a: Vec<f64> = network.strength.iter().map(|s| s / two_m).collect();
    let mut alive = vec![true; n];

    let mut merges: Vec<(usize, usize)> = Vec::new();
    let mut q = 0.0;
    let mut best_q = 0.0;
    let mut best_len = 0;

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| alive[i]) {
            for (&j, &e) in &links[i] {
                if j <= i {
                    continue;
                }
                let dq = 2.0 * (e - a[i] * a[j]);
                if best.map_or(true, |(_, _, b)| dq > b) {
                    best = Some((i, j, dq));
                }
            }
        }
        let Some((i, j, dq)) = best else {
            break;
        };

        let absorbed = std::mem::take(&mut links[j]);
        for (k, e) in absorbed {
            if k == i {
                continue;
            }
            links[k].remove(&j);
            *links[k].entry(i).or_insert(0.0) += e;
            *links[i].entry(k).or_insert(0.0) += e;
        }
        links[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;
        alive[j] = false;

        q += dq;
        merges.push((i, j));
        if q > best_q + 1e-12 {
            best_q = q;
            best_len = merges.len();
        }
    }

    debug!(merges = merges.len(), kept = best_len, "fastgreedy dendrogram cut");

    let mut parent: Vec<usize> = (0..n).collect();
    for &(i, j) in &merges[..best_len] {
        parent[j] = i;
    }
    let mut membership: Vec<usize> = (0..n).map(|v| root(&parent, v)).collect();
    renumber(&mut membership);
    membership
}

fn root(parent: &[usize], mut v: usize) -> usize {
    while parent[v] != v {
        v = parent[v];
    }
    v
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
        let labels = fastgreedy(&net);
        assert_two_cliques_split(&g, &labels);
        assert_eq!(labels.iter().max(), Some(&1));
        assert!(modularity(&net, &labels, 1.0) > 0.4);
    }

    #[test]
    fn separate_components_never_merge() {
        let g = from_edges(&[("a", "b", 1.0), ("c", "d", 1.0)]);
        let labels = fastgreedy(&Network::from_store(&g));
        let id = |n: &str| g.vertex_id(n).unwrap();
        assert_eq!(labels[id("a")], labels[id("b")]);
        assert_ne!(labels[id("a")], labels[id("c")]);
    }

    #[test]
    fn zero_weight_graph_stays_singletons() {
        let g = from_edges(&[("a", "b", 0.0)]);
        assert_eq!(fastgreedy(&Network::from_store(&g)), vec![0, 1]);
    }
}
