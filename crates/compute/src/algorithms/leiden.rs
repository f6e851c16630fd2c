//! Leiden community detection (Traag, Waltman & van Eck, 2019).
//!
//! Each iteration runs local moving, then refines every community by merging
//! singletons only into well-connected sub-communities, and aggregates the
//! network by the *refined* partition while seeding the coarse level with the
//! unrefined one. This guarantees connected communities, which plain
//! multilevel optimisation does not.

use netjobs_core::PayloadError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::network::{renumber, Network};
use super::partition::{local_moving, NeighborWeights, Quality};
use crate::options::AlgorithmOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct LeidenParams {
    pub quality: Quality,
    /// Randomness of the refinement merge choice.
    pub beta: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl LeidenParams {
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, PayloadError> {
        let objective = options.choice_or("objective_function", &["modularity", "cpm"], "modularity")?;
        let resolution = options.f64_or("resolution", 1.0)?;
        let beta = options.f64_or("beta", 0.01)?;
        if beta == 0.0 {
            return Err(PayloadError::InvalidOption {
                name: "beta".to_string(),
                value: "0".to_string(),
                expected: "a positive number".to_string(),
            });
        }
        let quality = if objective == "cpm" {
            Quality::Cpm { resolution }
        } else {
            Quality::Modularity { resolution }
        };
        Ok(Self {
            quality,
            beta,
            iterations: options.positive_usize_or("iterations", 2)?,
            seed: options.u64_or("seed", 0)?,
        })
    }
}

pub fn leiden(network: &Network, params: &LeidenParams) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut membership: Vec<usize> = (0..network.len()).collect();

    for iteration in 0..params.iterations {
        let changed = leiden_pass(network, &mut membership, params, &mut rng);
        debug!(iteration, changed, "leiden iteration");
        if !changed {
            break;
        }
    }

    renumber(&mut membership);
    membership
}

/// One full Leiden pass starting from `membership`. Returns whether the
/// partition changed.
fn leiden_pass(
    network: &Network,
    membership: &mut Vec<usize>,
    params: &LeidenParams,
    rng: &mut StdRng,
) -> bool {
    let before = {
        let mut m = membership.clone();
        renumber(&mut m);
        m
    };

    let mut level = network.clone();
    let mut level_membership = before.clone();
    // original vertex -> vertex of the current level
    let mut position: Vec<usize> = (0..network.len()).collect();

    loop {
        local_moving(&level, &mut level_membership, params.quality, rng);
        let communities = renumber(&mut level_membership);
        if communities == level.len() {
            break;
        }

        let mut refined = refine(&level, &level_membership, params, rng);
        let sub_communities = renumber(&mut refined);
        if sub_communities == level.len() {
            break;
        }

        let mut seeded = vec![0; sub_communities];
        for v in 0..level.len() {
            seeded[refined[v]] = level_membership[v];
        }
        for p in position.iter_mut() {
            *p = refined[*p];
        }
        level = level.aggregate(&refined);
        level_membership = seeded;
    }

    for (v, label) in membership.iter_mut().enumerate() {
        *label = level_membership[position[v]];
    }
    renumber(membership);
    *membership != before
}

/// Split each community of `membership` into well-connected sub-communities.
fn refine(
    network: &Network,
    membership: &[usize],
    params: &LeidenParams,
    rng: &mut StdRng,
) -> Vec<usize> {
    let n = network.len();
    let quality = params.quality;
    let scale = quality.scale(network);

    let mut refined: Vec<usize> = (0..n).collect();
    let mut totals: Vec<f64> = (0..n).map(|v| quality.vertex_weight(network, v)).collect();
    let mut sizes = vec![1usize; n];
    // weight from each refined community to the rest of its parent
    let mut external: Vec<f64> = (0..n)
        .map(|v| {
            network.adj[v]
                .iter()
                .filter(|&&(u, _)| membership[u] == membership[v])
                .map(|&(_, w)| w)
                .sum()
        })
        .collect();

    let k = membership.iter().copied().max().map_or(0, |m| m + 1);
    let mut parent_totals = vec![0.0; k];
    for v in 0..n {
        parent_totals[membership[v]] += totals[v];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let mut neighbors = NeighborWeights::new(n);
    let mut candidates: Vec<(usize, f64)> = Vec::new();

    for v in order {
        let own = refined[v];
        if sizes[own] != 1 {
            continue;
        }
        let parent = membership[v];
        let vw = quality.vertex_weight(network, v);
        if external[own] < scale * vw * (parent_totals[parent] - vw) - 1e-12 {
            continue;
        }

        neighbors.collect_where(network, v, &refined, |u| membership[u] == parent);
        candidates.clear();
        candidates.push((own, 0.0));
        for &r in neighbors.communities() {
            if r == own {
                continue;
            }
            let well_connected =
                external[r] >= scale * totals[r] * (parent_totals[parent] - totals[r]) - 1e-12;
            if !well_connected {
                continue;
            }
            let gain = neighbors.get(r) - scale * vw * totals[r];
            if gain >= 0.0 {
                candidates.push((r, gain));
            }
        }
        if candidates.len() == 1 {
            continue;
        }

        let target = choose(&candidates, params.beta, rng);
        if target == own {
            continue;
        }

        external[target] += external[own] - 2.0 * neighbors.get(target);
        totals[target] += vw;
        sizes[target] += 1;
        totals[own] = 0.0;
        sizes[own] = 0;
        external[own] = 0.0;
        refined[v] = target;
    }

    refined
}

/// Pick a candidate with probability proportional to `exp(gain / beta)`.
fn choose(candidates: &[(usize, f64)], beta: f64, rng: &mut StdRng) -> usize {
    let max_gain = candidates
        .iter()
        .map(|&(_, g)| g)
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = candidates
        .iter()
        .map(|&(_, g)| ((g - max_gain) / beta).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let mut draw = rng.gen::<f64>() * total;
    for (&(c, _), &w) in candidates.iter().zip(&weights) {
        if draw < w {
            return c;
        }
        draw -= w;
    }
    candidates[candidates.len() - 1].0
}
