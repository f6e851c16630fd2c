use std::collections::VecDeque;

use netjobs_core::PayloadError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::network::{renumber, Network};
use crate::options::AlgorithmOptions;

const MAX_POWER_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct LeadingEigenvectorParams {
    /// Upper bound on the number of communities. `None` splits until no
    /// split improves modularity.
    pub clusters: Option<usize>,
}

impl LeadingEigenvectorParams {
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, PayloadError> {
        let clusters = match options.get("clusters") {
            None => None,
            Some(_) => Some(options.positive_usize_or("clusters", 1)?),
        };
        Ok(Self { clusters })
    }
}

/// Newman's leading-eigenvector method: recursively bisect communities by
/// the sign pattern of the leading eigenvector of their generalised
/// modularity matrix.
pub fn leading_eigenvector(network: &Network, params: &LeadingEigenvectorParams) -> Vec<usize> {
    let n = network.len();
    let mut membership = vec![0; n];
    if n == 0 || network.total_strength <= 0.0 {
        return membership;
    }

    let limit = params.clusters.unwrap_or(n);
    let mut count = 1;
    let mut queue: VecDeque<Vec<usize>> = VecDeque::from([(0..n).collect::<Vec<_>>()]);
    let mut rng = StdRng::seed_from_u64(0);

    while count < limit {
        let Some(group) = queue.pop_front() else {
            break;
        };
        let Some((left, right)) = bisect(network, &group, &mut rng) else {
            continue;
        };
        debug!(left = left.len(), right = right.len(), "leading eigenvector split");

        for &v in &right {
            membership[v] = count;
        }
        count += 1;
        queue.push_back(left);
        queue.push_back(right);
    }

    renumber(&mut membership);
    membership
}

/// Split `group` in two if that increases modularity.
fn bisect(network: &Network, group: &[usize], rng: &mut StdRng) -> Option<(Vec<usize>, Vec<usize>)> {
    if group.len() < 2 {
        return None;
    }
    let matrix = GroupMatrix::new(network, group);

    // shift so that the largest algebraic eigenvalue dominates
    let shift = matrix.norm_bound();
    let mut x: Vec<f64> = (0..group.len()).map(|_| rng.gen::<f64>() - 0.5).collect();
    normalize(&mut x);
    let mut eigenvalue = 0.0;

    for _ in 0..MAX_POWER_ITERATIONS {
        let mut y = matrix.apply(&x);
        for (yi, xi) in y.iter_mut().zip(&x) {
            *yi += shift * xi;
        }
        let norm = normalize(&mut y);
        if norm == 0.0 {
            return None;
        }
        let delta: f64 = y.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = y;
        eigenvalue = norm - shift;
        if delta < TOLERANCE {
            break;
        }
    }

    if eigenvalue <= TOLERANCE {
        return None;
    }

    let s: Vec<f64> = x.iter().map(|&xi| if xi >= 0.0 { 1.0 } else { -1.0 }).collect();
    let bs = matrix.apply(&s);
    let gain: f64 = s.iter().zip(&bs).map(|(a, b)| a * b).sum::<f64>() / (2.0 * network.total_strength);
    if gain <= TOLERANCE {
        return None;
    }

    let (left, right): (Vec<(usize, f64)>, Vec<(usize, f64)>) =
        group.iter().copied().zip(s).partition(|&(_, sign)| sign > 0.0);
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((
        left.into_iter().map(|(v, _)| v).collect(),
        right.into_iter().map(|(v, _)| v).collect(),
    ))
}

/// Modularity matrix restricted to one community, applied without ever
/// materialising it.
struct GroupMatrix<'a> {
    network: &'a Network,
    group: &'a [usize],
    /// vertex -> index within the group
    local: Vec<Option<usize>>,
    /// Row sums of the restricted matrix, subtracted on the diagonal.
    row_sums: Vec<f64>,
}

impl<'a> GroupMatrix<'a> {
    fn new(network: &'a Network, group: &'a [usize]) -> Self {
        let mut local = vec![None; network.len()];
        for (i, &v) in group.iter().enumerate() {
            local[v] = Some(i);
        }
        let two_m = network.total_strength;
        let group_strength: f64 = group.iter().map(|&v| network.strength[v]).sum();
        let row_sums = group
            .iter()
            .map(|&v| {
                let inside: f64 = network.self_loops[v]
                    + network.adj[v]
                        .iter()
                        .filter(|(u, _)| local[*u].is_some())
                        .map(|(_, w)| w)
                        .sum::<f64>();
                inside - network.strength[v] * group_strength / two_m
            })
            .collect();
        Self {
            network,
            group,
            local,
            row_sums,
        }
    }

    fn apply(&self, x: &[f64]) -> Vec<f64> {
        let net = self.network;
        let two_m = net.total_strength;
        let kx: f64 = self.group.iter().zip(x).map(|(&v, xi)| net.strength[v] * xi).sum();

        self.group
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let mut ax = net.self_loops[v] * x[i];
                for &(u, w) in &net.adj[v] {
                    if let Some(j) = self.local[u] {
                        ax += w * x[j];
                    }
                }
                ax - net.strength[v] * kx / two_m - self.row_sums[i] * x[i]
            })
            .collect()
    }

    fn norm_bound(&self) -> f64 {
        let net = self.network;
        self.group
            .iter()
            .enumerate()
            .map(|(i, &v)| 2.0 * net.strength[v] + self.row_sums[i].abs())
            .fold(0.0, f64::max)
            + 1.0
    }
}

fn normalize(x: &mut [f64]) -> f64 {
    let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in x.iter_mut() {
            *v /= norm;
        }
    }
    norm
}
