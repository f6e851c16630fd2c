use netjobs_core::PayloadError;
use netjobs_graph::GraphStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use crate::options::AlgorithmOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub iterations: usize,
    pub seed: u64,
}

impl LayoutParams {
    pub fn from_options(options: &AlgorithmOptions) -> Result<Self, PayloadError> {
        Ok(Self {
            iterations: options.positive_usize_or("iterations", 500)?,
            seed: options.u64_or("seed", 0)?,
        })
    }
}

/// Fruchterman-Reingold force-directed layout in two dimensions.
///
/// Every vertex repels every other with `k^2 / d` and edges attract with
/// `w * d^2 / k`, where `k = 1` is the ideal edge length. Displacement per
/// step is capped by a temperature that cools linearly to zero. Forces for
/// all vertices are computed in parallel from the previous positions.
pub fn fruchterman_reingold(graph: &GraphStore, params: &LayoutParams) -> Vec<[f64; 2]> {
    let n = graph.vertex_count();
    match n {
        0 => return Vec::new(),
        1 => return vec![[0.0, 0.0]],
        _ => {}
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let extent = (n as f64).sqrt();
    let mut positions: Vec<[f64; 2]> = (0..n)
        .map(|_| {
            [
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
            ]
        })
        .collect();

    let neighbors: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|v| graph.neighbors(v).filter(|&(u, _)| u != v).collect())
        .collect();
    let start_temperature = extent;

    for step in 0..params.iterations {
        let temperature = start_temperature * (1.0 - step as f64 / params.iterations as f64);
        let previous = &positions;

        let displacement: Vec<[f64; 2]> = (0..n)
            .into_par_iter()
            .map(|v| {
                let [x, y] = previous[v];
                let mut force = [0.0, 0.0];

                for (u, other) in previous.iter().enumerate() {
                    if u == v {
                        continue;
                    }
                    let (dx, dy, d) = separation(x - other[0], y - other[1], v, u);
                    let repulse = 1.0 / d;
                    force[0] += dx / d * repulse;
                    force[1] += dy / d * repulse;
                }

                for &(u, w) in &neighbors[v] {
                    let (dx, dy, d) = separation(x - previous[u][0], y - previous[u][1], v, u);
                    let attract = w * d * d;
                    force[0] -= dx / d * attract;
                    force[1] -= dy / d * attract;
                }

                force
            })
            .collect();

        positions = positions
            .iter()
            .zip(&displacement)
            .map(|(p, f)| {
                let len = (f[0] * f[0] + f[1] * f[1]).sqrt();
                if len <= 0.0 {
                    return *p;
                }
                let capped = len.min(temperature);
                [p[0] + f[0] / len * capped, p[1] + f[1] / len * capped]
            })
            .collect();
    }

    info!(vertices = n, iterations = params.iterations, "layout computed");
    positions
}

/// Offset between two vertices, nudged apart when they coincide.
fn separation(dx: f64, dy: f64, v: usize, u: usize) -> (f64, f64, f64) {
    let d = (dx * dx + dy * dy).sqrt();
    if d > 1e-9 {
        (dx, dy, d)
    } else {
        let nudge = if v < u { 1e-3 } else { -1e-3 };
        (nudge, 0.0, 1e-3)
    }
}
