//! Neighbor-graph embedding (UMAP) of the raw proximity matrix
//!
//! Works directly on `1 - proximity` distances and ignores the backbone. The
//! steps follow the usual recipe: smooth k-nearest-neighbor memberships, a
//! fuzzy union of the directed neighbor graph, and stochastic gradient descent
//! on the low-dimensional cross entropy with negative sampling.

use crate::config::UmapConfig;
use crate::data::ProximityEdge;
use crate::layout::Layout;
use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Pairwise distances `1 - proximity`; missing pairs are 1.0, the diagonal 0.0
pub fn distance_matrix(node_ids: &[String], edges: &[ProximityEdge]) -> Array2<f64> {
    let n = node_ids.len();
    let index: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut distances = Array2::from_elem((n, n), 1.0);
    for edge in edges {
        if let (Some(&a), Some(&b)) = (
            index.get(edge.product_a.as_str()),
            index.get(edge.product_b.as_str()),
        ) {
            let d = 1.0 - edge.proximity;
            distances[[a, b]] = d;
            distances[[b, a]] = d;
        }
    }
    for i in 0..n {
        distances[[i, i]] = 0.0;
    }

    distances
}

/// The k nearest other nodes of every row, closest first
fn nearest_neighbors(distances: &Array2<f64>, k: usize) -> Vec<Vec<(usize, f64)>> {
    let n = distances.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut row: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, distances[[i, j]]))
                .collect();
            row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            row.truncate(k);
            row
        })
        .collect()
}

/// Per-node (rho, sigma) so the neighbor memberships sum to log2(k)
fn smooth_knn(neighbors: &[(usize, f64)], k: usize) -> (f64, f64) {
    let rho = neighbors
        .iter()
        .map(|&(_, d)| d)
        .find(|&d| d > 0.0)
        .unwrap_or(0.0);
    let target = (k as f64).log2().max(1e-3);

    let membership_sum = |sigma: f64| -> f64 {
        neighbors
            .iter()
            .map(|&(_, d)| (-(d - rho).max(0.0) / sigma).exp())
            .sum()
    };

    let (mut lo, mut hi, mut sigma) = (0.0_f64, f64::INFINITY, 1.0_f64);
    for _ in 0..64 {
        let sum = membership_sum(sigma);
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_infinite() { sigma * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    (rho, sigma.max(1e-3))
}

/// Symmetric fuzzy neighbor graph as `(i, j, weight)` with `i < j`
pub fn fuzzy_graph(distances: &Array2<f64>, n_neighbors: usize) -> Vec<(usize, usize, f64)> {
    let n = distances.nrows();
    let k = n_neighbors.min(n.saturating_sub(1));
    if k == 0 {
        return Vec::new();
    }

    let knn = nearest_neighbors(distances, k);
    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, row) in knn.iter().enumerate() {
        let (rho, sigma) = smooth_knn(row, k);
        for &(j, d) in row {
            let weight = (-(d - rho).max(0.0) / sigma).exp();
            directed.insert((i, j), weight);
        }
    }

    // Fuzzy union: w = a + b - a*b
    let mut symmetric: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let key = if i < j { (i, j) } else { (j, i) };
        if symmetric.contains_key(&key) {
            continue;
        }
        let reverse = directed.get(&(j, i)).copied().unwrap_or(0.0);
        symmetric.insert(key, w + reverse - w * reverse);
    }

    symmetric
        .into_iter()
        .filter(|&(_, w)| w > 0.0)
        .map(|((i, j), w)| (i, j, w))
        .collect()
}

/// Fit `a`, `b` of `1 / (1 + a d^(2b))` to the target membership curve
pub fn fit_curve(spread: f64, min_dist: f64) -> (f64, f64) {
    let samples: Vec<(f64, f64)> = (1..=300)
        .map(|i| {
            let x = 3.0 * spread * i as f64 / 300.0;
            let y = if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            };
            (x, y)
        })
        .collect();

    let error = |a: f64, b: f64| -> f64 {
        samples
            .iter()
            .map(|&(x, y)| {
                let fitted = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fitted - y) * (fitted - y)
            })
            .sum()
    };

    // Coarse grid, then shrink the search window around the best point
    let (mut best_a, mut best_b) = (1.0, 1.0);
    let mut best = error(best_a, best_b);
    let (mut a_step, mut b_step) = (0.5, 0.1);
    let (mut a_lo, mut a_hi, mut b_lo, mut b_hi) = (0.01, 10.0, 0.1, 2.0);

    for _ in 0..6 {
        let mut a = a_lo;
        while a <= a_hi {
            let mut b = b_lo;
            while b <= b_hi {
                let e = error(a, b);
                if e < best {
                    best = e;
                    best_a = a;
                    best_b = b;
                }
                b += b_step;
            }
            a += a_step;
        }
        a_lo = (best_a - a_step).max(1e-3);
        a_hi = best_a + a_step;
        b_lo = (best_b - b_step).max(1e-3);
        b_hi = best_b + b_step;
        a_step /= 5.0;
        b_step /= 5.0;
    }

    (best_a, best_b)
}

fn clip(value: f64) -> f64 {
    value.clamp(-4.0, 4.0)
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

/// Embed the nodes in 2-D from their distance matrix
pub fn embed(
    node_ids: &[String],
    distances: &Array2<f64>,
    config: &UmapConfig,
    rng_seed: u64,
) -> Result<Layout> {
    let n = node_ids.len();
    if distances.nrows() != n || distances.ncols() != n {
        anyhow::bail!(
            "distance matrix is {}x{} for {} nodes",
            distances.nrows(),
            distances.ncols(),
            n
        );
    }
    log::info!(
        "Running UMAP embedding over {} nodes (n_neighbors={}, min_dist={})",
        n,
        config.n_neighbors,
        config.min_dist
    );

    let mut rng = StdRng::seed_from_u64(rng_seed);
    let mut positions: Vec<[f64; 2]> = (0..n)
        .map(|_| [rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)])
        .collect();

    let graph = fuzzy_graph(distances, config.n_neighbors);
    if graph.is_empty() {
        return Ok(Layout::new(node_ids.to_vec(), positions));
    }

    let (a, b) = fit_curve(config.spread, config.min_dist);
    log::debug!("Fitted curve parameters a={:.4} b={:.4}", a, b);

    let max_weight = graph.iter().map(|e| e.2).fold(0.0, f64::max);
    let epochs_per_sample: Vec<f64> = graph.iter().map(|e| max_weight / e.2).collect();
    let mut next_sample = epochs_per_sample.clone();

    for epoch in 0..config.n_epochs {
        let alpha = config.learning_rate * (1.0 - epoch as f64 / config.n_epochs as f64);

        for (edge, &(i, j, _)) in graph.iter().enumerate() {
            if next_sample[edge] > (epoch + 1) as f64 {
                continue;
            }
            next_sample[edge] += epochs_per_sample[edge];

            // Attraction along the edge
            let d2 = squared_distance(positions[i], positions[j]);
            if d2 > 0.0 {
                let coeff = -2.0 * a * b * d2.powf(b - 1.0) / (1.0 + a * d2.powf(b));
                for axis in 0..2 {
                    let delta = positions[i][axis] - positions[j][axis];
                    let step = clip(coeff * delta) * alpha;
                    positions[i][axis] += step;
                    positions[j][axis] -= step;
                }
            }

            // Repulsion from random nodes
            for _ in 0..config.negative_sample_rate {
                let k = rng.gen_range(0..n);
                if k == i {
                    continue;
                }
                let d2 = squared_distance(positions[i], positions[k]);
                let coeff = if d2 > 0.0 {
                    2.0 * b / ((0.001 + d2) * (1.0 + a * d2.powf(b)))
                } else {
                    0.0
                };
                for axis in 0..2 {
                    let step = if coeff > 0.0 {
                        clip(coeff * (positions[i][axis] - positions[k][axis]))
                    } else {
                        4.0
                    };
                    positions[i][axis] += step * alpha;
                }
            }
        }

        if epoch % 50 == 0 {
            log::debug!("UMAP epoch {}/{}", epoch, config.n_epochs);
        }
    }

    log::info!("UMAP embedding finished after {} epochs", config.n_epochs);
    Ok(Layout::new(node_ids.to_vec(), positions))
}
