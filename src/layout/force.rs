//! Kamada-Kawai spring layout

use crate::config::ForceLayoutConfig;
use crate::graph::algorithms::hop_distances;
use crate::graph::{Backbone, WeightedGraph};
use crate::layout::{initial_positions, Layout};
use anyhow::Result;
use ndarray::Array2;
use rayon::prelude::*;

/// Ideal distances and spring strengths between every node pair
struct Springs {
    length: Array2<f64>,
    strength: Array2<f64>,
}

impl Springs {
    /// Springs from hop distances; unreachable pairs sit one hop beyond the diameter
    fn from_graph(graph: &WeightedGraph) -> Self {
        let n = graph.node_count;
        let rows: Vec<Vec<Option<u32>>> = (0..n)
            .into_par_iter()
            .map(|source| hop_distances(graph, source))
            .collect();

        let diameter = rows
            .iter()
            .flat_map(|row| row.iter().flatten())
            .copied()
            .max()
            .unwrap_or(0)
            .max(1);
        let far = f64::from(diameter + 1);
        let unit = 1.0 / far;

        let mut length = Array2::zeros((n, n));
        let mut strength = Array2::zeros((n, n));
        for (i, row) in rows.iter().enumerate() {
            for (j, d) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                let d = d.map_or(far, f64::from);
                length[[i, j]] = unit * d;
                strength[[i, j]] = 1.0 / (d * d);
            }
        }

        Self { length, strength }
    }
}

const MIN_SEPARATION: f64 = 1e-9;

/// Contribution of node `j` to the energy gradient at node `i`
fn pull(springs: &Springs, positions: &[[f64; 2]], i: usize, j: usize) -> (f64, f64) {
    let dx = positions[i][0] - positions[j][0];
    let dy = positions[i][1] - positions[j][1];
    let dist = (dx * dx + dy * dy).sqrt().max(MIN_SEPARATION);
    let k = springs.strength[[i, j]];
    let l = springs.length[[i, j]];
    (k * (dx - l * dx / dist), k * (dy - l * dy / dist))
}

fn gradient(springs: &Springs, positions: &[[f64; 2]], m: usize) -> (f64, f64) {
    (0..positions.len())
        .filter(|&i| i != m)
        .map(|i| pull(springs, positions, m, i))
        .fold((0.0, 0.0), |acc, g| (acc.0 + g.0, acc.1 + g.1))
}

/// One Newton-Raphson step for node `m` holding every other node fixed
fn newton_step(springs: &Springs, positions: &[[f64; 2]], m: usize, grad: (f64, f64)) -> Option<(f64, f64)> {
    let (mut dxx, mut dyy, mut dxy) = (0.0, 0.0, 0.0);
    for i in 0..positions.len() {
        if i == m {
            continue;
        }
        let dx = positions[m][0] - positions[i][0];
        let dy = positions[m][1] - positions[i][1];
        let dist = (dx * dx + dy * dy).sqrt().max(MIN_SEPARATION);
        let cube = dist * dist * dist;
        let k = springs.strength[[m, i]];
        let l = springs.length[[m, i]];
        dxx += k * (1.0 - l * dy * dy / cube);
        dyy += k * (1.0 - l * dx * dx / cube);
        dxy += k * l * dx * dy / cube;
    }

    let det = dxx * dyy - dxy * dxy;
    if det.abs() < 1e-12 {
        return None;
    }
    let (gx, gy) = grad;
    Some(((gy * dxy - gx * dyy) / det, (gx * dxy - gy * dxx) / det))
}

/// Total spring energy of a configuration
#[cfg(test)]
fn energy(graph: &WeightedGraph, positions: &[[f64; 2]]) -> f64 {
    let springs = Springs::from_graph(graph);
    spring_energy(&springs, positions)
}

fn spring_energy(springs: &Springs, positions: &[[f64; 2]]) -> f64 {
    let n = positions.len();
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = positions[i][0] - positions[j][0];
            let dy = positions[i][1] - positions[j][1];
            let dist = (dx * dx + dy * dy).sqrt();
            let stretch = dist - springs.length[[i, j]];
            total += 0.5 * springs.strength[[i, j]] * stretch * stretch;
        }
    }
    total
}

fn norm(g: (f64, f64)) -> f64 {
    (g.0 * g.0 + g.1 * g.1).sqrt()
}

/// Kamada-Kawai layout of `graph`, optionally seeded with earlier positions
pub fn kamada_kawai(
    graph: &WeightedGraph,
    seed: Option<&Layout>,
    config: &ForceLayoutConfig,
    rng_seed: u64,
) -> Result<Layout> {
    let n = graph.node_count;
    log::info!("Running Kamada-Kawai layout over {} nodes", n);

    if n <= 1 {
        return Ok(Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0]; n]));
    }

    let springs = Springs::from_graph(graph);
    let start = Layout::new(
        graph.node_ids.clone(),
        initial_positions(&graph.node_ids, seed, rng_seed),
    )
    .normalized();
    let mut positions = start.positions;

    let mut gradients: Vec<(f64, f64)> = (0..n)
        .into_par_iter()
        .map(|m| gradient(&springs, &positions, m))
        .collect();

    let initial_energy = spring_energy(&springs, &positions);
    let mut iterations = 0;

    while iterations < config.max_iterations {
        let (m, largest) = gradients
            .iter()
            .enumerate()
            .map(|(i, &g)| (i, norm(g)))
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

        if largest < config.epsilon {
            break;
        }
        iterations += 1;

        // Take m's contribution out of everyone else's gradient
        for i in (0..n).filter(|&i| i != m) {
            let (gx, gy) = pull(&springs, &positions, i, m);
            gradients[i].0 -= gx;
            gradients[i].1 -= gy;
        }

        let mut grad = gradients[m];
        for _ in 0..config.max_inner_iterations {
            if norm(grad) < config.epsilon {
                break;
            }
            match newton_step(&springs, &positions, m, grad) {
                Some((step_x, step_y)) => {
                    positions[m][0] += step_x;
                    positions[m][1] += step_y;
                }
                None => break,
            }
            grad = gradient(&springs, &positions, m);
        }
        gradients[m] = grad;

        for i in (0..n).filter(|&i| i != m) {
            let (gx, gy) = pull(&springs, &positions, i, m);
            gradients[i].0 += gx;
            gradients[i].1 += gy;
        }
    }

    let final_energy = spring_energy(&springs, &positions);
    log::info!(
        "Kamada-Kawai finished after {} iterations (energy {:.4} -> {:.4})",
        iterations,
        initial_energy,
        final_energy
    );
    if iterations >= config.max_iterations {
        log::warn!("Kamada-Kawai stopped at the iteration cap before converging");
    }

    Ok(Layout::new(graph.node_ids.clone(), positions))
}

/// Lay out the spanning tree first, then refine on the full backbone from there
pub fn coarse_to_fine(
    backbone: &Backbone,
    seed: Option<&Layout>,
    config: &ForceLayoutConfig,
    rng_seed: u64,
) -> Result<Layout> {
    if !config.seed_from_spanning_tree {
        return kamada_kawai(&backbone.graph, seed, config, rng_seed);
    }

    log::info!("Seeding backbone layout from the spanning tree layout");
    let coarse = kamada_kawai(&backbone.spanning_tree, seed, config, rng_seed)?;
    kamada_kawai(&backbone.graph, Some(&coarse), config, rng_seed)
}
