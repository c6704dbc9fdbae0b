//! Node coordinate assignment

pub mod force;
pub mod umap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 2-D coordinates per node, aligned with the graph's node order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Product code of each positioned node
    pub node_ids: Vec<String>,

    /// (x, y) of each node
    pub positions: Vec<[f64; 2]>,
}

impl Layout {
    pub fn new(node_ids: Vec<String>, positions: Vec<[f64; 2]>) -> Self {
        debug_assert_eq!(node_ids.len(), positions.len());
        Self { node_ids, positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Lookup table from product code to position
    pub fn by_id(&self) -> HashMap<&str, [f64; 2]> {
        self.node_ids
            .iter()
            .map(String::as_str)
            .zip(self.positions.iter().copied())
            .collect()
    }

    /// Axis-aligned bounds as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.positions.first()?;
        let mut bounds = (first[0], first[1], first[0], first[1]);
        for p in &self.positions {
            bounds.0 = bounds.0.min(p[0]);
            bounds.1 = bounds.1.min(p[1]);
            bounds.2 = bounds.2.max(p[0]);
            bounds.3 = bounds.3.max(p[1]);
        }
        Some(bounds)
    }

    /// Rescale into the unit square, preserving aspect ratio and centering
    pub fn normalized(&self) -> Layout {
        let (min_x, min_y, max_x, max_y) = match self.bounds() {
            Some(bounds) => bounds,
            None => return self.clone(),
        };
        let span = (max_x - min_x).max(max_y - min_y);
        let scale = if span > 0.0 { 1.0 / span } else { 1.0 };
        let offset_x = (1.0 - (max_x - min_x) * scale) / 2.0;
        let offset_y = (1.0 - (max_y - min_y) * scale) / 2.0;

        let positions = self
            .positions
            .iter()
            .map(|p| {
                [
                    (p[0] - min_x) * scale + offset_x,
                    (p[1] - min_y) * scale + offset_y,
                ]
            })
            .collect();

        Layout::new(self.node_ids.clone(), positions)
    }
}

/// Starting positions for `node_ids`: taken from `seed` where the node is
/// present there, otherwise drawn uniformly from the seed's bounding box
/// (or the unit square) with a seeded generator.
pub fn initial_positions(node_ids: &[String], seed: Option<&Layout>, rng_seed: u64) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(rng_seed);
    let known = seed.map(Layout::by_id).unwrap_or_default();
    let (min_x, min_y, max_x, max_y) = seed
        .and_then(Layout::bounds)
        .filter(|b| b.2 > b.0 && b.3 > b.1)
        .unwrap_or((0.0, 0.0, 1.0, 1.0));

    let mut reused = 0usize;
    let positions = node_ids
        .iter()
        .map(|id| match known.get(id.as_str()) {
            Some(&p) => {
                reused += 1;
                p
            }
            None => [rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y)],
        })
        .collect();

    if seed.is_some() {
        log::debug!("Seeded {} of {} node positions", reused, node_ids.len());
    }
    positions
}
