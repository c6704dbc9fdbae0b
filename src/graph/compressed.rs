//! Memory-efficient weighted graph representation

use serde::{Deserialize, Serialize};
use std::mem;

/// Compressed sparse representation of an undirected weighted graph.
///
/// Every undirected edge is stored twice, once in each endpoint's adjacency
/// range, so neighbor iteration needs no reverse lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// Offset array: index where each node's edges begin
    /// offsets[i] to offsets[i+1] defines the edge range for node i
    pub offsets: Vec<u32>,

    /// Edge array: concatenated, sorted lists of neighbor nodes
    pub edges: Vec<u32>,

    /// Weight of each entry of `edges`
    pub weights: Vec<f64>,

    /// Mapping from internal node ids to product codes
    pub node_ids: Vec<String>,
}

impl WeightedGraph {
    /// Neighbors of a node
    pub fn neighbors(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.edges[start..end]
    }

    /// Weights aligned with `neighbors(node)`
    pub fn neighbor_weights(&self, node: usize) -> &[f64] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.weights[start..end]
    }

    /// Neighbors with their edge weights
    pub fn weighted_neighbors(&self, node: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.neighbors(node)
            .iter()
            .copied()
            .zip(self.neighbor_weights(node).iter().copied())
    }

    /// Weight of the edge between `a` and `b`, if any
    pub fn edge_weight(&self, a: usize, b: u32) -> Option<f64> {
        let neighbors = self.neighbors(a);
        neighbors
            .binary_search(&b)
            .ok()
            .map(|pos| self.neighbor_weights(a)[pos])
    }

    /// Check if there's an edge between a and b
    pub fn has_edge(&self, a: usize, b: u32) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Get the degree of a node
    pub fn degree(&self, node: usize) -> usize {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        end - start
    }

    /// Sum of the weights of a node's edges
    pub fn strength(&self, node: usize) -> f64 {
        self.neighbor_weights(node).iter().sum()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len() / 2
    }

    /// Each undirected edge once, as `(a, b, weight)` with `a < b`
    pub fn undirected_edges(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        (0..self.node_count).flat_map(move |a| {
            self.weighted_neighbors(a)
                .filter(move |&(b, _)| (a as u32) < b)
                .map(move |(b, w)| (a as u32, b, w))
        })
    }

    /// Total edge weight, each undirected edge counted once
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum::<f64>() / 2.0
    }

    /// Product code of a node
    pub fn node_id(&self, node: usize) -> &str {
        &self.node_ids[node]
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let edges = self.edges.capacity() * mem::size_of::<u32>();
        let weights = self.weights.capacity() * mem::size_of::<f64>();
        let ids = self.node_ids.iter().map(|s| s.capacity()).sum::<usize>();

        base + offsets + edges + weights + ids
    }
}
