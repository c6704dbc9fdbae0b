//! Graph construction module

use crate::data::ProximityEdge;
use crate::graph::WeightedGraph;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// Builder for incrementally constructing a WeightedGraph
pub struct GraphBuilder {
    /// Number of nodes
    node_count: usize,

    /// Mapping from product codes to node indices
    id_to_index: HashMap<String, u32>,

    /// Node product codes
    node_ids: Vec<String>,

    /// Adjacency lists for each node, with weights
    adjacency_lists: Vec<Vec<(u32, f64)>>,

    /// Undirected pairs already added, as (min, max)
    seen_pairs: HashSet<(u32, u32)>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            node_count: 0,
            id_to_index: HashMap::with_capacity(capacity),
            node_ids: Vec::with_capacity(capacity),
            adjacency_lists: Vec::with_capacity(capacity),
            seen_pairs: HashSet::new(),
        }
    }

    /// Builder whose node order follows `node_ids`
    pub fn with_nodes(node_ids: &[String]) -> Self {
        let mut builder = Self::with_capacity(node_ids.len());
        for id in node_ids {
            builder.get_or_create_node(id);
        }
        builder
    }

    /// Get or create a node index for the given product code
    pub fn get_or_create_node(&mut self, id: &str) -> u32 {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }

        let idx = self.node_count as u32;
        self.id_to_index.insert(id.to_string(), idx);
        self.node_ids.push(id.to_string());
        self.adjacency_lists.push(Vec::new());
        self.node_count += 1;

        idx
    }

    /// Add an undirected edge by product code.
    ///
    /// Self pairs and pairs already present are ignored; returns whether the
    /// edge was added.
    pub fn add_edge(&mut self, a_id: &str, b_id: &str, weight: f64) -> bool {
        let a = self.get_or_create_node(a_id);
        let b = self.get_or_create_node(b_id);
        self.add_edge_by_index(a, b, weight)
    }

    /// Add an undirected edge between existing node indices
    pub fn add_edge_by_index(&mut self, a: u32, b: u32, weight: f64) -> bool {
        if a == b {
            return false;
        }

        let key = if a < b { (a, b) } else { (b, a) };
        if !self.seen_pairs.insert(key) {
            return false;
        }

        self.adjacency_lists[a as usize].push((b, weight));
        self.adjacency_lists[b as usize].push((a, weight));
        true
    }

    /// Build the compressed graph
    pub fn build(mut self) -> Result<WeightedGraph> {
        let entry_count: usize = self.adjacency_lists.iter().map(|list| list.len()).sum();
        if entry_count > u32::MAX as usize {
            anyhow::bail!("graph too large: {} adjacency entries", entry_count);
        }

        // Create offsets array
        let mut offsets = Vec::with_capacity(self.node_count + 1);
        offsets.push(0);

        let mut offset = 0;
        for list in &self.adjacency_lists {
            offset += list.len() as u32;
            offsets.push(offset);
        }

        // Create edge and weight arrays
        let mut edges = Vec::with_capacity(entry_count);
        let mut weights = Vec::with_capacity(entry_count);
        for list in &mut self.adjacency_lists {
            // Sort for binary search efficiency
            list.sort_unstable_by_key(|&(neighbor, _)| neighbor);
            for &(neighbor, weight) in list.iter() {
                edges.push(neighbor);
                weights.push(weight);
            }
        }

        Ok(WeightedGraph {
            node_count: self.node_count,
            offsets,
            edges,
            weights,
            node_ids: self.node_ids,
        })
    }
}

/// Build the complete proximity graph over `node_ids` from deduplicated edges
pub fn build_proximity_graph(node_ids: &[String], edges: &[ProximityEdge]) -> Result<WeightedGraph> {
    log::info!(
        "Building proximity graph from {} edges over {} products",
        edges.len(),
        node_ids.len()
    );

    let mut builder = GraphBuilder::with_nodes(node_ids);
    for edge in edges {
        builder.add_edge(&edge.product_a, &edge.product_b, edge.proximity);
    }

    let graph = builder.build()?;
    log::info!(
        "Proximity graph has {} nodes and {} edges ({} bytes)",
        graph.node_count,
        graph.edge_count(),
        graph.memory_usage()
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_first_weight_and_skips_loops() {
        let mut builder = GraphBuilder::with_capacity(3);
        assert!(builder.add_edge("A", "B", 0.9));
        assert!(!builder.add_edge("B", "A", 0.1));
        assert!(!builder.add_edge("C", "C", 1.0));
        assert!(builder.add_edge("C", "A", 0.3));

        let graph = builder.build().unwrap();
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edge_weight(0, 1), Some(0.9));
        assert_eq!(graph.edge_weight(1, 0), Some(0.9));
        assert_eq!(graph.edge_weight(2, 0), Some(0.3));
        assert!(!graph.has_edge(2, 2));
        assert_eq!(graph.neighbors(0), &[1, 2]);
    }

    #[test]
    fn node_order_follows_given_ids() {
        let ids = vec!["Z".to_string(), "Y".to_string(), "X".to_string()];
        let edges = vec![ProximityEdge::new("X", "Z", 0.4)];

        let graph = build_proximity_graph(&ids, &edges).unwrap();
        assert_eq!(graph.node_ids, ids);
        assert_eq!(graph.degree(1), 0);
        assert_eq!(graph.edge_weight(0, 2), Some(0.4));
        assert_eq!(graph.undirected_edges().collect::<Vec<_>>(), vec![(0, 2, 0.4)]);
    }
}
