//! Backbone extraction: maximum spanning tree united with the high-proximity edges

use crate::graph::algorithms::connected_components;
use crate::graph::builder::GraphBuilder;
use crate::graph::WeightedGraph;
use anyhow::Result;
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which selection an edge of the backbone came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    SpanningTree,
    Threshold,
    Both,
}

impl EdgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSource::SpanningTree => "spanning_tree",
            EdgeSource::Threshold => "threshold",
            EdgeSource::Both => "both",
        }
    }

    pub fn in_spanning_tree(&self) -> bool {
        matches!(self, EdgeSource::SpanningTree | EdgeSource::Both)
    }
}

/// An edge of the backbone, `a < b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackboneEdge {
    pub a: u32,
    pub b: u32,
    pub weight: f64,
    pub source: EdgeSource,
}

/// Sparse informative subgraph of the proximity graph
#[derive(Debug, Clone)]
pub struct Backbone {
    /// The union graph
    pub graph: WeightedGraph,

    /// The spanning tree alone, over the same node indices
    pub spanning_tree: WeightedGraph,

    /// Backbone edges with provenance, sorted by (a, b)
    pub edges: Vec<BackboneEdge>,

    /// Threshold used for the high-proximity selection
    pub threshold: f64,

    /// Connected components of the input graph (1 for connected input)
    pub components: usize,
}

impl Backbone {
    pub fn spanning_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.source.in_spanning_tree()).count()
    }

    pub fn threshold_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| matches!(e.source, EdgeSource::Threshold | EdgeSource::Both))
            .count()
    }

    /// Provenance of the edge between two nodes
    pub fn source_of(&self, a: u32, b: u32) -> Option<EdgeSource> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.edges
            .binary_search_by(|e| (e.a, e.b).cmp(&key))
            .ok()
            .map(|pos| self.edges[pos].source)
    }
}

/// Maximum-proximity spanning tree (a forest when the input is disconnected).
///
/// Runs Kruskal on distance = 1 - proximity; returned weights are the
/// original proximities.
pub fn maximum_spanning_tree(graph: &WeightedGraph) -> Vec<(u32, u32, f64)> {
    let mut distances: UnGraph<u32, f64> =
        UnGraph::with_capacity(graph.node_count, graph.edge_count());

    for node in 0..graph.node_count {
        distances.add_node(node as u32);
    }
    for (a, b, proximity) in graph.undirected_edges() {
        distances.add_edge(
            NodeIndex::new(a as usize),
            NodeIndex::new(b as usize),
            1.0 - proximity,
        );
    }

    min_spanning_tree(&distances)
        .filter_map(|element| match element {
            Element::Edge { source, target, .. } => {
                let (a, b) = if source < target {
                    (source as u32, target as u32)
                } else {
                    (target as u32, source as u32)
                };
                graph.edge_weight(a as usize, b).map(|w| (a, b, w))
            }
            Element::Node { .. } => None,
        })
        .collect()
}

/// Edges whose proximity strictly exceeds `threshold`.
///
/// The comparison is strict, so at threshold 0 an edge of proximity exactly 0
/// is not selected; it reaches the backbone only through the spanning tree.
/// Any negative threshold selects every edge.
pub fn threshold_edges(graph: &WeightedGraph, threshold: f64) -> Vec<(u32, u32, f64)> {
    graph
        .undirected_edges()
        .filter(|&(_, _, proximity)| proximity > threshold)
        .collect()
}

/// Mean of the values present; `None` when neither side contributes
fn combined_weight(tree: Option<f64>, threshold: Option<f64>) -> Option<f64> {
    match (tree, threshold) {
        (Some(t), Some(h)) => Some((t + h) / 2.0),
        (Some(w), None) | (None, Some(w)) => Some(w),
        (None, None) => None,
    }
}

/// Extract the backbone of a deduplicated, loop-free proximity graph
pub fn extract_backbone(graph: &WeightedGraph, threshold: f64) -> Result<Backbone> {
    log::info!(
        "Extracting backbone from {} nodes / {} edges with threshold {}",
        graph.node_count,
        graph.edge_count(),
        threshold
    );

    let components = connected_components(graph).len();
    if components > 1 {
        log::warn!(
            "Proximity graph has {} components; the spanning tree is a forest",
            components
        );
    }

    let tree = maximum_spanning_tree(graph);
    let above = threshold_edges(graph, threshold);
    log::info!(
        "Spanning tree has {} edges, {} edges exceed the threshold",
        tree.len(),
        above.len()
    );

    let mut contributions: BTreeMap<(u32, u32), (Option<f64>, Option<f64>)> = BTreeMap::new();
    for &(a, b, w) in &tree {
        contributions.entry((a, b)).or_default().0 = Some(w);
    }
    for &(a, b, w) in &above {
        contributions.entry((a, b)).or_default().1 = Some(w);
    }

    let mut edges = Vec::with_capacity(contributions.len());
    for ((a, b), (from_tree, from_threshold)) in contributions {
        let source = match (from_tree.is_some(), from_threshold.is_some()) {
            (true, true) => EdgeSource::Both,
            (true, false) => EdgeSource::SpanningTree,
            _ => EdgeSource::Threshold,
        };
        if let Some(weight) = combined_weight(from_tree, from_threshold) {
            edges.push(BackboneEdge { a, b, weight, source });
        }
    }

    let mut union_builder = GraphBuilder::with_nodes(&graph.node_ids);
    let mut tree_builder = GraphBuilder::with_nodes(&graph.node_ids);
    for edge in &edges {
        union_builder.add_edge_by_index(edge.a, edge.b, edge.weight);
        if edge.source.in_spanning_tree() {
            tree_builder.add_edge_by_index(edge.a, edge.b, edge.weight);
        }
    }

    let backbone = Backbone {
        graph: union_builder.build()?,
        spanning_tree: tree_builder.build()?,
        edges,
        threshold,
        components,
    };

    log::info!(
        "Backbone has {} edges ({} from the spanning tree, {} above threshold)",
        backbone.graph.edge_count(),
        backbone.spanning_edge_count(),
        backbone.threshold_edge_count()
    );

    Ok(backbone)
}
