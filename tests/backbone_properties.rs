//! Property tests for backbone extraction over random complete proximity graphs.
//!
//! Weights are distinct so the maximum spanning tree is unique.

use product_space::data::preprocessing::deduplicate_edges;
use product_space::data::ProximityEdge;
use product_space::graph::algorithms::is_connected;
use product_space::graph::builder::build_proximity_graph;
use product_space::graph::{extract_backbone, Backbone, EdgeSource, WeightedGraph};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{:04}", i)).collect()
}

/// Complete graph on `n` nodes with weights drawn from a shuffled ladder in (0, 1)
fn complete_graph() -> impl Strategy<Value = (Vec<String>, Vec<ProximityEdge>)> {
    (3usize..9).prop_flat_map(|n| {
        let m = n * (n - 1) / 2;
        let ladder: Vec<f64> = (1..=m).map(|k| k as f64 / (m + 1) as f64).collect();
        Just(ladder).prop_shuffle().prop_map(move |weights| {
            let ids = ids(n);
            let mut edges = Vec::with_capacity(m);
            let mut w = weights.into_iter();
            for i in 0..n {
                for j in (i + 1)..n {
                    if let Some(p) = w.next() {
                        edges.push(ProximityEdge::new(ids[i].clone(), ids[j].clone(), p));
                    }
                }
            }
            (ids, edges)
        })
    })
}

fn backbone_of(ids: &[String], edges: &[ProximityEdge], threshold: f64) -> (WeightedGraph, Backbone) {
    let graph = build_proximity_graph(ids, edges).unwrap();
    let backbone = extract_backbone(&graph, threshold).unwrap();
    (graph, backbone)
}

fn pairs(backbone: &Backbone) -> BTreeSet<(u32, u32)> {
    backbone.edges.iter().map(|e| (e.a, e.b)).collect()
}

proptest! {
    #[test]
    fn backbone_of_connected_input_is_connected(
        (ids, edges) in complete_graph(),
        threshold in 0.0f64..1.0,
    ) {
        let (_, backbone) = backbone_of(&ids, &edges, threshold);
        prop_assert!(is_connected(&backbone.graph));
        prop_assert_eq!(backbone.spanning_edge_count(), ids.len() - 1);
    }

    #[test]
    fn backbone_has_no_loops_or_parallel_edges(
        (ids, edges) in complete_graph(),
        threshold in 0.0f64..1.0,
    ) {
        let (_, backbone) = backbone_of(&ids, &edges, threshold);
        let graph = &backbone.graph;
        for node in 0..graph.node_count {
            let neighbors = graph.neighbors(node);
            prop_assert!(neighbors.iter().all(|&n| n as usize != node));
            prop_assert!(neighbors.windows(2).all(|w| w[0] < w[1]));
        }
        prop_assert_eq!(graph.edge_count(), backbone.edges.len());
    }

    #[test]
    fn raising_the_threshold_only_removes_edges(
        (ids, edges) in complete_graph(),
        low in 0.0f64..1.0,
        delta in 0.0f64..1.0,
    ) {
        let high = low + delta;
        let (_, loose) = backbone_of(&ids, &edges, low);
        let (_, strict) = backbone_of(&ids, &edges, high);

        prop_assert!(strict.threshold_edge_count() <= loose.threshold_edge_count());
        prop_assert!(pairs(&strict).is_subset(&pairs(&loose)));
    }

    #[test]
    fn weights_are_the_source_proximities(
        (ids, edges) in complete_graph(),
        threshold in 0.0f64..1.0,
    ) {
        let (graph, backbone) = backbone_of(&ids, &edges, threshold);
        for edge in &backbone.edges {
            let original = graph.edge_weight(edge.a as usize, edge.b);
            prop_assert_eq!(Some(edge.weight), original);
            match edge.source {
                EdgeSource::Threshold | EdgeSource::Both => prop_assert!(edge.weight > threshold),
                EdgeSource::SpanningTree => prop_assert!(edge.weight <= threshold),
            }
        }
    }

    #[test]
    fn extraction_is_idempotent(
        (ids, edges) in complete_graph(),
        threshold in 0.0f64..1.0,
    ) {
        let (_, first) = backbone_of(&ids, &edges, threshold);
        let retained: Vec<ProximityEdge> = first
            .edges
            .iter()
            .map(|e| ProximityEdge::new(ids[e.a as usize].clone(), ids[e.b as usize].clone(), e.weight))
            .collect();

        let (_, second) = backbone_of(&ids, &deduplicate_edges(&retained), threshold);
        prop_assert_eq!(first.graph.node_count, second.graph.node_count);
        prop_assert_eq!(&first.graph.node_ids, &second.graph.node_ids);
        prop_assert_eq!(&first.edges, &second.edges);
    }
}

#[test]
fn three_product_scenario() {
    let ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let edges = vec![
        ProximityEdge::new("A", "B", 0.9),
        ProximityEdge::new("B", "C", 0.6),
        ProximityEdge::new("A", "C", 0.1),
    ];
    let (_, backbone) = backbone_of(&ids, &edges, 0.55);

    assert_eq!(pairs(&backbone), BTreeSet::from([(0, 1), (1, 2)]));
    assert_eq!(backbone.source_of(0, 1), Some(EdgeSource::Both));
    assert_eq!(backbone.source_of(2, 1), Some(EdgeSource::Both));
    assert_eq!(backbone.source_of(0, 2), None);
}

#[test]
fn duplicates_and_self_pairs_are_cleaned_before_extraction() {
    let ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let raw = vec![
        ProximityEdge::new("A", "B", 0.9),
        ProximityEdge::new("B", "A", 0.2),
        ProximityEdge::new("A", "A", 1.0),
        ProximityEdge::new("B", "C", 0.3),
    ];
    let (_, backbone) = backbone_of(&ids, &deduplicate_edges(&raw), 0.55);

    assert_eq!(backbone.edges.len(), 2);
    assert_eq!(backbone.graph.edge_weight(0, 1), Some(0.9));
    assert_eq!(backbone.source_of(1, 2), Some(EdgeSource::SpanningTree));
}
