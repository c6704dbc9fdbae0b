//! Community statistics and metrics

use crate::graph::WeightedGraph;
use std::collections::HashSet;

/// Newman modularity of a labelling on a weighted undirected graph
pub fn modularity(graph: &WeightedGraph, labels: &[u32]) -> f64 {
    let m = graph.total_weight();
    if m <= 0.0 {
        return 0.0;
    }

    let count = labels.iter().map(|&l| l as usize + 1).max().unwrap_or(0);
    let mut internal = vec![0.0; count];
    let mut totals = vec![0.0; count];

    for node in 0..graph.node_count {
        let c = labels[node] as usize;
        totals[c] += graph.strength(node);
        for (neighbor, w) in graph.weighted_neighbors(node) {
            if labels[neighbor as usize] as usize == c {
                internal[c] += w;
            }
        }
    }

    // Internal edges were visited from both ends
    internal
        .iter()
        .zip(&totals)
        .map(|(&inside, &total)| inside / (2.0 * m) - (total / (2.0 * m)).powi(2))
        .sum()
}

/// Calculate density (actual edges / potential edges)
pub fn calculate_density(graph: &WeightedGraph, members: &[u32]) -> f32 {
    let n = members.len();
    if n <= 1 {
        return 1.0; // By convention, singleton communities have density 1
    }

    // Potential edges = n * (n - 1) / 2 for an undirected graph
    let potential_edges = n * (n - 1) / 2;

    let member_set: HashSet<u32> = members.iter().copied().collect();
    let mut actual_edges = 0;

    for &src in members {
        for &dst in graph.neighbors(src as usize) {
            if src < dst && member_set.contains(&dst) {
                actual_edges += 1;
            }
        }
    }

    actual_edges as f32 / potential_edges as f32
}

/// Members with the highest weighted degree inside the community (top 5)
pub fn identify_central_nodes(graph: &WeightedGraph, members: &[u32]) -> Vec<u32> {
    let member_set: HashSet<u32> = members.iter().copied().collect();

    let mut strengths: Vec<(u32, f64)> = members
        .iter()
        .map(|&node| {
            let internal: f64 = graph
                .weighted_neighbors(node as usize)
                .filter(|(neighbor, _)| member_set.contains(neighbor))
                .map(|(_, w)| w)
                .sum();
            (node, internal)
        })
        .collect();

    // Sort by strength (highest first), lowest index on ties
    strengths.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    strengths.iter().take(5).map(|&(node, _)| node).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;

    fn square_with_diagonal() -> WeightedGraph {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("a", "b", 1.0);
        builder.add_edge("b", "c", 1.0);
        builder.add_edge("c", "d", 1.0);
        builder.add_edge("d", "a", 1.0);
        builder.add_edge("a", "c", 2.0);
        builder.build().unwrap()
    }

    #[test]
    fn single_community_has_zero_modularity() {
        let graph = square_with_diagonal();
        assert!(modularity(&graph, &[0, 0, 0, 0]).abs() < 1e-12);
    }

    #[test]
    fn density_counts_undirected_edges() {
        let graph = square_with_diagonal();
        assert_eq!(calculate_density(&graph, &[0, 1, 2, 3]), 5.0 / 6.0);
        assert_eq!(calculate_density(&graph, &[0, 2]), 1.0);
        assert_eq!(calculate_density(&graph, &[1, 3]), 0.0);
        assert_eq!(calculate_density(&graph, &[1]), 1.0);
    }

    #[test]
    fn central_nodes_follow_internal_strength() {
        let graph = square_with_diagonal();
        // a and c carry the heavy diagonal
        assert_eq!(identify_central_nodes(&graph, &[0, 1, 2, 3]), vec![0, 2, 1, 3]);
    }
}
