//! Community detection by Louvain modularity optimisation

use crate::cluster::metrics::{calculate_density, identify_central_nodes, modularity};
use crate::cluster::{Community, Partition};
use crate::graph::WeightedGraph;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;

/// Weighted graph at one aggregation level of the Louvain hierarchy
struct Level {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
}

impl Level {
    fn from_graph(graph: &WeightedGraph) -> Self {
        let adjacency = (0..graph.node_count)
            .map(|node| {
                graph
                    .weighted_neighbors(node)
                    .map(|(n, w)| (n as usize, w))
                    .collect()
            })
            .collect();
        Self {
            adjacency,
            self_loops: vec![0.0; graph.node_count],
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Weighted degree, self loops counted twice
    fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[node]
    }

    fn total_weight(&self) -> f64 {
        let links: f64 = self
            .adjacency
            .iter()
            .flat_map(|list| list.iter().map(|&(_, w)| w))
            .sum();
        links / 2.0 + self.self_loops.iter().sum::<f64>()
    }

    /// Collapse every community into a single node
    fn aggregate(&self, community: &[usize], community_count: usize) -> Level {
        let mut links: Vec<HashMap<usize, f64>> = vec![HashMap::new(); community_count];
        let mut self_loops = vec![0.0; community_count];

        for node in 0..self.len() {
            let c = community[node];
            self_loops[c] += self.self_loops[node];
            for &(neighbor, w) in &self.adjacency[node] {
                let d = community[neighbor];
                if c == d {
                    // Each internal edge is seen from both ends
                    self_loops[c] += w / 2.0;
                } else {
                    *links[c].entry(d).or_insert(0.0) += w;
                }
            }
        }

        let adjacency = links
            .into_iter()
            .map(|map| {
                let mut list: Vec<(usize, f64)> = map.into_iter().collect();
                list.sort_unstable_by_key(|&(n, _)| n);
                list
            })
            .collect();

        Level {
            adjacency,
            self_loops,
        }
    }
}

/// Move single nodes between communities until no move improves modularity.
///
/// Returns the dense community index of every node and whether anything moved.
fn local_moving(level: &Level, rng: &mut StdRng) -> (Vec<usize>, usize, bool) {
    let n = level.len();
    let m2 = 2.0 * level.total_weight();
    let mut community: Vec<usize> = (0..n).collect();
    let degrees: Vec<f64> = (0..n).map(|i| level.degree(i)).collect();
    let mut totals = degrees.clone();
    let mut moved_any = false;

    if m2 > 0.0 {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut links: HashMap<usize, f64> = HashMap::new();
        loop {
            let mut moved = false;
            for &node in &order {
                let current = community[node];
                let k = degrees[node];
                totals[current] -= k;

                links.clear();
                links.insert(current, 0.0);
                for &(neighbor, w) in &level.adjacency[node] {
                    *links.entry(community[neighbor]).or_insert(0.0) += w;
                }

                let gain = |c: usize, link: f64| link - totals[c] * k / m2;
                let mut best = current;
                let mut best_gain = gain(current, links[&current]);

                let mut candidates: Vec<(usize, f64)> = links.iter().map(|(&c, &l)| (c, l)).collect();
                candidates.sort_unstable_by_key(|&(c, _)| c);
                for (c, link) in candidates {
                    let g = gain(c, link);
                    if g > best_gain + 1e-12 {
                        best = c;
                        best_gain = g;
                    }
                }

                totals[best] += k;
                community[node] = best;
                if best != current {
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }
    }

    // Renumber communities densely in order of first appearance
    let mut renumber: HashMap<usize, usize> = HashMap::new();
    for c in community.iter_mut() {
        let next = renumber.len();
        *c = *renumber.entry(*c).or_insert(next);
    }

    (community, renumber.len(), moved_any)
}

/// Louvain community labels for every node of `graph`
pub fn louvain(graph: &WeightedGraph, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels: Vec<usize> = (0..graph.node_count).collect();
    let mut level = Level::from_graph(graph);
    let mut depth = 0;

    loop {
        let (community, count, moved) = local_moving(&level, &mut rng);
        depth += 1;
        log::debug!(
            "Louvain level {}: {} nodes -> {} communities",
            depth,
            level.len(),
            count
        );

        for label in labels.iter_mut() {
            *label = community[*label];
        }

        if !moved || count == level.len() {
            break;
        }
        level = level.aggregate(&community, count);
    }

    relabel_by_size(&labels)
}

/// Relabel so that community 0 is the largest; ties go to the lowest member
fn relabel_by_size(labels: &[usize]) -> Vec<u32> {
    let mut groups: HashMap<usize, (usize, usize)> = HashMap::new();
    for (node, &label) in labels.iter().enumerate() {
        let entry = groups.entry(label).or_insert((0, node));
        entry.0 += 1;
    }

    let mut order: Vec<(usize, usize, usize)> = groups
        .into_iter()
        .map(|(label, (size, first))| (label, size, first))
        .collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let new_id: HashMap<usize, u32> = order
        .iter()
        .enumerate()
        .map(|(id, &(label, _, _))| (label, id as u32))
        .collect();

    labels.iter().map(|l| new_id[l]).collect()
}

/// Build community records from a total node labelling
pub fn communities_from_labels(graph: &WeightedGraph, labels: &[u32]) -> Vec<Community> {
    let count = labels.iter().map(|&l| l as usize + 1).max().unwrap_or(0);
    let mut members: Vec<Vec<u32>> = vec![Vec::new(); count];
    for (node, &label) in labels.iter().enumerate() {
        members[label as usize].push(node as u32);
    }

    let mut communities: Vec<Community> = members
        .into_par_iter()
        .enumerate()
        .filter(|(_, members)| !members.is_empty())
        .map(|(id, members)| {
            let density = calculate_density(graph, &members);
            let central_nodes = identify_central_nodes(graph, &members);
            Community {
                id: id as u32,
                size: members.len(),
                members,
                density,
                central_nodes,
            }
        })
        .collect();

    communities.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));
    communities
}

/// Partition the graph into modularity communities
pub fn detect_communities(graph: &WeightedGraph, seed: u64) -> Result<Partition> {
    log::info!(
        "Detecting communities over {} nodes and {} edges",
        graph.node_count,
        graph.edge_count()
    );

    let labels = louvain(graph, seed);
    let communities = communities_from_labels(graph, &labels);
    let q = modularity(graph, &labels);

    log::info!(
        "Found {} communities (modularity {:.4})",
        communities.len(),
        q
    );

    Ok(Partition {
        labels,
        communities,
        modularity: q,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;

    /// Two 4-cliques joined by one weak bridge
    fn barbell() -> WeightedGraph {
        let mut builder = GraphBuilder::with_capacity(8);
        for group in [["a", "b", "c", "d"], ["e", "f", "g", "h"]] {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    builder.add_edge(group[i], group[j], 0.9);
                }
            }
        }
        builder.add_edge("d", "e", 0.1);
        builder.build().unwrap()
    }

    #[test]
    fn barbell_splits_into_its_cliques() {
        let graph = barbell();
        let partition = detect_communities(&graph, 1).unwrap();

        assert_eq!(partition.community_count(), 2);
        let labels = &partition.labels;
        assert!(labels[0..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..8].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
        assert!(partition.modularity > 0.4);
    }

    #[test]
    fn every_node_is_assigned() {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("a", "b", 0.5);
        builder.get_or_create_node("lonely");
        let graph = builder.build().unwrap();

        let partition = detect_communities(&graph, 3).unwrap();
        assert_eq!(partition.labels.len(), graph.node_count);
        let total: usize = partition.communities.iter().map(|c| c.size).sum();
        assert_eq!(total, graph.node_count);
        assert_eq!(partition.communities[0].size, 2);
    }

    #[test]
    fn edgeless_graph_gives_singletons() {
        let mut builder = GraphBuilder::with_capacity(3);
        for id in ["x", "y", "z"] {
            builder.get_or_create_node(id);
        }
        let graph = builder.build().unwrap();

        let labels = louvain(&graph, 0);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn labels_are_ordered_by_size() {
        assert_eq!(relabel_by_size(&[7, 3, 3, 7, 3, 9]), vec![1, 0, 0, 1, 0, 2]);
    }
}
