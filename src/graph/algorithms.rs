//! Graph algorithms for analysis

use crate::graph::WeightedGraph;
use std::collections::HashMap;

/// Union-Find data structure for connected component analysis
pub struct DisjointSets {
    /// Parent pointers (parent[i] = parent of node i)
    parent: Vec<u32>,

    /// Size of each set (for union by size)
    size: Vec<u32>,
}

impl DisjointSets {
    /// Create a new DisjointSets data structure
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            size: vec![1; size],
        }
    }

    /// Find the root of the set containing x with path compression
    pub fn find(&mut self, x: u32) -> u32 {
        let px = self.parent[x as usize];
        if px != x {
            // Path compression: set parent to root
            self.parent[x as usize] = self.find(px);
        }
        self.parent[x as usize]
    }

    /// Union the sets containing x and y; returns false if already joined
    pub fn union(&mut self, x: u32, y: u32) -> bool {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return false;
        }

        // Attach smaller tree under root of larger tree
        let size_x = self.size[root_x as usize];
        let size_y = self.size[root_y as usize];

        if size_x > size_y {
            self.parent[root_y as usize] = root_x;
            self.size[root_x as usize] += size_y;
        } else {
            self.parent[root_x as usize] = root_y;
            self.size[root_y as usize] += size_x;
        }
        true
    }

    /// Get the size of the set containing x
    pub fn size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.size[root as usize]
    }
}

/// Group nodes by connected component, largest component first
pub fn connected_components(graph: &WeightedGraph) -> Vec<Vec<u32>> {
    let mut sets = DisjointSets::new(graph.node_count);
    for (a, b, _) in graph.undirected_edges() {
        sets.union(a, b);
    }

    let mut by_root: HashMap<u32, Vec<u32>> = HashMap::new();
    for node in 0..graph.node_count as u32 {
        let root = sets.find(node);
        by_root.entry(root).or_default().push(node);
    }

    let mut components: Vec<Vec<u32>> = by_root.into_values().collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    components
}

/// True when every node is reachable from every other (vacuously for n <= 1)
pub fn is_connected(graph: &WeightedGraph) -> bool {
    if graph.node_count <= 1 {
        return true;
    }
    let mut sets = DisjointSets::new(graph.node_count);
    for (a, b, _) in graph.undirected_edges() {
        sets.union(a, b);
    }
    sets.size(0) as usize == graph.node_count
}

/// Hop distances from `source` to every node (`None` when unreachable)
pub fn hop_distances(graph: &WeightedGraph, source: usize) -> Vec<Option<u32>> {
    let mut distances = vec![None; graph.node_count];
    let mut queue = std::collections::VecDeque::new();

    distances[source] = Some(0);
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        let next = distances[node].map_or(0, |d| d + 1);
        for &neighbor in graph.neighbors(node) {
            let neighbor = neighbor as usize;
            if distances[neighbor].is_none() {
                distances[neighbor] = Some(next);
                queue.push_back(neighbor);
            }
        }
    }

    distances
}
