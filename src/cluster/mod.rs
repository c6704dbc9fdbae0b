//! Community analysis module

pub mod detection;
pub mod metrics;

use serde::{Deserialize, Serialize};

/// A detected community of products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    /// Community id; 0 is the largest community
    pub id: u32,

    /// Members of this community (node indices)
    pub members: Vec<u32>,

    /// Size of the community
    pub size: usize,

    /// Density: internal edges / potential internal edges
    pub density: f32,

    /// Members with the highest weighted degree inside the community
    pub central_nodes: Vec<u32>,
}

/// Node-to-community assignment together with the community records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    /// Community id of each node
    pub labels: Vec<u32>,

    /// Communities sorted by size, largest first
    pub communities: Vec<Community>,

    /// Modularity of the assignment on the partitioned graph
    pub modularity: f64,
}

impl Partition {
    pub fn community_count(&self) -> usize {
        self.communities.len()
    }

    pub fn label_of(&self, node: usize) -> u32 {
        self.labels[node]
    }
}
