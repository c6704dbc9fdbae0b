//! Graph representation and algorithms module

pub mod algorithms;
pub mod backbone;
pub mod builder;
pub mod compressed;

pub use backbone::{extract_backbone, Backbone, BackboneEdge, EdgeSource};
pub use compressed::WeightedGraph;
