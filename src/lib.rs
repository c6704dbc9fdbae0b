//! Core library functions for the product space pipeline

pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod storage;
pub mod viz;

pub use anyhow::{anyhow, Result};
