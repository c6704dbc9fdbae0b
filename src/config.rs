//! Configuration management for the product space pipeline

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A flat input table, optionally backed by a download URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSource {
    /// Local path of the table
    pub path: PathBuf,

    /// Where to fetch the table from when `path` does not exist
    #[serde(default)]
    pub url: Option<String>,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>, url: Option<String>) -> Self {
        Self { path: path.into(), url }
    }
}

/// Column names of the proximity table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityColumns {
    pub product_a: String,
    pub product_b: String,
    pub proximity: String,
}

impl Default for ProximityColumns {
    fn default() -> Self {
        Self {
            product_a: "product_a".to_string(),
            product_b: "product_b".to_string(),
            proximity: "proximity".to_string(),
        }
    }
}

/// Column names of the product metadata table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductColumns {
    pub code: String,
    pub name: String,
    /// Product complexity index, used for node size
    pub pci: Option<String>,
    pub export_value: Option<String>,
    /// Grouping used by the treemap
    pub category: Option<String>,
}

impl Default for ProductColumns {
    fn default() -> Self {
        Self {
            code: "code".to_string(),
            name: "name".to_string(),
            pci: Some("pci".to_string()),
            export_value: None,
            category: None,
        }
    }
}

/// Column names of the country export table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportColumns {
    pub location: String,
    pub product: String,
    pub export_value: String,
    pub rca: String,
}

impl Default for ExportColumns {
    fn default() -> Self {
        Self {
            location: "location_code".to_string(),
            product: "product_code".to_string(),
            export_value: "export_value".to_string(),
            rca: "export_rca".to_string(),
        }
    }
}

/// Column names of the per-country indicator table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorColumns {
    pub location: String,
    pub value: String,
}

impl Default for IndicatorColumns {
    fn default() -> Self {
        Self {
            location: "location_code".to_string(),
            value: "eci".to_string(),
        }
    }
}

/// Layout strategy used for the product space map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMethod {
    /// Spring layout over the backbone graph
    KamadaKawai,
    /// Neighbor-graph embedding of the raw distance matrix
    Umap,
}

/// Kamada-Kawai parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceLayoutConfig {
    /// Stop once the largest node gradient falls below this
    pub epsilon: f64,
    /// Cap on outer iterations (one node moved per iteration)
    pub max_iterations: usize,
    /// Cap on Newton-Raphson steps per moved node
    pub max_inner_iterations: usize,
    /// Lay out the spanning tree first and seed the backbone layout with it
    pub seed_from_spanning_tree: bool,
}

impl Default for ForceLayoutConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            max_iterations: 20_000,
            max_inner_iterations: 25,
            seed_from_spanning_tree: true,
        }
    }
}

/// UMAP embedding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapConfig {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: usize,
    pub negative_sample_rate: usize,
    pub learning_rate: f64,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 200,
            negative_sample_rate: 5,
            learning_rate: 1.0,
        }
    }
}

/// Visual mapping parameters shared by the renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub min_radius: f64,
    pub max_radius: f64,
    /// GeoJSON feature property joined against indicator locations
    pub geo_key: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            min_radius: 3.0,
            max_radius: 14.0,
            geo_key: "ISO_A3".to_string(),
        }
    }
}

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proximity: DataSource,
    pub products: DataSource,
    pub exports: Option<DataSource>,
    pub indicators: Option<DataSource>,
    pub geojson: Option<DataSource>,

    pub proximity_columns: ProximityColumns,
    pub product_columns: ProductColumns,
    pub export_columns: ExportColumns,
    pub indicator_columns: IndicatorColumns,

    /// Country whose RCA flags drive node opacity and the treemap
    pub country: Option<String>,

    /// Edges with proximity strictly above this join the backbone
    pub threshold: f64,

    pub layout: LayoutMethod,
    pub force: ForceLayoutConfig,
    pub umap: UmapConfig,

    /// Seed for layout initialisation and community visiting order
    pub seed: u64,

    /// Seed the layout from a previous run's `layout.bin` when present
    pub reuse_layout: bool,

    pub render: RenderConfig,
    pub output_dir: PathBuf,
    pub skip_viz: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proximity: DataSource::new("data/proximity.csv", None),
            products: DataSource::new("data/products.csv", None),
            exports: None,
            indicators: None,
            geojson: None,
            proximity_columns: ProximityColumns::default(),
            product_columns: ProductColumns::default(),
            export_columns: ExportColumns::default(),
            indicator_columns: IndicatorColumns::default(),
            country: None,
            threshold: 0.55,
            layout: LayoutMethod::KamadaKawai,
            force: ForceLayoutConfig::default(),
            umap: UmapConfig::default(),
            seed: 42,
            reuse_layout: false,
            render: RenderConfig::default(),
            output_dir: PathBuf::from("product_space_results"),
            skip_viz: false,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Reject values no step can work with
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            anyhow::bail!("threshold must be finite, got {}", self.threshold);
        }
        if self.umap.n_neighbors == 0 {
            anyhow::bail!("n_neighbors must be at least 1");
        }
        if self.render.min_radius > self.render.max_radius {
            anyhow::bail!(
                "min_radius {} exceeds max_radius {}",
                self.render.min_radius,
                self.render.max_radius
            );
        }
        Ok(())
    }
}
