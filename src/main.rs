use anyhow::Result;
use clap::Parser;
use product_space::config::{Config, DataSource, LayoutMethod};
use product_space::pipeline;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "product-space",
    about = "Backbone extraction, layout and rendering of the product space"
)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[clap(long)]
    config: Option<PathBuf>,

    /// Path to the proximity table (CSV, TSV or Parquet)
    #[clap(long)]
    proximity: Option<PathBuf>,

    /// Download URL used when the proximity table is absent
    #[clap(long)]
    proximity_url: Option<String>,

    /// Path to the product metadata table
    #[clap(long)]
    products: Option<PathBuf>,

    /// Download URL used when the product table is absent
    #[clap(long)]
    products_url: Option<String>,

    /// Country-product export table with RCA values
    #[clap(long)]
    exports: Option<PathBuf>,

    /// Country code whose RCA flags and exports are drawn
    #[clap(long)]
    country: Option<String>,

    /// Per-country indicator table for the choropleth
    #[clap(long)]
    indicators: Option<PathBuf>,

    /// GeoJSON world polygons for the choropleth
    #[clap(long)]
    geojson: Option<PathBuf>,

    /// Output directory for results
    #[clap(long)]
    output_dir: Option<PathBuf>,

    /// Proximity above which edges join the backbone
    #[clap(long)]
    threshold: Option<f64>,

    /// Neighborhood size of the UMAP embedding
    #[clap(long)]
    n_neighbors: Option<usize>,

    /// Layout algorithm
    #[clap(long, value_enum)]
    layout: Option<LayoutMethod>,

    /// Random seed for layout and community detection
    #[clap(long)]
    seed: Option<u64>,

    /// Seed the layout from the previous run's layout.bin
    #[clap(long)]
    reuse_layout: bool,

    /// Skip visualizations
    #[clap(long)]
    skip_viz: bool,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    /// Apply command line overrides on top of a file or default configuration
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(path) = self.proximity {
            config.proximity.path = path;
        }
        if let Some(url) = self.proximity_url {
            config.proximity.url = Some(url);
        }
        if let Some(path) = self.products {
            config.products.path = path;
        }
        if let Some(url) = self.products_url {
            config.products.url = Some(url);
        }
        if let Some(path) = self.exports {
            config.exports = Some(DataSource::new(path, None));
        }
        if let Some(path) = self.indicators {
            config.indicators = Some(DataSource::new(path, None));
        }
        if let Some(path) = self.geojson {
            config.geojson = Some(DataSource::new(path, None));
        }
        if let Some(country) = self.country {
            config.country = Some(country);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(n) = self.n_neighbors {
            config.umap.n_neighbors = n;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.reuse_layout |= self.reuse_layout;
        config.skip_viz |= self.skip_viz;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        // If threads = 0, use all available cores
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.into_config()?;

    log::info!("Starting product space analysis");
    log::info!("Proximity: {}", config.proximity.path.display());
    log::info!("Products: {}", config.products.path.display());
    log::info!("Output: {}", config.output_dir.display());

    pipeline::run(config)?;

    Ok(())
}
