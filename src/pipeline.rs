//! End-to-end run: load, extract the backbone, lay out, partition, persist, render

use crate::cluster::{detection::detect_communities, Partition};
use crate::config::{Config, LayoutMethod};
use crate::data::fetch::ensure_local;
use crate::data::preprocessing::{
    advantage_set, deduplicate_edges, exports_for, referenced_products, restrict_products,
};
use crate::data::tables::{load_exports, load_indicators, load_products, load_proximity};
use crate::data::{CountryExport, Indicator, Product, ProximityEdge};
use crate::graph::builder::build_proximity_graph;
use crate::graph::{extract_backbone, Backbone, WeightedGraph};
use crate::layout::{force, umap, Layout};
use crate::storage::{self, RunArtifacts};
use crate::viz::treemap::TreemapItem;
use crate::viz::{self, VisualInputs};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

/// Tables and derived structures of one run, passed explicitly between steps
pub struct PipelineContext {
    pub config: Config,

    /// Deduplicated, loop-free proximity edges
    pub edges: Vec<ProximityEdge>,

    /// One product per graph node, in node order
    pub products: Vec<Product>,

    pub exports: Vec<CountryExport>,
    pub indicators: Vec<Indicator>,

    pub proximity_graph: WeightedGraph,
    pub backbone: Backbone,
    pub layout: Layout,
    pub partition: Partition,
}

/// Raw input tables
struct Inputs {
    edges: Vec<ProximityEdge>,
    products: Vec<Product>,
    exports: Vec<CountryExport>,
    indicators: Vec<Indicator>,
}

/// Run the whole pipeline and return its context
pub fn run(config: Config) -> Result<PipelineContext> {
    config.validate()?;

    // 1. Load data
    let inputs = load_inputs(&config)?;

    // 2. Clean and align tables
    let edges = deduplicate_edges(&inputs.edges);
    let codes = referenced_products(&edges);
    let products = restrict_products(&inputs.products, &codes);
    log::info!("Product space has {} products and {} proximity pairs", codes.len(), edges.len());

    // 3. Build the complete proximity graph
    let proximity_graph = build_proximity_graph(&codes, &edges)?;

    // 4. Extract the backbone
    let backbone = extract_backbone(&proximity_graph, config.threshold)?;
    log::info!(
        "Backbone has {} edges ({} from the spanning tree, {} above the threshold)",
        backbone.graph.edge_count(),
        backbone.spanning_edge_count(),
        backbone.threshold_edge_count()
    );

    // 5. Lay out
    let layout = compute_layout(&config, &edges, &backbone)?;

    // 6. Find communities
    let partition = detect_communities(&backbone.graph, config.seed)?;

    let context = PipelineContext {
        config,
        edges,
        products,
        exports: inputs.exports,
        indicators: inputs.indicators,
        proximity_graph,
        backbone,
        layout,
        partition,
    };

    // 7. Save results
    save(&context)?;

    // 8. Generate visualizations if requested
    if context.config.skip_viz {
        log::info!("Skipping visualizations");
    } else {
        visualize(&context)?;
    }

    log::info!(
        "Analysis complete. Results saved to {}",
        context.config.output_dir.display()
    );

    Ok(context)
}

fn load_inputs(config: &Config) -> Result<Inputs> {
    log::info!("Loading input tables");

    let edges = load_proximity(&config.proximity, &config.proximity_columns)
        .context("loading proximity table")?;
    let products = load_products(&config.products, &config.product_columns)
        .context("loading product metadata")?;

    let exports = match &config.exports {
        Some(source) => load_exports(source, &config.export_columns)
            .context("loading country exports")?,
        None => Vec::new(),
    };
    let indicators = match &config.indicators {
        Some(source) => load_indicators(source, &config.indicator_columns)
            .context("loading indicator table")?,
        None => Vec::new(),
    };

    Ok(Inputs {
        edges,
        products,
        exports,
        indicators,
    })
}

/// Previous run's layout, when reuse is enabled and the cache exists
fn cached_layout(config: &Config) -> Result<Option<Layout>> {
    if !config.reuse_layout {
        return Ok(None);
    }
    let path = config.output_dir.join("layout.bin");
    if !path.exists() {
        log::info!("No cached layout at {}, starting fresh", path.display());
        return Ok(None);
    }
    storage::load_layout(&path).map(Some)
}

fn compute_layout(config: &Config, edges: &[ProximityEdge], backbone: &Backbone) -> Result<Layout> {
    let cached = cached_layout(config)?;

    match config.layout {
        LayoutMethod::KamadaKawai => {
            force::coarse_to_fine(backbone, cached.as_ref(), &config.force, config.seed)
        }
        LayoutMethod::Umap => {
            if cached.is_some() {
                log::info!("UMAP embedding starts from its own placement; cached layout not used");
            }
            let node_ids = &backbone.graph.node_ids;
            let distances = umap::distance_matrix(node_ids, edges);
            umap::embed(node_ids, &distances, &config.umap, config.seed)
        }
    }
}

fn save(context: &PipelineContext) -> Result<()> {
    let artifacts = RunArtifacts {
        products: &context.products,
        proximity_graph: &context.proximity_graph,
        backbone: &context.backbone,
        layout: &context.layout,
        partition: &context.partition,
    };
    storage::save_results(&artifacts, &context.config.output_dir)
}

/// RCA presence per node for the configured country
pub fn presence_flags(products: &[Product], exports: &[CountryExport], country: &str) -> Vec<bool> {
    let advantaged = advantage_set(exports, country);
    log::info!("{} has RCA >= 1 in {} products", country, advantaged.len());
    products.iter().map(|p| advantaged.contains(&p.code)).collect()
}

/// Treemap leaves: the country's exports when available, else world export values
pub fn treemap_items(
    products: &[Product],
    exports: &[CountryExport],
    country: Option<&str>,
) -> Vec<TreemapItem> {
    let by_code: HashMap<&str, &Product> = products.iter().map(|p| (p.code.as_str(), p)).collect();

    if let Some(country) = country {
        let rows = exports_for(exports, country);
        if !rows.is_empty() {
            return rows
                .into_iter()
                .filter(|e| e.export_value > 0.0)
                .map(|e| {
                    let product = by_code
                        .get(e.product.as_str())
                        .map(|p| (*p).clone())
                        .unwrap_or_else(|| Product::unnamed(&e.product));
                    TreemapItem {
                        category: product.group(),
                        label: product.name,
                        value: e.export_value,
                    }
                })
                .collect();
        }
        log::warn!("No export records for {}", country);
    }

    products
        .iter()
        .filter_map(|p| {
            let value = p.export_value.filter(|v| *v > 0.0)?;
            Some(TreemapItem {
                category: p.group(),
                label: p.name.clone(),
                value,
            })
        })
        .collect()
}

fn load_geojson(context: &PipelineContext) -> Result<Option<serde_json::Value>> {
    let source = match &context.config.geojson {
        Some(source) => source,
        None => return Ok(None),
    };
    let path = ensure_local(source)?;
    let reader = BufReader::new(File::open(&path)?);
    let geojson = serde_json::from_reader(reader)
        .with_context(|| format!("parsing GeoJSON {}", path.display()))?;
    Ok(Some(geojson))
}

fn visualize(context: &PipelineContext) -> Result<()> {
    let country = context.config.country.as_deref();

    let presence = match country {
        Some(country) if !context.exports.is_empty() => {
            Some(presence_flags(&context.products, &context.exports, country))
        }
        Some(_) => {
            log::warn!("A country was given but no export table is configured; drawing all products");
            None
        }
        None => None,
    };

    let choropleth = if context.indicators.is_empty() {
        None
    } else {
        load_geojson(context)?.map(|geojson| {
            let values: HashMap<String, f64> = context
                .indicators
                .iter()
                .map(|i| (i.location.clone(), i.value))
                .collect();
            (geojson, values)
        })
    };

    let inputs = VisualInputs {
        graph: &context.backbone.graph,
        layout: &context.layout,
        partition: &context.partition,
        products: &context.products,
        country,
        presence,
        treemap: treemap_items(&context.products, &context.exports, country),
        choropleth,
    };

    viz::generate_visualizations(&inputs, &context.config.render, &context.config.output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(code: &str, name: &str, export_value: Option<f64>) -> Product {
        Product {
            code: code.into(),
            name: name.into(),
            pci: None,
            export_value,
            category: None,
        }
    }

    fn export(location: &str, product: &str, value: f64, rca: f64) -> CountryExport {
        CountryExport {
            location: location.into(),
            product: product.into(),
            export_value: value,
            rca,
        }
    }

    #[test]
    fn presence_follows_rca() {
        let products = vec![product("0101", "Horses", None), product("2603", "Copper ore", None)];
        let exports = vec![export("CHL", "2603", 100.0, 12.0), export("CHL", "0101", 1.0, 0.2)];
        assert_eq!(presence_flags(&products, &exports, "chl"), vec![false, true]);
    }

    #[test]
    fn treemap_prefers_country_exports() {
        let products = vec![product("0101", "Horses", Some(5.0)), product("2603", "Copper ore", None)];
        let exports = vec![
            export("CHL", "2603", 100.0, 12.0),
            export("CHL", "9999", 3.0, 0.1),
            export("CHL", "0101", 0.0, 0.0),
        ];

        let items = treemap_items(&products, &exports, Some("CHL"));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Copper ore");
        assert_eq!(items[0].category, "26");
        assert_eq!(items[1].label, "9999");
    }

    #[test]
    fn treemap_falls_back_to_world_exports() {
        let products = vec![product("0101", "Horses", Some(5.0)), product("2603", "Copper ore", None)];
        let items = treemap_items(&products, &[], None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "01");
    }
}
