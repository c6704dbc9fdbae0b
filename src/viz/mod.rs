//! Visualization generation module

pub mod choropleth;
pub mod product_space;
pub mod svg;
pub mod treemap;

use crate::cluster::Partition;
use crate::config::RenderConfig;
use crate::data::Product;
use crate::graph::WeightedGraph;
use crate::layout::Layout;
use anyhow::Result;
use itertools::Itertools;
use product_space::{render_product_space, NetworkStyle, NodeAttributes};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use treemap::{render_treemap, TreemapItem};

/// Everything the renderers draw from
pub struct VisualInputs<'a> {
    pub graph: &'a WeightedGraph,
    pub layout: &'a Layout,
    pub partition: &'a Partition,
    pub products: &'a [Product],

    /// Country the presence flags and treemap refer to
    pub country: Option<&'a str>,

    /// RCA presence per node, when a country was selected
    pub presence: Option<Vec<bool>>,

    pub treemap: Vec<TreemapItem>,

    /// GeoJSON document and the per-location values joined onto it
    pub choropleth: Option<(serde_json::Value, HashMap<String, f64>)>,
}

/// A rendered image and its caption
struct Figure {
    file: &'static str,
    caption: String,
}

/// Generate visualizations from analysis results
pub fn generate_visualizations(
    inputs: &VisualInputs,
    render: &RenderConfig,
    output_dir: &Path,
) -> Result<()> {
    log::info!(
        "Generating visualizations for {} communities",
        inputs.partition.community_count()
    );

    // Create visualizations directory
    let viz_dir = output_dir.join("visualizations");
    fs::create_dir_all(&viz_dir)?;

    let mut figures = Vec::new();

    // Product space map
    let pci: Vec<Option<f64>> = inputs.products.iter().map(|p| p.pci).collect();
    let title = match inputs.country {
        Some(country) => format!("Product space: {} (RCA >= 1)", country),
        None => "Product space".to_string(),
    };
    let style = NetworkStyle {
        width: render.width,
        height: render.height,
        min_radius: render.min_radius,
        max_radius: render.max_radius,
        title: Some(title.clone()),
        ..NetworkStyle::default()
    };
    let attributes = NodeAttributes {
        category: &inputs.partition.labels,
        size: Some(&pci),
        presence: inputs.presence.as_deref(),
    };
    render_product_space(
        inputs.graph,
        inputs.layout,
        &attributes,
        &style,
        &viz_dir.join("product_space.svg"),
    )?;
    figures.push(Figure {
        file: "product_space.svg",
        caption: title,
    });

    // Export treemap
    if inputs.treemap.is_empty() {
        log::info!("No export values available, skipping treemap");
    } else {
        let caption = match inputs.country {
            Some(country) => format!("Export composition: {}", country),
            None => "World export composition".to_string(),
        };
        render_treemap(
            &inputs.treemap,
            render.width,
            render.height,
            Some(&caption),
            &viz_dir.join("treemap.svg"),
        )?;
        figures.push(Figure {
            file: "treemap.svg",
            caption,
        });
    }

    // Indicator map
    match &inputs.choropleth {
        Some((geojson, values)) => {
            let caption = "Indicator by country".to_string();
            let stats = choropleth::render_choropleth(
                geojson,
                &render.geo_key,
                values,
                render.width,
                render.height / 2 + 50,
                Some(&caption),
                &viz_dir.join("choropleth.svg"),
            )?;
            figures.push(Figure {
                file: "choropleth.svg",
                caption: format!("{} ({} of {} regions with data)", caption, stats.matched, stats.regions),
            });
        }
        None => log::info!("No indicator data or GeoJSON configured, skipping choropleth"),
    }

    generate_index(inputs, &figures, &viz_dir)?;
    generate_community_stats(inputs, &viz_dir)?;

    log::info!("Visualizations generated successfully");

    Ok(())
}

/// Write an HTML page linking all produced images
fn generate_index(inputs: &VisualInputs, figures: &[Figure], viz_dir: &Path) -> Result<()> {
    log::info!("Generating HTML index");

    let index_path = viz_dir.join("index.html");
    let mut index_file = File::create(index_path)?;
    let communities = &inputs.partition.communities;

    writeln!(index_file, "<!DOCTYPE html>")?;
    writeln!(index_file, "<html lang=\"en\">")?;
    writeln!(index_file, "<head>")?;
    writeln!(index_file, "  <meta charset=\"UTF-8\">")?;
    writeln!(index_file, "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(index_file, "  <title>Product Space</title>")?;
    writeln!(index_file, "  <style>")?;
    writeln!(index_file, "    body {{ font-family: Arial, sans-serif; margin: 20px; }}")?;
    writeln!(index_file, "    h1, h2 {{ color: #333; }}")?;
    writeln!(index_file, "    figure {{ margin: 20px 0; }}")?;
    writeln!(index_file, "    img {{ max-width: 100%; border: 1px solid #ddd; }}")?;
    writeln!(index_file, "    .stats {{ margin-top: 20px; background-color: #f9f9f9; padding: 15px; border-radius: 5px; }}")?;
    writeln!(index_file, "  </style>")?;
    writeln!(index_file, "</head>")?;
    writeln!(index_file, "<body>")?;
    writeln!(index_file, "  <h1>Product Space</h1>")?;

    // Summary statistics
    writeln!(index_file, "  <div class=\"stats\">")?;
    writeln!(index_file, "    <h2>Summary Statistics</h2>")?;
    writeln!(index_file, "    <p>Products: {}</p>", inputs.graph.node_count)?;
    writeln!(index_file, "    <p>Backbone edges: {}</p>", inputs.graph.edge_count())?;
    writeln!(index_file, "    <p>Communities: {}</p>", communities.len())?;
    writeln!(index_file, "    <p>Modularity: {:.4}</p>", inputs.partition.modularity)?;
    if let Some(presence) = &inputs.presence {
        let present = presence.iter().filter(|&&p| p).count();
        writeln!(index_file, "    <p>Products with RCA &gt;= 1: {}</p>", present)?;
    }
    writeln!(index_file, "  </div>")?;

    for figure in figures {
        writeln!(index_file, "  <figure>")?;
        writeln!(index_file, "    <img src=\"{}\" alt=\"{}\">", figure.file, crate::storage::xml_escape(&figure.caption))?;
        writeln!(index_file, "    <figcaption>{}</figcaption>", crate::storage::xml_escape(&figure.caption))?;
        writeln!(index_file, "  </figure>")?;
    }

    writeln!(index_file, "</body>")?;
    writeln!(index_file, "</html>")?;

    Ok(())
}

/// Write per-community statistics for external tools
fn generate_community_stats(inputs: &VisualInputs, viz_dir: &Path) -> Result<()> {
    log::info!("Generating community statistics");

    let stats_path = viz_dir.join("community_stats.csv");
    let mut stats_file = File::create(stats_path)?;

    writeln!(stats_file, "community_id,size,density,central_nodes_count,central_products")?;

    for community in &inputs.partition.communities {
        let central = community
            .central_nodes
            .iter()
            .map(|&node| inputs.graph.node_id(node as usize))
            .join(";");
        writeln!(
            stats_file,
            "{},{},{:.6},{},{}",
            community.id,
            community.size,
            community.density,
            community.central_nodes.len(),
            central
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::detection::detect_communities;
    use crate::graph::builder::GraphBuilder;
    use serde_json::json;

    #[test]
    fn all_artifacts_are_written_and_linked() {
        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("01", "02", 0.9);
        builder.add_edge("02", "03", 0.6);
        let graph = builder.build().unwrap();
        let layout = Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        let partition = detect_communities(&graph, 1).unwrap();
        let products: Vec<Product> = graph.node_ids.iter().map(|c| Product::unnamed(c)).collect();

        let geojson = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "ISO_A3": "CHL" },
                "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] }
            }]
        });
        let values: HashMap<String, f64> = [("CHL".to_string(), 0.5)].into_iter().collect();

        let inputs = VisualInputs {
            graph: &graph,
            layout: &layout,
            partition: &partition,
            products: &products,
            country: Some("CHL"),
            presence: Some(vec![true, false, true]),
            treemap: vec![TreemapItem {
                category: "01".into(),
                label: "Horses".into(),
                value: 10.0,
            }],
            choropleth: Some((geojson, values)),
        };

        let dir = tempfile::tempdir().unwrap();
        generate_visualizations(&inputs, &RenderConfig::default(), dir.path()).unwrap();

        let viz = dir.path().join("visualizations");
        for file in ["product_space.svg", "treemap.svg", "choropleth.svg", "index.html", "community_stats.csv"] {
            assert!(viz.join(file).exists(), "{} missing", file);
        }
        let index = fs::read_to_string(viz.join("index.html")).unwrap();
        assert!(index.contains("src=\"treemap.svg\""));
        assert!(index.contains("src=\"choropleth.svg\""));

        let stats = fs::read_to_string(viz.join("community_stats.csv")).unwrap();
        assert!(stats.starts_with("community_id,size,density"));
        assert_eq!(stats.lines().count(), partition.community_count() + 1);
    }

    #[test]
    fn optional_figures_are_skipped() {
        let mut builder = GraphBuilder::with_capacity(2);
        builder.add_edge("a", "b", 0.7);
        let graph = builder.build().unwrap();
        let layout = Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0], [1.0, 1.0]]);
        let partition = detect_communities(&graph, 1).unwrap();
        let products: Vec<Product> = graph.node_ids.iter().map(|c| Product::unnamed(c)).collect();

        let inputs = VisualInputs {
            graph: &graph,
            layout: &layout,
            partition: &partition,
            products: &products,
            country: None,
            presence: None,
            treemap: Vec::new(),
            choropleth: None,
        };

        let dir = tempfile::tempdir().unwrap();
        generate_visualizations(&inputs, &RenderConfig::default(), dir.path()).unwrap();

        let viz = dir.path().join("visualizations");
        assert!(viz.join("product_space.svg").exists());
        assert!(!viz.join("treemap.svg").exists());
        assert!(!viz.join("choropleth.svg").exists());
    }
}
