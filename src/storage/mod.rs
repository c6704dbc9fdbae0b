//! Results persistence module

use crate::cluster::Partition;
use crate::data::Product;
use crate::graph::{Backbone, WeightedGraph};
use crate::layout::Layout;
use anyhow::{Context, Result};
use serde_json::{json, to_string_pretty};
use statrs::statistics::{Data, Max, Min, OrderStatistics, Statistics};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Everything a finished run persists
pub struct RunArtifacts<'a> {
    pub products: &'a [Product],
    pub proximity_graph: &'a WeightedGraph,
    pub backbone: &'a Backbone,
    pub layout: &'a Layout,
    pub partition: &'a Partition,
}

/// Save analysis results to the specified directory
pub fn save_results(artifacts: &RunArtifacts, output_dir: &Path) -> Result<()> {
    log::info!("Saving results to {}", output_dir.display());

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    save_summary(artifacts, output_dir)?;
    save_communities(artifacts, output_dir)?;
    save_nodes(artifacts, output_dir)?;
    save_graphml(artifacts, &output_dir.join("backbone.graphml"))?;
    save_layout(artifacts.layout, &output_dir.join("layout.bin"))?;

    log::info!("Results saved successfully");

    Ok(())
}

/// Distribution summary of a set of edge weights
fn weight_stats(weights: &[f64]) -> serde_json::Value {
    if weights.is_empty() {
        return json!(null);
    }
    let mut data = Data::new(weights.to_vec());
    json!({
        "mean": weights.iter().mean(),
        "std_dev": weights.iter().std_dev(),
        "min": data.min(),
        "median": data.median(),
        "max": data.max(),
    })
}

/// Save summary information
fn save_summary(artifacts: &RunArtifacts, output_dir: &Path) -> Result<()> {
    log::info!("Saving summary information");

    let path = output_dir.join("summary.json");
    let mut file = File::create(path)?;

    let graph = artifacts.proximity_graph;
    let backbone = artifacts.backbone;
    let communities = &artifacts.partition.communities;

    let all_weights: Vec<f64> = graph.undirected_edges().map(|e| e.2).collect();
    let backbone_weights: Vec<f64> = backbone.edges.iter().map(|e| e.weight).collect();

    let summary = json!({
        "proximity_graph": {
            "node_count": graph.node_count,
            "edge_count": graph.edge_count(),
            "components": backbone.components,
            "weights": weight_stats(&all_weights),
        },
        "backbone": {
            "threshold": backbone.threshold,
            "edge_count": backbone.graph.edge_count(),
            "spanning_tree_edges": backbone.spanning_edge_count(),
            "threshold_edges": backbone.threshold_edge_count(),
            "avg_degree": 2.0 * backbone.graph.edge_count() as f64
                / (backbone.graph.node_count.max(1)) as f64,
            "weights": weight_stats(&backbone_weights),
        },
        "community_stats": {
            "community_count": communities.len(),
            "modularity": artifacts.partition.modularity,
            "largest_community_size": communities.first().map_or(0, |c| c.size),
            "smallest_community_size": communities.last().map_or(0, |c| c.size),
            "avg_density": communities.iter().map(|c| c.density as f64).sum::<f64>() /
                           if communities.is_empty() { 1.0 } else { communities.len() as f64 },
        }
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}

/// Save community membership with resolved product names
fn save_communities(artifacts: &RunArtifacts, output_dir: &Path) -> Result<()> {
    log::info!("Saving community information");

    let path = output_dir.join("communities.json");
    let mut file = File::create(path)?;
    let products = artifacts.products;

    let name_of = |node: u32| -> serde_json::Value {
        let product = &products[node as usize];
        json!({ "code": product.code, "name": product.name })
    };

    let communities_json = json!({
        "modularity": artifacts.partition.modularity,
        "communities": artifacts.partition.communities.iter().map(|c| {
            json!({
                "id": c.id,
                "size": c.size,
                "density": c.density,
                "central_nodes": c.central_nodes.iter().map(|&n| name_of(n)).collect::<Vec<_>>(),
                "members": c.members.iter().map(|&n| name_of(n)).collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>()
    });

    file.write_all(to_string_pretty(&communities_json)?.as_bytes())?;

    Ok(())
}

/// Quote a CSV field when it needs it
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Save one row per node: metadata, position and community
fn save_nodes(artifacts: &RunArtifacts, output_dir: &Path) -> Result<()> {
    log::info!("Saving node table");

    let path = output_dir.join("nodes.csv");
    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "code,name,pci,x,y,community,degree")?;
    for (node, product) in artifacts.products.iter().enumerate() {
        let [x, y] = artifacts.layout.positions[node];
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            csv_field(&product.code),
            csv_field(&product.name),
            optional(product.pci),
            x,
            y,
            artifacts.partition.label_of(node),
            artifacts.backbone.graph.degree(node)
        )?;
    }
    file.flush()?;

    Ok(())
}

/// Escape text for XML content and attribute values
pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Write the backbone as an attributed GraphML file
pub fn save_graphml(artifacts: &RunArtifacts, path: &Path) -> Result<()> {
    log::info!("Writing GraphML to {}", path.display());

    let mut file = BufWriter::new(File::create(path)?);
    let backbone = artifacts.backbone;

    // Write GraphML header and attribute declarations
    writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
    writeln!(file, "  <key id=\"name\" for=\"node\" attr.name=\"name\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"pci\" for=\"node\" attr.name=\"pci\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"export_value\" for=\"node\" attr.name=\"export_value\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"community\" for=\"node\" attr.name=\"community\" attr.type=\"int\"/>")?;
    writeln!(file, "  <key id=\"x\" for=\"node\" attr.name=\"x\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"y\" for=\"node\" attr.name=\"y\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"weight\" for=\"edge\" attr.name=\"weight\" attr.type=\"double\"/>")?;
    writeln!(file, "  <key id=\"source\" for=\"edge\" attr.name=\"source\" attr.type=\"string\"/>")?;
    writeln!(file, "  <graph id=\"backbone\" edgedefault=\"undirected\">")?;

    // Write nodes
    for (node, product) in artifacts.products.iter().enumerate() {
        let [x, y] = artifacts.layout.positions[node];
        writeln!(file, "    <node id=\"{}\">", xml_escape(&product.code))?;
        writeln!(file, "      <data key=\"name\">{}</data>", xml_escape(&product.name))?;
        if let Some(pci) = product.pci {
            writeln!(file, "      <data key=\"pci\">{}</data>", pci)?;
        }
        if let Some(value) = product.export_value {
            writeln!(file, "      <data key=\"export_value\">{}</data>", value)?;
        }
        writeln!(file, "      <data key=\"community\">{}</data>", artifacts.partition.label_of(node))?;
        writeln!(file, "      <data key=\"x\">{}</data>", x)?;
        writeln!(file, "      <data key=\"y\">{}</data>", y)?;
        writeln!(file, "    </node>")?;
    }

    // Write edges
    for (edge_id, edge) in backbone.edges.iter().enumerate() {
        writeln!(
            file,
            "    <edge id=\"e{}\" source=\"{}\" target=\"{}\">",
            edge_id,
            xml_escape(backbone.graph.node_id(edge.a as usize)),
            xml_escape(backbone.graph.node_id(edge.b as usize))
        )?;
        writeln!(file, "      <data key=\"weight\">{}</data>", edge.weight)?;
        writeln!(file, "      <data key=\"source\">{}</data>", edge.source.as_str())?;
        writeln!(file, "    </edge>")?;
    }

    // Write GraphML footer
    writeln!(file, "  </graph>")?;
    writeln!(file, "</graphml>")?;
    file.flush()?;

    Ok(())
}

/// Persist a layout for reuse as the seed of a later run
pub fn save_layout(layout: &Layout, path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    bincode::serialize_into(file, layout)
        .with_context(|| format!("writing layout {}", path.display()))?;
    log::info!("Saved layout of {} nodes to {}", layout.len(), path.display());
    Ok(())
}

/// Load a layout written by `save_layout`
pub fn load_layout(path: &Path) -> Result<Layout> {
    let file = BufReader::new(File::open(path)?);
    let layout: Layout = bincode::deserialize_from(file)
        .with_context(|| format!("reading layout {}", path.display()))?;
    log::info!("Loaded layout of {} nodes from {}", layout.len(), path.display());
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::detection::detect_communities;
    use crate::graph::builder::GraphBuilder;
    use crate::graph::extract_backbone;

    #[test]
    fn node_table_and_graphml_carry_community_labels() {
        let mut builder = GraphBuilder::with_capacity(4);
        builder.add_edge("0101", "0102", 0.9);
        builder.add_edge("0102", "0103", 0.3);
        builder.add_edge("0103", "0104", 0.8);
        let graph = builder.build().unwrap();
        let backbone = extract_backbone(&graph, 0.55).unwrap();
        let partition = detect_communities(&backbone.graph, 3).unwrap();
        let layout = Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]);
        let products: Vec<Product> = graph.node_ids.iter().map(|c| Product::unnamed(c)).collect();

        let artifacts = RunArtifacts {
            products: &products,
            proximity_graph: &graph,
            backbone: &backbone,
            layout: &layout,
            partition: &partition,
        };
        let dir = tempfile::tempdir().unwrap();
        save_results(&artifacts, dir.path()).unwrap();

        let nodes = fs::read_to_string(dir.path().join("nodes.csv")).unwrap();
        let communities: Vec<u32> = nodes
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(5).unwrap().parse().unwrap())
            .collect();
        assert_eq!(communities, partition.labels);

        let graphml = fs::read_to_string(dir.path().join("backbone.graphml")).unwrap();
        assert_eq!(graphml.matches("<data key=\"community\">").count(), 4);
        assert_eq!(graphml.matches("<edge ").count(), backbone.edges.len());
    }

    #[test]
    fn layout_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.bin");
        let layout = Layout::new(vec!["a".into(), "b".into()], vec![[0.5, -1.0], [2.0, 3.25]]);

        save_layout(&layout, &path).unwrap();
        assert_eq!(load_layout(&path).unwrap(), layout);
    }

    #[test]
    fn xml_special_characters_are_escaped() {
        assert_eq!(xml_escape("Fish & \"chips\" <fried>"), "Fish &amp; &quot;chips&quot; &lt;fried&gt;");
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        assert_eq!(csv_field("Horses, live"), "\"Horses, live\"");
        assert_eq!(csv_field("Cattle"), "Cattle");
    }

    #[test]
    fn weight_stats_report_median() {
        let stats = weight_stats(&[0.2, 0.4, 0.9]);
        let median = stats["median"].as_f64().unwrap();
        assert!((median - 0.4).abs() < 1e-9);
        assert_eq!(stats["max"], json!(0.9));
    }
}
