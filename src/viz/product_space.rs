//! Product space network map

use crate::graph::WeightedGraph;
use crate::layout::Layout;
use crate::viz::svg::{categorical_color, Svg};
use anyhow::Result;
use std::path::Path;

/// Per-node attributes mapped onto visual channels
pub struct NodeAttributes<'a> {
    /// Categorical value per node, mapped to color
    pub category: &'a [u32],

    /// Numeric value per node, mapped to radius
    pub size: Option<&'a [Option<f64>]>,

    /// Presence flag per node; absent nodes are drawn fully transparent
    pub presence: Option<&'a [bool]>,
}

/// Visual mapping for the network map
#[derive(Debug, Clone)]
pub struct NetworkStyle {
    pub width: u32,
    pub height: u32,
    pub min_radius: f64,
    pub max_radius: f64,
    pub margin: f64,
    pub edge_color: String,
    pub edge_opacity: f64,
    pub title: Option<String>,
}

impl Default for NetworkStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            min_radius: 3.0,
            max_radius: 14.0,
            margin: 40.0,
            edge_color: "#9e9e9e".to_string(),
            edge_opacity: 0.5,
            title: None,
        }
    }
}

/// Radius per node: values scaled linearly onto the radius range, then clamped.
/// Nodes without a value get the minimum radius.
pub fn node_radii(values: &[Option<f64>], min_radius: f64, max_radius: f64) -> Vec<f64> {
    let present = values.iter().flatten().copied().filter(|v| v.is_finite());
    let (lo, hi) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    values
        .iter()
        .map(|value| match value {
            Some(v) if v.is_finite() && hi > lo => {
                let t = (v - lo) / (hi - lo);
                (min_radius + t * (max_radius - min_radius)).clamp(min_radius, max_radius)
            }
            Some(v) if v.is_finite() => (min_radius + max_radius) / 2.0,
            _ => min_radius,
        })
        .collect()
}

/// Opacity per node: 1 when present (or when no presence set is given), 0 otherwise
pub fn node_opacity(presence: Option<&[bool]>, node_count: usize) -> Vec<f64> {
    match presence {
        Some(flags) => flags.iter().map(|&p| if p { 1.0 } else { 0.0 }).collect(),
        None => vec![1.0; node_count],
    }
}

/// Map layout coordinates into the drawable area, y pointing down
fn to_canvas(layout: &Layout, style: &NetworkStyle) -> Vec<(f64, f64)> {
    let normalized = layout.normalized();
    let w = style.width as f64 - 2.0 * style.margin;
    let h = style.height as f64 - 2.0 * style.margin;
    let side = w.min(h);
    let x0 = style.margin + (w - side) / 2.0;
    let y0 = style.margin + (h - side) / 2.0;

    normalized
        .positions
        .iter()
        .map(|p| (x0 + p[0] * side, y0 + (1.0 - p[1]) * side))
        .collect()
}

/// Render the graph as an SVG document
pub fn product_space_svg(
    graph: &WeightedGraph,
    layout: &Layout,
    attributes: &NodeAttributes,
    style: &NetworkStyle,
) -> Result<Svg> {
    let n = graph.node_count;
    if layout.len() != n || attributes.category.len() != n {
        anyhow::bail!(
            "attribute lengths do not match {} nodes (layout {}, categories {})",
            n,
            layout.len(),
            attributes.category.len()
        );
    }
    if attributes.size.is_some_and(|s| s.len() != n)
        || attributes.presence.is_some_and(|p| p.len() != n)
    {
        anyhow::bail!("size/presence attributes do not match {} nodes", n);
    }

    let points = to_canvas(layout, style);
    let radii = match attributes.size {
        Some(values) => node_radii(values, style.min_radius, style.max_radius),
        None => vec![style.min_radius; n],
    };
    let opacity = node_opacity(attributes.presence, n);

    let mut svg = Svg::new(style.width, style.height);
    svg.background("#ffffff");

    // Edges first so nodes are drawn on top
    for (a, b, _) in graph.undirected_edges() {
        let (x1, y1) = points[a as usize];
        let (x2, y2) = points[b as usize];
        svg.line(x1, y1, x2, y2, &style.edge_color, 0.6, style.edge_opacity);
    }

    for node in 0..n {
        let (x, y) = points[node];
        svg.circle(
            x,
            y,
            radii[node],
            categorical_color(attributes.category[node]),
            opacity[node],
        );
    }

    if let Some(title) = &style.title {
        svg.text(style.width as f64 / 2.0, style.margin / 2.0 + 6.0, 18.0, "middle", title);
    }

    Ok(svg)
}

/// Render the product space map to `path`
pub fn render_product_space(
    graph: &WeightedGraph,
    layout: &Layout,
    attributes: &NodeAttributes,
    style: &NetworkStyle,
    path: &Path,
) -> Result<()> {
    log::info!("Rendering product space with {} nodes", graph.node_count);
    product_space_svg(graph, layout, attributes, style)?.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;

    #[test]
    fn radii_are_scaled_and_clamped() {
        let radii = node_radii(&[Some(-1.0), Some(1.0), None, Some(0.0)], 2.0, 10.0);
        assert_eq!(radii, vec![2.0, 10.0, 2.0, 6.0]);
    }

    #[test]
    fn constant_values_get_mid_radius() {
        assert_eq!(node_radii(&[Some(5.0), Some(5.0)], 2.0, 10.0), vec![6.0, 6.0]);
    }

    #[test]
    fn absent_nodes_are_transparent() {
        assert_eq!(node_opacity(Some(&[true, false]), 2), vec![1.0, 0.0]);
        assert_eq!(node_opacity(None, 3), vec![1.0; 3]);
    }

    #[test]
    fn svg_has_one_circle_per_node_and_one_line_per_edge() {
        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("a", "b", 0.9);
        builder.add_edge("b", "c", 0.6);
        let graph = builder.build().unwrap();
        let layout = Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0], [1.0, 0.0], [2.0, 1.0]]);
        let attributes = NodeAttributes {
            category: &[0, 0, 1],
            size: None,
            presence: Some(&[true, false, true]),
        };

        let doc = product_space_svg(&graph, &layout, &attributes, &NetworkStyle::default())
            .unwrap()
            .finish();
        assert_eq!(doc.matches("<circle").count(), 3);
        assert_eq!(doc.matches("<line").count(), 2);
        assert!(doc.contains("fill-opacity=\"0.000\""));
    }

    #[test]
    fn mismatched_attributes_are_rejected() {
        let mut builder = GraphBuilder::with_capacity(2);
        builder.add_edge("a", "b", 0.9);
        let graph = builder.build().unwrap();
        let layout = Layout::new(graph.node_ids.clone(), vec![[0.0, 0.0], [1.0, 0.0]]);
        let attributes = NodeAttributes {
            category: &[0],
            size: None,
            presence: None,
        };

        assert!(product_space_svg(&graph, &layout, &attributes, &NetworkStyle::default()).is_err());
    }
}
