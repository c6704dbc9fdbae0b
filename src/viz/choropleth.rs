//! Choropleth world map: a numeric value joined onto GeoJSON polygons

use crate::viz::svg::{sequential_color, Svg, MISSING_COLOR};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Ring of (lon, lat) points
type Ring = Vec<(f64, f64)>;

/// A named area made of one or more polygons (each a list of rings)
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub key: String,
    pub polygons: Vec<Vec<Ring>>,
}

/// Outcome of joining values onto regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    pub regions: usize,
    pub matched: usize,
}

fn parse_ring(value: &Value) -> Option<Ring> {
    value
        .as_array()?
        .iter()
        .map(|point| {
            let point = point.as_array()?;
            Some((point.first()?.as_f64()?, point.get(1)?.as_f64()?))
        })
        .collect()
}

fn parse_polygon(value: &Value) -> Option<Vec<Ring>> {
    value.as_array()?.iter().map(parse_ring).collect()
}

/// Regions of a GeoJSON FeatureCollection keyed by the `key` property.
///
/// Features without the key or without Polygon/MultiPolygon geometry are skipped.
pub fn parse_regions(geojson: &Value, key: &str) -> Result<Vec<Region>> {
    let features = geojson
        .get("features")
        .and_then(Value::as_array)
        .context("GeoJSON has no `features` array")?;

    let mut regions = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for feature in features {
        let name = feature
            .get("properties")
            .and_then(|p| p.get(key))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        let geometry = feature.get("geometry");
        let kind = geometry.and_then(|g| g.get("type")).and_then(Value::as_str);
        let coordinates = geometry.and_then(|g| g.get("coordinates"));

        let polygons = match (kind, coordinates) {
            (Some("Polygon"), Some(c)) => parse_polygon(c).map(|p| vec![p]),
            (Some("MultiPolygon"), Some(c)) => c
                .as_array()
                .and_then(|polys| polys.iter().map(parse_polygon).collect()),
            _ => None,
        };

        match (name, polygons) {
            (Some(key), Some(polygons)) => regions.push(Region { key, polygons }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} GeoJSON features without `{}` or polygon geometry", skipped, key);
    }
    log::info!("Parsed {} regions", regions.len());

    Ok(regions)
}

/// Equirectangular projection onto a `width` x `height` canvas
fn project(lon: f64, lat: f64, width: f64, height: f64) -> (f64, f64) {
    ((lon + 180.0) / 360.0 * width, (90.0 - lat) / 180.0 * height)
}

fn path_data(polygons: &[Vec<Ring>], width: f64, height: f64) -> String {
    let mut d = String::new();
    for ring in polygons.iter().flatten() {
        for (i, &(lon, lat)) in ring.iter().enumerate() {
            let (x, y) = project(lon, lat, width, height);
            let command = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{}{:.2},{:.2} ", command, x, y);
        }
        d.push('Z');
    }
    d
}

/// Render regions colored by `values`; regions without a value are grey
pub fn choropleth_svg(
    regions: &[Region],
    values: &HashMap<String, f64>,
    width: u32,
    height: u32,
    title: Option<&str>,
) -> (Svg, JoinStats) {
    let legend = 50.0;
    let map_w = width as f64;
    let map_h = (height as f64 - legend).max(1.0);

    let finite = values.values().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let scale = |v: f64| {
        if hi > lo {
            (v - lo) / (hi - lo)
        } else {
            0.5
        }
    };

    let mut svg = Svg::new(width, height);
    svg.background("#ffffff");

    let mut matched = 0usize;
    for region in regions {
        let fill = match values.get(&region.key) {
            Some(&v) if v.is_finite() => {
                matched += 1;
                sequential_color(scale(v))
            }
            _ => MISSING_COLOR.to_string(),
        };
        svg.path(&path_data(&region.polygons, map_w, map_h), &fill, "#ffffff");
    }

    // Legend
    if lo.is_finite() && hi.is_finite() {
        let stops: Vec<String> = (0..=10).map(|i| sequential_color(i as f64 / 10.0)).collect();
        let bar_w = map_w / 3.0;
        let bar_x = (map_w - bar_w) / 2.0;
        let bar_y = map_h + 12.0;
        svg.gradient_bar("scale", bar_x, bar_y, bar_w, 12.0, &stops);
        svg.text(bar_x - 6.0, bar_y + 11.0, 11.0, "end", &format!("{:.2}", lo));
        svg.text(bar_x + bar_w + 6.0, bar_y + 11.0, 11.0, "start", &format!("{:.2}", hi));
    }

    if let Some(title) = title {
        svg.text(map_w / 2.0, 22.0, 18.0, "middle", title);
    }

    let stats = JoinStats {
        regions: regions.len(),
        matched,
    };
    (svg, stats)
}

/// Render a choropleth to `path`
pub fn render_choropleth(
    geojson: &Value,
    key: &str,
    values: &HashMap<String, f64>,
    width: u32,
    height: u32,
    title: Option<&str>,
    path: &Path,
) -> Result<JoinStats> {
    let regions = parse_regions(geojson, key)?;
    let (svg, stats) = choropleth_svg(&regions, values, width, height, title);

    log::info!(
        "Rendering choropleth: {} of {} regions have a value",
        stats.matched,
        stats.regions
    );
    if stats.matched < values.len() {
        log::warn!(
            "{} values did not match any region",
            values.len() - stats.matched.min(values.len())
        );
    }

    svg.save(path)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "ISO_A3": "CHL" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-70.0, -20.0], [-68.0, -20.0], [-68.0, -50.0], [-70.0, -20.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "ISO_A3": "JPN" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[130.0, 31.0], [132.0, 33.0], [131.0, 34.0], [130.0, 31.0]]],
                            [[[140.0, 36.0], [141.0, 41.0], [139.0, 38.0], [140.0, 36.0]]]
                        ]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "NAME": "Nowhere" },
                    "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
                }
            ]
        })
    }

    #[test]
    fn regions_are_parsed_by_key() {
        let regions = parse_regions(&sample(), "ISO_A3").unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].key, "CHL");
        assert_eq!(regions[1].polygons.len(), 2);
    }

    #[test]
    fn values_are_joined_and_missing_regions_are_grey() {
        let regions = parse_regions(&sample(), "ISO_A3").unwrap();
        let values: HashMap<String, f64> = [("CHL".to_string(), 0.3)].into_iter().collect();

        let (svg, stats) = choropleth_svg(&regions, &values, 360, 230, None);
        assert_eq!(stats, JoinStats { regions: 2, matched: 1 });

        let doc = svg.finish();
        assert_eq!(doc.matches("<path").count(), 2);
        assert!(doc.contains(MISSING_COLOR));
    }

    #[test]
    fn projection_maps_corners() {
        assert_eq!(project(-180.0, 90.0, 360.0, 180.0), (0.0, 0.0));
        assert_eq!(project(180.0, -90.0, 360.0, 180.0), (360.0, 180.0));
        assert_eq!(project(0.0, 0.0, 360.0, 180.0), (180.0, 90.0));
    }

    #[test]
    fn collection_without_features_is_an_error() {
        assert!(parse_regions(&json!({ "type": "Feature" }), "ISO_A3").is_err());
    }
}
