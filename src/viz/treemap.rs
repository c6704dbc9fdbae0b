//! Squarified two-level treemap (category, then item)

use crate::viz::svg::{categorical_color, Svg};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// One leaf of the treemap
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapItem {
    pub category: String,
    pub label: String,
    pub value: f64,
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// A laid-out leaf
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapCell {
    pub category: String,
    pub category_index: u32,
    pub label: String,
    pub value: f64,
    pub rect: Rect,
}

/// Worst aspect ratio of a row laid along a side of length `side`
fn worst_ratio(row: &[f64], side: f64) -> f64 {
    let sum: f64 = row.iter().sum();
    if sum <= 0.0 || side <= 0.0 {
        return f64::INFINITY;
    }
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = row.iter().copied().fold(f64::INFINITY, f64::min);
    let side2 = side * side;
    let sum2 = sum * sum;
    (side2 * max / sum2).max(sum2 / (side2 * min))
}

/// Squarified layout of `values` (sorted descending, all positive) inside `bounds`
pub fn squarify(values: &[f64], bounds: Rect) -> Vec<Rect> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 || bounds.area() <= 0.0 {
        return Vec::new();
    }

    // Scale values to areas
    let scale = bounds.area() / total;
    let areas: Vec<f64> = values.iter().map(|v| v * scale).collect();

    let mut out = Vec::with_capacity(areas.len());
    let mut free = bounds;
    let mut start = 0;

    while start < areas.len() {
        let side = free.w.min(free.h);
        let mut end = start + 1;
        while end < areas.len()
            && worst_ratio(&areas[start..=end], side) <= worst_ratio(&areas[start..end], side)
        {
            end += 1;
        }

        let row = &areas[start..end];
        let row_sum: f64 = row.iter().sum();

        if free.w >= free.h {
            // Column along the left edge
            let col_w = if free.h > 0.0 { row_sum / free.h } else { 0.0 };
            let mut y = free.y;
            for &area in row {
                let h = if col_w > 0.0 { area / col_w } else { 0.0 };
                out.push(Rect { x: free.x, y, w: col_w, h });
                y += h;
            }
            free.x += col_w;
            free.w = (free.w - col_w).max(0.0);
        } else {
            // Row along the top edge
            let row_h = if free.w > 0.0 { row_sum / free.w } else { 0.0 };
            let mut x = free.x;
            for &area in row {
                let w = if row_h > 0.0 { area / row_h } else { 0.0 };
                out.push(Rect { x, y: free.y, w, h: row_h });
                x += w;
            }
            free.y += row_h;
            free.h = (free.h - row_h).max(0.0);
        }

        start = end;
    }

    out
}

/// Lay out items grouped by category; categories and items are ordered by value
pub fn layout_treemap(items: &[TreemapItem], bounds: Rect) -> Vec<TreemapCell> {
    let mut groups: HashMap<&str, Vec<&TreemapItem>> = HashMap::new();
    for item in items.iter().filter(|i| i.value.is_finite() && i.value > 0.0) {
        groups.entry(item.category.as_str()).or_default().push(item);
    }

    let mut categories: Vec<(&str, f64, Vec<&TreemapItem>)> = groups
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by(|a, b| b.value.total_cmp(&a.value).then(a.label.cmp(&b.label)));
            let total = members.iter().map(|i| i.value).sum();
            (name, total, members)
        })
        .collect();
    categories.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));

    let totals: Vec<f64> = categories.iter().map(|c| c.1).collect();
    let category_rects = squarify(&totals, bounds);

    let mut cells = Vec::new();
    for (index, ((name, _, members), rect)) in categories.iter().zip(category_rects).enumerate() {
        let values: Vec<f64> = members.iter().map(|i| i.value).collect();
        for (item, item_rect) in members.iter().zip(squarify(&values, rect)) {
            cells.push(TreemapCell {
                category: name.to_string(),
                category_index: index as u32,
                label: item.label.clone(),
                value: item.value,
                rect: item_rect,
            });
        }
    }

    cells
}

/// Render a treemap as an SVG document
pub fn treemap_svg(items: &[TreemapItem], width: u32, height: u32, title: Option<&str>) -> Svg {
    let mut svg = Svg::new(width, height);
    svg.background("#ffffff");

    let top = if title.is_some() { 36.0 } else { 0.0 };
    let bounds = Rect {
        x: 0.0,
        y: top,
        w: width as f64,
        h: height as f64 - top,
    };

    if let Some(title) = title {
        svg.text(width as f64 / 2.0, 24.0, 18.0, "middle", title);
    }

    let total: f64 = items.iter().map(|i| i.value).filter(|v| *v > 0.0).sum();
    for cell in layout_treemap(items, bounds) {
        let r = cell.rect;
        svg.rect(r.x, r.y, r.w, r.h, categorical_color(cell.category_index), Some("#ffffff"));

        // Only label cells with room for text
        if r.w > 60.0 && r.h > 24.0 {
            let share = if total > 0.0 { 100.0 * cell.value / total } else { 0.0 };
            let max_chars = ((r.w - 8.0) / 6.5).max(1.0) as usize;
            let label: String = cell.label.chars().take(max_chars).collect();
            svg.text(r.x + 4.0, r.y + 14.0, 11.0, "start", &label);
            svg.text(r.x + 4.0, r.y + 27.0, 10.0, "start", &format!("{:.1}%", share));
        }
    }

    svg
}

/// Render a treemap to `path`
pub fn render_treemap(
    items: &[TreemapItem],
    width: u32,
    height: u32,
    title: Option<&str>,
    path: &Path,
) -> Result<()> {
    log::info!("Rendering treemap with {} items", items.len());
    treemap_svg(items, width, height, title).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, label: &str, value: f64) -> TreemapItem {
        TreemapItem {
            category: category.into(),
            label: label.into(),
            value,
        }
    }

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        let eps = 1e-9;
        a.x + eps < b.x + b.w && b.x + eps < a.x + a.w && a.y + eps < b.y + b.h && b.y + eps < a.y + a.h
    }

    #[test]
    fn squarify_areas_are_proportional() {
        let bounds = Rect { x: 0.0, y: 0.0, w: 6.0, h: 4.0 };
        let values = [6.0, 6.0, 4.0, 3.0, 2.0, 2.0, 1.0];
        let rects = squarify(&values, bounds);

        assert_eq!(rects.len(), values.len());
        for (rect, value) in rects.iter().zip(values) {
            assert!((rect.area() - value).abs() < 1e-9);
            assert!(rect.x >= -1e-9 && rect.y >= -1e-9);
            assert!(rect.x + rect.w <= 6.0 + 1e-9 && rect.y + rect.h <= 4.0 + 1e-9);
        }
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!overlaps(&rects[i], &rects[j]), "{:?} overlaps {:?}", rects[i], rects[j]);
            }
        }
    }

    #[test]
    fn categories_contain_their_items() {
        let items = vec![
            item("minerals", "Copper ore", 50.0),
            item("minerals", "Refined copper", 30.0),
            item("food", "Grapes", 15.0),
            item("food", "Salmon", 5.0),
            item("food", "Nothing", 0.0),
        ];
        let bounds = Rect { x: 0.0, y: 0.0, w: 100.0, h: 100.0 };
        let cells = layout_treemap(&items, bounds);

        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].category, "minerals");
        assert_eq!(cells[0].category_index, 0);
        let minerals: f64 = cells
            .iter()
            .filter(|c| c.category == "minerals")
            .map(|c| c.rect.area())
            .sum();
        assert!((minerals - 8000.0).abs() < 1e-6);
    }

    #[test]
    fn empty_treemap_renders_background_only() {
        let doc = treemap_svg(&[], 200, 100, None).finish();
        assert_eq!(doc.matches("<rect").count(), 1);
    }
}
