//! Minimal SVG document writer and color scales

use crate::storage::xml_escape;
use anyhow::Result;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Categorical palette (tab20 ordering)
pub const PALETTE: [&str; 20] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#aec7e8", "#ffbb78", "#98df8a", "#ff9896", "#c5b0d5", "#c49c94",
    "#f7b6d2", "#c7c7c7", "#dbdb8d", "#9edae5",
];

/// Fill used where a value is missing
pub const MISSING_COLOR: &str = "#d9d9d9";

/// Color of a categorical value, cycling through the palette
pub fn categorical_color(category: u32) -> &'static str {
    PALETTE[category as usize % PALETTE.len()]
}

/// Viridis anchor colors, evenly spaced over [0, 1]
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Sequential color for `t` in [0, 1] (clamped)
pub fn sequential_color(t: f64) -> String {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f64;

    let (r0, g0, b0) = VIRIDIS[lower];
    let (r1, g1, b1) = VIRIDIS[lower + 1];
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;

    format!("#{:02x}{:02x}{:02x}", mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

/// An SVG document assembled in memory
pub struct Svg {
    width: f64,
    height: f64,
    body: String,
}

impl Svg {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            body: String::new(),
        }
    }

    pub fn background(&mut self, fill: &str) {
        self.rect(0.0, 0.0, self.width, self.height, fill, None);
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str, opacity: f64) {
        let _ = writeln!(
            self.body,
            "  <circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\" fill-opacity=\"{:.3}\"/>",
            cx, cy, r, fill, opacity
        );
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str, width: f64, opacity: f64) {
        let _ = writeln!(
            self.body,
            "  <line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{:.2}\" stroke-opacity=\"{:.3}\"/>",
            x1, y1, x2, y2, stroke, width, opacity
        );
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, stroke: Option<&str>) {
        let stroke = stroke
            .map(|s| format!(" stroke=\"{}\" stroke-width=\"1\"", s))
            .unwrap_or_default();
        let _ = writeln!(
            self.body,
            "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"{}/>",
            x, y, w, h, fill, stroke
        );
    }

    /// A filled path; `d` must already be valid path data
    pub fn path(&mut self, d: &str, fill: &str, stroke: &str) {
        let _ = writeln!(
            self.body,
            "  <path d=\"{}\" fill=\"{}\" fill-rule=\"evenodd\" stroke=\"{}\" stroke-width=\"0.5\"/>",
            d, fill, stroke
        );
    }

    pub fn text(&mut self, x: f64, y: f64, size: f64, anchor: &str, content: &str) {
        let _ = writeln!(
            self.body,
            "  <text x=\"{:.2}\" y=\"{:.2}\" font-family=\"Arial, sans-serif\" font-size=\"{:.1}\" text-anchor=\"{}\">{}</text>",
            x, y, size, anchor, xml_escape(content)
        );
    }

    /// Horizontal color bar from `colors` (left to right)
    pub fn gradient_bar(&mut self, id: &str, x: f64, y: f64, w: f64, h: f64, colors: &[String]) {
        let _ = writeln!(self.body, "  <defs><linearGradient id=\"{}\">", id);
        let last = colors.len().saturating_sub(1).max(1) as f64;
        for (i, color) in colors.iter().enumerate() {
            let _ = writeln!(
                self.body,
                "    <stop offset=\"{:.3}\" stop-color=\"{}\"/>",
                i as f64 / last,
                color
            );
        }
        let _ = writeln!(self.body, "  </linearGradient></defs>");
        let _ = writeln!(
            self.body,
            "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"url(#{})\"/>",
            x, y, w, h, id
        );
    }

    pub fn finish(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.finish())?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}
