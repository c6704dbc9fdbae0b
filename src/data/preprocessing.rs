//! Cleaning of the raw input tables before graph construction

use crate::data::{CountryExport, Product, ProximityEdge};
use std::collections::{HashMap, HashSet};

/// Drop self pairs and collapse duplicate pairs, keeping the first-seen value.
///
/// Pairs are unordered: `(A, B)` and `(B, A)` are the same edge.
pub fn deduplicate_edges(edges: &[ProximityEdge]) -> Vec<ProximityEdge> {
    let mut seen: HashSet<(&str, &str)> = HashSet::with_capacity(edges.len());
    let mut unique = Vec::with_capacity(edges.len());
    let mut self_loops = 0usize;
    let mut duplicates = 0usize;

    for edge in edges {
        if edge.is_self_loop() {
            self_loops += 1;
            continue;
        }

        let key = canonical_pair(&edge.product_a, &edge.product_b);
        if !seen.insert(key) {
            duplicates += 1;
            continue;
        }

        unique.push(edge.clone());
    }

    log::info!(
        "Kept {} unique edges ({} self pairs, {} duplicates dropped)",
        unique.len(),
        self_loops,
        duplicates
    );

    unique
}

fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Product codes referenced by at least one edge, in first-seen order
pub fn referenced_products(edges: &[ProximityEdge]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut codes = Vec::new();

    for edge in edges {
        for code in [&edge.product_a, &edge.product_b] {
            if seen.insert(code.as_str()) {
                codes.push(code.clone());
            }
        }
    }

    codes
}

/// Restrict metadata to the products present in the edge table.
///
/// The result is ordered like `codes`. Unreferenced metadata rows are dropped;
/// referenced products without a metadata row get a placeholder named after
/// their code.
pub fn restrict_products(products: &[Product], codes: &[String]) -> Vec<Product> {
    let mut by_code: HashMap<&str, &Product> = HashMap::with_capacity(products.len());
    for product in products {
        by_code.entry(product.code.as_str()).or_insert(product);
    }

    let mut missing = 0usize;
    let restricted: Vec<Product> = codes
        .iter()
        .map(|code| match by_code.get(code.as_str()) {
            Some(product) => (*product).clone(),
            None => {
                missing += 1;
                Product::unnamed(code)
            }
        })
        .collect();

    let dropped = by_code.len().saturating_sub(codes.len() - missing);
    if missing > 0 {
        log::warn!("{} referenced products have no metadata row", missing);
    }
    log::info!(
        "Restricted metadata to {} products ({} unreferenced rows dropped)",
        restricted.len(),
        dropped
    );

    restricted
}

/// Export records of one country
pub fn exports_for<'a>(exports: &'a [CountryExport], location: &str) -> Vec<&'a CountryExport> {
    exports
        .iter()
        .filter(|e| e.location.eq_ignore_ascii_case(location))
        .collect()
}

/// Products in which a country has revealed comparative advantage
pub fn advantage_set(exports: &[CountryExport], location: &str) -> HashSet<String> {
    exports_for(exports, location)
        .into_iter()
        .filter(|e| e.has_advantage())
        .map(|e| e.product.clone())
        .collect()
}
