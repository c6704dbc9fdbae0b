//! Input tables: proximity edges, product metadata, country exports

pub mod fetch;
pub mod preprocessing;
pub mod tables;

use serde::{Deserialize, Serialize};

/// One row of the proximity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEdge {
    pub product_a: String,
    pub product_b: String,
    /// Symmetric similarity in [0, 1]
    pub proximity: f64,
}

impl ProximityEdge {
    pub fn new(product_a: impl Into<String>, product_b: impl Into<String>, proximity: f64) -> Self {
        Self {
            product_a: product_a.into(),
            product_b: product_b.into(),
            proximity,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.product_a == self.product_b
    }
}

/// Product metadata row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    pub name: String,

    /// Product complexity index
    pub pci: Option<f64>,

    /// World export value
    pub export_value: Option<f64>,

    pub category: Option<String>,
}

impl Product {
    /// Placeholder for a product referenced by the proximity table only
    pub fn unnamed(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: code.to_string(),
            pci: None,
            export_value: None,
            category: None,
        }
    }

    /// Treemap grouping: explicit category, else the two-digit chapter of the code
    pub fn group(&self) -> String {
        match &self.category {
            Some(category) => category.clone(),
            None => self.code.chars().take(2).collect(),
        }
    }
}

/// One row of the country-product export table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryExport {
    pub location: String,
    pub product: String,
    pub export_value: f64,
    /// Revealed comparative advantage
    pub rca: f64,
}

impl CountryExport {
    /// Country exports the product with revealed comparative advantage
    pub fn has_advantage(&self) -> bool {
        self.rca >= 1.0
    }
}

/// One row of a per-country numeric indicator table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub location: String,
    pub value: f64,
}
