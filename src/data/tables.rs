//! Typed loading of the delimited input tables

use crate::config::{
    DataSource, ExportColumns, IndicatorColumns, ProductColumns, ProximityColumns,
};
use crate::data::fetch::ensure_local;
use crate::data::{CountryExport, Indicator, Product, ProximityEdge};
use crate::error::{LoadError, LoadResult};
use polars::prelude::*;
use std::path::Path;

/// Read a table into a DataFrame, choosing the reader from the file extension
pub fn read_frame(path: &Path) -> LoadResult<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    log::info!("Reading table: {}", path.display());

    let df = match extension.as_str() {
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?.collect()?,
        "tsv" | "tab" => read_delimited(path, b'\t')?,
        _ => read_delimited(path, b',')?,
    };

    log::debug!("Schema of {}: {:?}", path.display(), df.schema());
    log::info!("Loaded {} rows from {}", df.height(), path.display());

    Ok(df)
}

fn read_delimited(path: &Path, separator: u8) -> LoadResult<DataFrame> {
    // Everything is read as text so codes keep their leading zeros; numeric
    // columns are cast strictly afterwards
    let df = LazyCsvReader::new(path)
        .with_separator(separator)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;
    Ok(df)
}

/// Identifier column coerced to strings (numeric codes are accepted)
fn string_column(df: &DataFrame, name: &str, path: &Path) -> LoadResult<Vec<Option<String>>> {
    let column = df.column(name).map_err(|e| parse_error(path, name, e))?;
    let column = column
        .cast(&DataType::String)
        .map_err(|e| parse_error(path, name, e))?;
    let values = column.str().map_err(|e| parse_error(path, name, e))?;

    Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Numeric column; any value that is not a number is a parse error
fn float_column(df: &DataFrame, name: &str, path: &Path) -> LoadResult<Vec<Option<f64>>> {
    let column = df.column(name).map_err(|e| parse_error(path, name, e))?;
    let series = column
        .as_materialized_series()
        .strict_cast(&DataType::Float64)
        .map_err(|e| parse_error(path, name, e))?;
    let values = series.f64().map_err(|e| parse_error(path, name, e))?;

    Ok(values.into_iter().collect())
}

fn optional_float_column(
    df: &DataFrame,
    name: Option<&str>,
    path: &Path,
) -> LoadResult<Vec<Option<f64>>> {
    match name {
        Some(name) => float_column(df, name, path),
        None => Ok(vec![None; df.height()]),
    }
}

fn parse_error(path: &Path, column: &str, error: PolarsError) -> LoadError {
    LoadError::Parse {
        path: path.to_path_buf(),
        message: format!("column `{}`: {}", column, error),
    }
}

/// Load the proximity table as raw (not yet deduplicated) edges
pub fn load_proximity(
    source: &DataSource,
    columns: &ProximityColumns,
) -> LoadResult<Vec<ProximityEdge>> {
    let path = ensure_local(source)?;
    let df = read_frame(&path)?;

    let product_a = string_column(&df, &columns.product_a, &path)?;
    let product_b = string_column(&df, &columns.product_b, &path)?;
    let proximity = float_column(&df, &columns.proximity, &path)?;

    let mut edges = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for ((a, b), p) in product_a.into_iter().zip(product_b).zip(proximity) {
        match (a, b, p) {
            (Some(a), Some(b), Some(p)) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(LoadError::Parse {
                        path: path.clone(),
                        message: format!("proximity {} for {}-{} is outside [0, 1]", p, a, b),
                    });
                }
                edges.push(ProximityEdge::new(a, b, p));
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} proximity rows with missing values", skipped);
    }
    log::info!("Loaded {} proximity rows", edges.len());

    Ok(edges)
}

/// Load product metadata
pub fn load_products(source: &DataSource, columns: &ProductColumns) -> LoadResult<Vec<Product>> {
    let path = ensure_local(source)?;
    let df = read_frame(&path)?;

    let codes = string_column(&df, &columns.code, &path)?;
    let names = string_column(&df, &columns.name, &path)?;
    let pci = optional_float_column(&df, columns.pci.as_deref(), &path)?;
    let export_value = optional_float_column(&df, columns.export_value.as_deref(), &path)?;
    let categories = match columns.category.as_deref() {
        Some(name) => string_column(&df, name, &path)?,
        None => vec![None; df.height()],
    };

    let products: Vec<Product> = codes
        .into_iter()
        .zip(names)
        .zip(pci)
        .zip(export_value)
        .zip(categories)
        .filter_map(|((((code, name), pci), export_value), category)| {
            let code = code?;
            Some(Product {
                name: name.unwrap_or_else(|| code.clone()),
                code,
                pci,
                export_value,
                category,
            })
        })
        .collect();

    log::info!("Loaded {} products", products.len());
    Ok(products)
}

/// Load the country-product export table
pub fn load_exports(
    source: &DataSource,
    columns: &ExportColumns,
) -> LoadResult<Vec<CountryExport>> {
    let path = ensure_local(source)?;
    let df = read_frame(&path)?;

    let locations = string_column(&df, &columns.location, &path)?;
    let products = string_column(&df, &columns.product, &path)?;
    let values = float_column(&df, &columns.export_value, &path)?;
    let rca = float_column(&df, &columns.rca, &path)?;

    let exports: Vec<CountryExport> = locations
        .into_iter()
        .zip(products)
        .zip(values)
        .zip(rca)
        .filter_map(|(((location, product), value), rca)| {
            Some(CountryExport {
                location: location?,
                product: product?,
                export_value: value.unwrap_or(0.0),
                rca: rca.unwrap_or(0.0),
            })
        })
        .collect();

    log::info!("Loaded {} export records", exports.len());
    Ok(exports)
}

/// Load a per-country indicator table
pub fn load_indicators(
    source: &DataSource,
    columns: &IndicatorColumns,
) -> LoadResult<Vec<Indicator>> {
    let path = ensure_local(source)?;
    let df = read_frame(&path)?;

    let locations = string_column(&df, &columns.location, &path)?;
    let values = float_column(&df, &columns.value, &path)?;

    let indicators: Vec<Indicator> = locations
        .into_iter()
        .zip(values)
        .filter_map(|(location, value)| {
            Some(Indicator {
                location: location?,
                value: value?,
            })
        })
        .collect();

    log::info!("Loaded {} indicator values", indicators.len());
    Ok(indicators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> DataSource {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        DataSource::new(path, None)
    }

    #[test]
    fn numeric_product_codes_become_strings() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(
            dir.path(),
            "proximity.csv",
            "product_a,product_b,proximity\n101,102,0.5\n102,103,0.25\n",
        );

        let edges = load_proximity(&source, &ProximityColumns::default()).unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0], ProximityEdge::new("101", "102", 0.5));
    }

    #[test]
    fn tab_separated_tables_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(
            dir.path(),
            "products.tsv",
            "code\tname\tpci\n0101\tHorses\t-0.5\n0102\tCattle\t0.25\n",
        );

        let products = load_products(&source, &ProductColumns::default()).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].code, "0101");
        assert_eq!(products[1].name, "Cattle");
        assert_eq!(products[1].pci, Some(0.25));
    }

    #[test]
    fn non_numeric_proximity_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(
            dir.path(),
            "proximity.csv",
            "product_a,product_b,proximity\nA,B,high\n",
        );

        let result = load_proximity(&source, &ProximityColumns::default());
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn missing_column_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "proximity.csv", "a,b,c\nA,B,0.1\n");

        let result = load_proximity(&source, &ProximityColumns::default());
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn out_of_range_proximity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(
            dir.path(),
            "proximity.csv",
            "product_a,product_b,proximity\nA,B,1.5\n",
        );

        let result = load_proximity(&source, &ProximityColumns::default());
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn export_rows_carry_rca() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(
            dir.path(),
            "exports.csv",
            "location_code,product_code,export_value,export_rca\nCHL,2603,1000.0,12.5\nCHL,8703,10.0,0.01\n",
        );

        let exports = load_exports(&source, &ExportColumns::default()).unwrap();
        assert_eq!(exports.len(), 2);
        assert!(exports[0].has_advantage());
        assert!(!exports[1].has_advantage());
    }
}
