//! Loader error types

use std::path::PathBuf;
use thiserror::Error;

/// Failure while fetching or reading an input table
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input file not found and no download URL configured: {0}")]
    NotFound(PathBuf),

    #[error("failed to retrieve {url}: {source}")]
    Retrieval {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
