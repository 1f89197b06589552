//! Error types for loading and merging measurement sources
//!
//! Only structural problems live here (bad schema, unreadable files,
//! duplicate keys). A cell that fails to parse is never an error: it becomes
//! an absent value. Insufficient data for a test is a normal outcome and is
//! encoded in `ComparisonResult`.

use std::path::PathBuf;
use thiserror::Error;

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("sheet '{sheet}' not found in {path:?}. Available sheets: {available:?}")]
    MissingSheet {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },

    #[error("{source_name}: missing expected column '{column}'. Available columns: {available:?}")]
    MissingColumn {
        source_name: String,
        column: String,
        available: Vec<String>,
    },

    #[error("unsupported table format for {path:?} (expected .csv, .xlsx, .xlsm, .xls or .ods)")]
    UnsupportedFormat { path: PathBuf },

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("variable '{variable}' has more than one row for location '{location}'; aggregate per location before merging")]
    DuplicateLocation { variable: String, location: String },

    #[error("variable '{variable}' is provided by more than one table")]
    DuplicateVariable { variable: String },

    #[error("failed to parse config {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
