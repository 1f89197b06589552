//! Bioaerosol Site Comparison
//!
//! Compares airborne bacteria measurements at a control site against all
//! other sampling sites, across several measurement methods (culture counts
//! by sedimentation and scrubber, qPCR, dPCR).
//!
//! Module layout:
//! - `utils/`: notation parsing, location keys, frame helpers
//! - `data`: workbook/CSV reading and normalization with Polars
//! - `measurement`, `merge`: per-variable tables and the location join
//! - `stats/`: Shapiro-Wilk, Welch t-test, Mann-Whitney U, descriptive stats
//! - `comparison`: normality-gated test selection and control summaries
//! - `pipeline`: end-to-end coordinator
//! - `report`: console, JSON and CSV output

pub mod error;
pub mod config;
pub mod utils;
pub mod measurement;
pub mod data;
pub mod merge;
pub mod stats;
pub mod comparison;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use error::{AnalysisError, AnalysisResult};
pub use config::{AnalysisConfig, ColumnMapping, ComparisonGranularity, SourceConfig};
pub use utils::{parse_notation, GroupClassifier, GroupLabel, Location};
pub use measurement::{AggregationMode, MeasurementRecord, MeasurementTable};
pub use data::{DatasetLoader, RawTable};
pub use merge::{merge, MergedDataset, MergedRow};
pub use stats::Alternative;
pub use comparison::{
    compare, control_summary, ComparisonConfig, ComparisonResult, ControlSummary, TestUsed,
    Variability,
};
pub use pipeline::{AnalysisReport, SiteAnalyzer};
pub use report::{location_averages, LocationAverage};
