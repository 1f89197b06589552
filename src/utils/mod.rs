//! Utility modules for measurement loading
//!
//! Contains shared functionality used by the loader and the merger:
//! - Notation: scientific-notation cell parsing
//! - Location: canonical site keys and control-site classification
//! - Frame helpers: column projection with validation

pub mod notation;
pub mod location;
pub mod frame_helpers;

// Re-export commonly used types
pub use notation::{parse_notation, parse_cell};
pub use location::{Location, GroupLabel, GroupClassifier};
pub use frame_helpers::{materialize_with_columns, text_values, trim_column_names};
