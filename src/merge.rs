//! Cross-Source Merger
//!
//! Full outer join of per-variable tables on the canonical location key. A
//! location present in any table appears exactly once; variables from tables
//! that lack it stay absent (never zero).

use crate::error::{AnalysisError, AnalysisResult};
use crate::measurement::MeasurementTable;
use crate::utils::{GroupClassifier, GroupLabel, Location};
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// One location with one optional value per variable
#[derive(Debug, Clone, Serialize)]
pub struct MergedRow {
    pub location: Location,
    pub group: GroupLabel,
    /// Same order as `MergedDataset::variables`
    pub values: Vec<Option<f64>>,
}

/// Sparse location × variable table
#[derive(Debug, Clone, Serialize)]
pub struct MergedDataset {
    variables: Vec<String>,
    rows: Vec<MergedRow>,
}

impl MergedDataset {
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn variable_index(&self, variable: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == variable)
    }

    /// Value for one cell; `None` for an unknown variable or location as well
    pub fn value(&self, location: &Location, variable: &str) -> Option<f64> {
        let idx = self.variable_index(variable)?;
        self.rows
            .iter()
            .find(|row| &row.location == location)
            .and_then(|row| row.values[idx])
    }

    /// All values of `variable` for locations in `group` (absent included)
    ///
    /// Returns `None` when the dataset has no such variable.
    pub fn values_for(&self, variable: &str, group: GroupLabel) -> Option<Vec<Option<f64>>> {
        let idx = self.variable_index(variable)?;
        Some(
            self.rows
                .iter()
                .filter(|row| row.group == group)
                .map(|row| row.values[idx])
                .collect(),
        )
    }

    /// Export for downstream reporting: `location`, `group`, then one
    /// Float64 column per variable with nulls where absent
    pub fn to_dataframe(&self, classifier: &GroupClassifier) -> AnalysisResult<DataFrame> {
        let locations: Vec<String> = self
            .rows
            .iter()
            .map(|row| row.location.display().to_string())
            .collect();
        let groups: Vec<String> = self
            .rows
            .iter()
            .map(|row| classifier.label(row.group).to_string())
            .collect();

        let mut columns = vec![
            Column::from(Series::new("location".into(), locations)),
            Column::from(Series::new("group".into(), groups)),
        ];

        for (idx, variable) in self.variables.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|row| row.values[idx]).collect();
            columns.push(Column::from(Series::new(variable.as_str().into(), values)));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Outer-join tables on location
///
/// Row order is first appearance: table order, then record order.
///
/// # Errors
/// - `DuplicateVariable` when two tables carry the same variable
/// - `DuplicateLocation` when a table was not aggregated per location
pub fn merge(
    tables: &[MeasurementTable],
    classifier: &GroupClassifier,
) -> AnalysisResult<MergedDataset> {
    let mut seen_variables: FxHashSet<&str> = FxHashSet::default();
    for table in tables {
        if !seen_variables.insert(table.variable()) {
            return Err(AnalysisError::DuplicateVariable {
                variable: table.variable().to_string(),
            });
        }
        table.ensure_unique_locations()?;
    }

    let variables: Vec<String> = tables.iter().map(|t| t.variable().to_string()).collect();
    let width = variables.len();

    let mut index: FxHashMap<Location, usize> = FxHashMap::default();
    let mut rows: Vec<MergedRow> = Vec::new();

    for (var_idx, table) in tables.iter().enumerate() {
        for record in table.records() {
            let row_idx = *index.entry(record.location.clone()).or_insert_with(|| {
                rows.push(MergedRow {
                    location: record.location.clone(),
                    group: GroupLabel::Other,
                    values: vec![None; width],
                });
                rows.len() - 1
            });
            rows[row_idx].values[var_idx] = record.value;
        }
    }

    // Labels come from the merged location, never from either input side
    for row in &mut rows {
        row.group = classifier.classify(&row.location);
    }

    tracing::debug!(
        "Merged {} table(s) into {} location(s) × {} variable(s)",
        tables.len(),
        rows.len(),
        width
    );

    Ok(MergedDataset { variables, rows })
}
