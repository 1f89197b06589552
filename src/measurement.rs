//! Measurement records and per-variable tables
//!
//! A `MeasurementTable` is the loader's output for one mapped column: an
//! ordered list of records that all share one variable name. Tables are never
//! updated in place; aggregation returns a new table.

use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::{GroupLabel, Location};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// How repeated rows for one location are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Every raw row survives (pooled group comparison)
    KeepAll,
    /// One row per location holding the mean of its present values
    MeanPerLocation,
}

/// One value for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub location: Location,
    pub group: GroupLabel,
    pub variable: String,
    /// Finite parsed value, or `None` when the cell was blank or unparseable
    pub value: Option<f64>,
}

/// Records for a single variable, in source row order
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementTable {
    variable: String,
    source: String,
    mode: AggregationMode,
    records: Vec<MeasurementRecord>,
}

impl MeasurementTable {
    pub fn new(
        variable: impl Into<String>,
        source: impl Into<String>,
        mode: AggregationMode,
        records: Vec<MeasurementRecord>,
    ) -> Self {
        Self {
            variable: variable.into(),
            source: source.into(),
            mode,
            records,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values (present or absent) of every record in `group`
    pub fn values_for(&self, group: GroupLabel) -> Vec<Option<f64>> {
        self.records
            .iter()
            .filter(|r| r.group == group)
            .map(|r| r.value)
            .collect()
    }

    /// Collapse repeated locations to the mean of their present values
    ///
    /// Locations keep first-appearance order. A location whose values are all
    /// absent stays in the table with an absent mean.
    pub fn aggregate_mean(&self) -> MeasurementTable {
        if self.mode == AggregationMode::MeanPerLocation {
            return self.clone();
        }

        let mut index: FxHashMap<&Location, usize> = FxHashMap::default();
        let mut sums: Vec<(&MeasurementRecord, f64, usize)> = Vec::new();

        for record in &self.records {
            let slot = *index.entry(&record.location).or_insert_with(|| {
                sums.push((record, 0.0, 0));
                sums.len() - 1
            });
            if let Some(value) = record.value {
                sums[slot].1 += value;
                sums[slot].2 += 1;
            }
        }

        let records = sums
            .into_iter()
            .map(|(first, sum, count)| {
                let mean = if count > 0 { Some(sum / count as f64) } else { None };
                MeasurementRecord {
                    location: first.location.clone(),
                    group: first.group,
                    variable: self.variable.clone(),
                    value: mean.filter(|v| v.is_finite()),
                }
            })
            .collect();

        MeasurementTable::new(
            self.variable.clone(),
            self.source.clone(),
            AggregationMode::MeanPerLocation,
            records,
        )
    }

    /// Fail if any location appears more than once
    pub fn ensure_unique_locations(&self) -> AnalysisResult<()> {
        let mut seen: FxHashSet<&Location> = FxHashSet::default();
        for record in &self.records {
            if !seen.insert(&record.location) {
                return Err(AnalysisError::DuplicateLocation {
                    variable: self.variable.clone(),
                    location: record.location.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(location: &str, group: GroupLabel, value: Option<f64>) -> MeasurementRecord {
        MeasurementRecord {
            location: Location::parse(location).unwrap(),
            group,
            variable: "sedimentation".to_string(),
            value,
        }
    }

    fn raw_table() -> MeasurementTable {
        MeasurementTable::new(
            "sedimentation",
            "culture",
            AggregationMode::KeepAll,
            vec![
                record("WPN", GroupLabel::Control, Some(100.0)),
                record("Centrum", GroupLabel::Other, Some(400.0)),
                record("wpn ", GroupLabel::Control, Some(200.0)),
                record("Centrum", GroupLabel::Other, None),
                record("Port", GroupLabel::Other, None),
            ],
        )
    }

    #[test]
    fn test_aggregate_mean_skips_absent() {
        let aggregated = raw_table().aggregate_mean();

        assert_eq!(aggregated.mode(), AggregationMode::MeanPerLocation);
        assert_eq!(aggregated.len(), 3);

        let records = aggregated.records();
        assert_eq!(records[0].location.display(), "WPN");
        assert_relative_eq!(records[0].value.unwrap(), 150.0);
        assert_relative_eq!(records[1].value.unwrap(), 400.0);
        assert_eq!(records[2].value, None);

        aggregated.ensure_unique_locations().unwrap();
    }

    #[test]
    fn test_keep_all_has_duplicates() {
        let table = raw_table();

        assert!(matches!(
            table.ensure_unique_locations(),
            Err(AnalysisError::DuplicateLocation { location, .. }) if location == "wpn"
        ));
    }

    #[test]
    fn test_values_for_group() {
        let table = raw_table();

        assert_eq!(table.values_for(GroupLabel::Control), vec![Some(100.0), Some(200.0)]);
        assert_eq!(table.values_for(GroupLabel::Other), vec![Some(400.0), None, None]);
    }
}
