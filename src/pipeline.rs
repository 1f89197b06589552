//! Site Analyzer - Main coordinator for the control-vs-other comparison
//!
//! Reads every configured source once, then derives the merged dataset, one
//! comparison per variable and one control-group summary per variable.
//! Everything after the initial read is computed from immutable tables, so
//! variables can be analyzed in any order.

use crate::comparison::{compare, control_summary, ComparisonResult, ControlSummary};
use crate::config::{AnalysisConfig, ComparisonGranularity, SourceConfig};
use crate::data::{DatasetLoader, RawTable};
use crate::measurement::{AggregationMode, MeasurementTable};
use crate::merge::{merge, MergedDataset};
use crate::utils::GroupLabel;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Main site analyzer
pub struct SiteAnalyzer {
    config: AnalysisConfig,
    tables: Vec<(SourceConfig, RawTable)>,
}

/// Everything the reporting layer needs from one run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub control_marker: String,
    pub granularity: ComparisonGranularity,
    pub significance_alpha: f64,
    pub comparisons: Vec<ComparisonResult>,
    pub control_summaries: Vec<ControlSummary>,
    pub merged: MergedDataset,
}

impl SiteAnalyzer {
    /// Read every configured source from disk
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate().context("Invalid analysis configuration")?;

        let mut tables = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            let path = config.resolve(source);
            tracing::info!("Loading source '{}' from {:?}", source.name, path);
            let raw = RawTable::read(source, &path)
                .with_context(|| format!("Failed to load source '{}'", source.name))?;
            tracing::info!("  {}: {} rows", source.name, raw.frame().height());
            tables.push((source.clone(), raw));
        }

        Ok(Self { config, tables })
    }

    /// Build from tables already in memory, paired with sources by order
    pub fn from_tables(config: AnalysisConfig, raw_tables: Vec<RawTable>) -> Result<Self> {
        config.validate().context("Invalid analysis configuration")?;
        anyhow::ensure!(
            raw_tables.len() == config.sources.len(),
            "Expected {} tables, got {}",
            config.sources.len(),
            raw_tables.len()
        );

        let tables = config.sources.iter().cloned().zip(raw_tables).collect();
        Ok(Self { config, tables })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// One measurement table per configured variable, in configuration order
    pub fn measurement_tables(&self, mode: AggregationMode) -> Result<Vec<MeasurementTable>> {
        let loader = DatasetLoader::new(&self.config.classifier);

        let mut all = Vec::new();
        for (source, raw) in &self.tables {
            let tables = loader
                .load(raw, source, mode)
                .with_context(|| format!("Failed to normalize source '{}'", source.name))?;
            all.extend(tables);
        }
        Ok(all)
    }

    /// Outer join of all variables on location, one mean value per cell
    pub fn merged(&self) -> Result<MergedDataset> {
        let tables = self.measurement_tables(AggregationMode::MeanPerLocation)?;
        merge(&tables, &self.config.classifier).context("Failed to merge sources")
    }

    /// Compare control against other sites for every variable
    pub fn run(&self) -> Result<AnalysisReport> {
        let merged = self.merged()?;

        let grouped: Vec<(String, Vec<Option<f64>>, Vec<Option<f64>>)> =
            match self.config.granularity {
                ComparisonGranularity::PerLocation => merged
                    .variables()
                    .iter()
                    .map(|variable| {
                        let control = merged
                            .values_for(variable, GroupLabel::Control)
                            .unwrap_or_default();
                        let other = merged
                            .values_for(variable, GroupLabel::Other)
                            .unwrap_or_default();
                        (variable.clone(), control, other)
                    })
                    .collect(),
                ComparisonGranularity::Pooled => self
                    .measurement_tables(AggregationMode::KeepAll)?
                    .iter()
                    .map(|table| {
                        (
                            table.variable().to_string(),
                            table.values_for(GroupLabel::Control),
                            table.values_for(GroupLabel::Other),
                        )
                    })
                    .collect(),
            };

        let mut comparisons = Vec::with_capacity(grouped.len());
        let mut control_summaries = Vec::with_capacity(grouped.len());

        for (variable, control, other) in &grouped {
            comparisons.push(compare(variable, control, other, &self.config.comparison));
            control_summaries.push(control_summary(
                variable,
                control,
                self.config.cv_threshold_percent,
            ));
        }

        Ok(AnalysisReport {
            generated_at: Utc::now(),
            control_marker: self.config.classifier.control_marker.clone(),
            granularity: self.config.granularity,
            significance_alpha: self.config.significance_alpha,
            comparisons,
            control_summaries,
            merged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::TestUsed;
    use crate::config::ColumnMapping;
    use polars::prelude::*;
    use std::path::PathBuf;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            sources: vec![
                SourceConfig {
                    name: "culture".to_string(),
                    path: PathBuf::from("culture.csv"),
                    sheet: None,
                    location_column: "lokalizacja".to_string(),
                    columns: vec![ColumnMapping::new("sed", "sedimentation")],
                },
                SourceConfig {
                    name: "pcr".to_string(),
                    path: PathBuf::from("pcr.csv"),
                    sheet: None,
                    location_column: "Lokalizacja".to_string(),
                    columns: vec![ColumnMapping::new("SQ", "qPCR")],
                },
            ],
            ..AnalysisConfig::default()
        }
    }

    fn tables() -> Vec<RawTable> {
        let culture = df![
            "lokalizacja" => &["WPN", "WPN", "A", "A", "B", "C"],
            "sed" => &["1x10^2", "1,2×10^2", "4x10^2", "5x10^2", "6x10^2", "7x10^2"],
        ]
        .unwrap();
        let pcr = df![
            "Lokalizacja" => &["A", "D"],
            "SQ" => &["3.5", "4.5"],
        ]
        .unwrap();

        vec![
            RawTable::from_frame("culture", culture).unwrap(),
            RawTable::from_frame("pcr", pcr).unwrap(),
        ]
    }

    #[test]
    fn test_per_location_run() {
        let analyzer = SiteAnalyzer::from_tables(config(), tables()).unwrap();
        let report = analyzer.run().unwrap();

        assert_eq!(report.merged.len(), 5);
        assert_eq!(report.comparisons.len(), 2);

        let sed = &report.comparisons[0];
        assert_eq!(sed.variable, "sedimentation");
        assert_eq!((sed.group_a_n, sed.group_b_n), (1, 3));
        assert_eq!(sed.test_used, TestUsed::MannWhitneyU);

        // No control location carries a qPCR value
        let qpcr = &report.comparisons[1];
        assert!(qpcr.is_insufficient());
        assert_eq!(qpcr.p_value, None);

        assert_eq!(report.control_summaries.len(), 2);
        assert_eq!(report.control_summaries[0].n, 1);
    }

    #[test]
    fn test_pooled_run_keeps_repeats() {
        let mut config = config();
        config.granularity = ComparisonGranularity::Pooled;

        let analyzer = SiteAnalyzer::from_tables(config, tables()).unwrap();
        let report = analyzer.run().unwrap();

        let sed = &report.comparisons[0];
        assert_eq!((sed.group_a_n, sed.group_b_n), (2, 4));
        // Exact: 1 of C(6,2) = 15 arrangements puts both control values lowest
        assert!((sed.p_value.unwrap() - 1.0 / 15.0).abs() < 1e-12);

        assert_eq!(report.control_summaries[0].n, 2);
    }

    #[test]
    fn test_group_membership_ignores_spelling_and_order() {
        let upper = (
            SourceConfig {
                name: "culture".to_string(),
                path: PathBuf::from("culture.csv"),
                sheet: None,
                location_column: "site".to_string(),
                columns: vec![ColumnMapping::new("sed", "sedimentation")],
            },
            df![
                "site" => &["WPN 1", "WPN 1", "B"],
                "sed" => &["100", "120", "500"],
            ]
            .unwrap(),
        );
        let lower = (
            SourceConfig {
                name: "pcr".to_string(),
                path: PathBuf::from("pcr.csv"),
                sheet: None,
                location_column: "site".to_string(),
                columns: vec![ColumnMapping::new("SQ", "qPCR")],
            },
            df![
                "site" => &[" wpn  1 ", "C"],
                "SQ" => &["12.5", "40.0"],
            ]
            .unwrap(),
        );

        for order in [[&upper, &lower], [&lower, &upper]] {
            for granularity in [ComparisonGranularity::PerLocation, ComparisonGranularity::Pooled] {
                let config = AnalysisConfig {
                    sources: order.iter().map(|(s, _)| s.clone()).collect(),
                    granularity,
                    ..AnalysisConfig::default()
                };
                let raw = order
                    .iter()
                    .map(|(s, df)| RawTable::from_frame(s.name.clone(), df.clone()).unwrap())
                    .collect();

                let report = SiteAnalyzer::from_tables(config, raw).unwrap().run().unwrap();

                let by_variable = |name: &str| {
                    report
                        .comparisons
                        .iter()
                        .find(|c| c.variable == name)
                        .map(|c| (c.group_a_n, c.group_b_n))
                        .unwrap()
                };
                let expected_sed = match granularity {
                    ComparisonGranularity::PerLocation => (1, 1),
                    ComparisonGranularity::Pooled => (2, 1),
                };
                assert_eq!(by_variable("sedimentation"), expected_sed, "{:?}", granularity);
                assert_eq!(by_variable("qPCR"), (1, 1), "{:?}", granularity);

                let wpn = report
                    .merged
                    .rows()
                    .iter()
                    .find(|r| r.location.key() == "wpn 1")
                    .unwrap();
                assert_eq!(wpn.group, GroupLabel::Control);
            }
        }
    }

    #[test]
    fn test_table_count_must_match_sources() {
        let mut raw = tables();
        raw.pop();

        assert!(SiteAnalyzer::from_tables(config(), raw).is_err());
    }
}
