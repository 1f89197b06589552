//! Analysis Configuration
//!
//! Column mappings, the control-site marker and every threshold the pipeline
//! uses. Loaded from JSON or taken from `AnalysisConfig::default()`, which
//! reproduces the outdoor-air field study: a culture workbook (sedimentation and
//! scrubber counts) and a qPCR/dPCR summary workbook.

use crate::comparison::ComparisonConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::utils::GroupClassifier;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How repeated rows for one location feed the group comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonGranularity {
    /// One mean value per location, taken from the merged dataset
    #[default]
    PerLocation,
    /// Every raw row, pooled per group
    Pooled,
}

/// One raw column and the variable name it becomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Header text in the source sheet
    pub source: String,
    /// Variable name used in the merged dataset and reports
    pub variable: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            variable: variable.into(),
        }
    }
}

/// One tabular input (workbook sheet or CSV file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short name used in logs and errors
    pub name: String,
    /// File path; relative paths resolve against the data directory
    pub path: PathBuf,
    /// Sheet name for workbooks. Ignored for CSV.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Header of the sampling-site column
    pub location_column: String,
    pub columns: Vec<ColumnMapping>,
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base directory for relative source paths
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub classifier: GroupClassifier,

    #[serde(default)]
    pub comparison: ComparisonConfig,

    #[serde(default)]
    pub granularity: ComparisonGranularity,

    /// Control-group CV (%) strictly below this is "low variability"
    #[serde(default = "default_cv_threshold")]
    pub cv_threshold_percent: f64,

    /// p-value below which a comparison is reported as significant
    #[serde(default = "default_significance_alpha")]
    pub significance_alpha: f64,

    /// Per-location averages are reported in units of 10^scale_exponent
    #[serde(default = "default_scale_exponent")]
    pub scale_exponent: i32,

    pub sources: Vec<SourceConfig>,
}

fn default_cv_threshold() -> f64 {
    15.0
}

fn default_significance_alpha() -> f64 {
    0.05
}

fn default_scale_exponent() -> i32 {
    2
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            classifier: GroupClassifier::default(),
            comparison: ComparisonConfig::default(),
            granularity: ComparisonGranularity::default(),
            cv_threshold_percent: default_cv_threshold(),
            significance_alpha: default_significance_alpha(),
            scale_exponent: default_scale_exponent(),
            sources: vec![
                SourceConfig {
                    name: "culture".to_string(),
                    path: PathBuf::from("Wyniki_powietrze-3.xlsx"),
                    sheet: Some("Powietrze zewnętrzne-dane".to_string()),
                    location_column: "lokalizacja".to_string(),
                    columns: vec![
                        ColumnMapping::new(
                            "Ogólna Liczba drobnoustrojów/m3 -sedymentacja",
                            "sedimentation",
                        ),
                        ColumnMapping::new("Ogólna liczba drobnoustrojów/m3-płuczka", "scrubber"),
                    ],
                },
                SourceConfig {
                    name: "pcr".to_string(),
                    path: PathBuf::from("podsumowanie obliczeń dPCR, qPCR.xlsx"),
                    sheet: Some("Arkusz1".to_string()),
                    location_column: "Lokalizacja".to_string(),
                    columns: vec![
                        ColumnMapping::new("qPCR Starting Quantity (SQ) Mean", "qPCR"),
                        ColumnMapping::new("sec, mean DNA amount for m3", "dPCR_sec"),
                        ColumnMapping::new("regA, mean DNA amount for m3", "dPCR_regA"),
                    ],
                },
            ],
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file
    ///
    /// When the file sets no `data_dir`, source paths resolve against the
    /// directory containing the config file.
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: AnalysisConfig =
            serde_json::from_str(&contents).map_err(|source| AnalysisError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.data_dir.is_none() {
            config.data_dir = path.parent().map(Path::to_path_buf);
        }

        config.validate()?;
        Ok(config)
    }

    /// Override the data directory (CLI flag or `DATA_DIR`)
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Resolve a source path against the data directory
    pub fn resolve(&self, source: &SourceConfig) -> PathBuf {
        match &self.data_dir {
            Some(dir) if source.path.is_relative() => dir.join(&source.path),
            _ => source.path.clone(),
        }
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.sources.is_empty() {
            return Err(AnalysisError::InvalidConfig("no sources configured".to_string()));
        }

        if self.classifier.control_marker.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "control marker must not be empty".to_string(),
            ));
        }

        let mut variables = FxHashSet::default();
        for source in &self.sources {
            if source.columns.is_empty() {
                return Err(AnalysisError::InvalidConfig(format!(
                    "source '{}' maps no columns",
                    source.name
                )));
            }
            for mapping in &source.columns {
                if !variables.insert(mapping.variable.as_str()) {
                    return Err(AnalysisError::DuplicateVariable {
                        variable: mapping.variable.clone(),
                    });
                }
            }
        }

        for (name, alpha) in [
            ("significance_alpha", self.significance_alpha),
            ("comparison.normality_alpha", self.comparison.normality_alpha),
        ] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{} must lie in (0, 1), got {}",
                    name, alpha
                )));
            }
        }

        if !(self.cv_threshold_percent.is_finite() && self.cv_threshold_percent > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "cv_threshold_percent must be positive, got {}",
                self.cv_threshold_percent
            )));
        }

        Ok(())
    }

    /// All variable names in configuration order
    pub fn variables(&self) -> Vec<&str> {
        self.sources
            .iter()
            .flat_map(|s| s.columns.iter().map(|c| c.variable.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();

        assert_eq!(
            config.variables(),
            vec!["sedimentation", "scrubber", "qPCR", "dPCR_sec", "dPCR_regA"]
        );
        assert_eq!(config.classifier.control_marker, "WPN");
        assert_eq!(config.cv_threshold_percent, 15.0);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "classifier": { "control_marker": "REF" },
            "sources": [
                {
                    "name": "a",
                    "path": "a.csv",
                    "location_column": "site",
                    "columns": [ { "source": "count", "variable": "count" } ]
                }
            ]
        }"#;

        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.classifier.control_marker, "REF");
        assert_eq!(config.classifier.control_label, "WPN (control)");
        assert_eq!(config.significance_alpha, 0.05);
        assert_eq!(config.granularity, ComparisonGranularity::PerLocation);
        assert_eq!(config.comparison.min_normality_size, 3);
        assert_eq!(config.scale_exponent, 2);
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut config = AnalysisConfig::default();
        config.sources[1].columns[0].variable = "sedimentation".to_string();

        assert!(matches!(
            config.validate(),
            Err(AnalysisError::DuplicateVariable { variable }) if variable == "sedimentation"
        ));
    }

    #[test]
    fn test_bad_alpha_rejected() {
        let mut config = AnalysisConfig::default();
        config.significance_alpha = 1.5;

        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = AnalysisConfig::default().with_data_dir("/data/air");
        let resolved = config.resolve(&config.sources[0]);

        assert_eq!(resolved, PathBuf::from("/data/air/Wyniki_powietrze-3.xlsx"));
    }
}
