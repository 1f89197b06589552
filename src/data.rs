//! Data Loading and Normalization
//!
//! Reads workbook sheets and CSV exports into polars DataFrames of text
//! columns, then turns the mapped columns into `MeasurementTable`s.
//!
//! Every cell goes through the notation parser, so a value typed as
//! `3,6×10^2` in one sheet and stored as the number `360` in another end up
//! identical.

use crate::config::SourceConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::measurement::{AggregationMode, MeasurementRecord, MeasurementTable};
use crate::utils::{
    materialize_with_columns, parse_cell, text_values, trim_column_names, GroupClassifier,
    Location,
};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::Path;

/// A raw sheet: every column as optional text, headers trimmed
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    frame: DataFrame,
}

impl RawTable {
    /// Wrap an in-memory frame (headers are trimmed)
    pub fn from_frame(name: impl Into<String>, mut frame: DataFrame) -> AnalysisResult<Self> {
        trim_column_names(&mut frame)?;
        Ok(Self {
            name: name.into(),
            frame,
        })
    }

    /// Read a configured source from disk
    ///
    /// `.csv` goes through the polars CSV reader with type inference disabled;
    /// `.xlsx`, `.xlsm`, `.xls` and `.ods` go through calamine.
    pub fn read(source: &SourceConfig, path: &Path) -> AnalysisResult<Self> {
        fs::metadata(path).map_err(|e| AnalysisError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let frame = match extension.as_str() {
            "csv" => Self::read_csv(path)?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => {
                Self::read_sheet(path, source.sheet.as_deref())?
            }
            _ => {
                return Err(AnalysisError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        tracing::debug!(
            "Read {:?}: {} rows × {} columns",
            path,
            frame.height(),
            frame.width()
        );

        Self::from_frame(source.name.clone(), frame)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Load CSV with every column kept as text
    fn read_csv(path: &Path) -> AnalysisResult<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Load one workbook sheet; the first row is the header
    fn read_sheet(path: &Path, sheet: Option<&str>) -> AnalysisResult<DataFrame> {
        let workbook_error = |message: String| AnalysisError::Workbook {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
        let available = workbook.sheet_names();

        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => available
                .first()
                .cloned()
                .ok_or_else(|| workbook_error("workbook has no sheets".to_string()))?,
        };

        if !available.contains(&sheet_name) {
            return Err(AnalysisError::MissingSheet {
                path: path.to_path_buf(),
                sheet: sheet_name,
                available,
            });
        }

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| workbook_error(e.to_string()))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(DataFrame::empty());
        };

        let headers = unique_headers(header_row);
        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for row in rows {
            for (idx, values) in columns.iter_mut().enumerate() {
                values.push(row.get(idx).and_then(cell_text));
            }
        }

        let columns: Vec<Column> = headers
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::from(Series::new(name.into(), values)))
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

/// Cell content as text; empty and error cells have no text
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Header names, trimmed, with blanks named by position and repeats suffixed
fn unique_headers(row: &[Data]) -> Vec<String> {
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();

    row.iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell_text(cell)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("column_{}", idx + 1));

            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Turns raw sheets into measurement tables
///
/// Holds the shared classification rule so that every table labels its
/// locations the same way.
pub struct DatasetLoader<'a> {
    classifier: &'a GroupClassifier,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(classifier: &'a GroupClassifier) -> Self {
        Self { classifier }
    }

    /// Build one table per mapped column
    ///
    /// # Errors
    /// `MissingColumn` when the location column or any mapped column is not
    /// in the sheet. Unparseable cells are not errors.
    pub fn load(
        &self,
        table: &RawTable,
        source: &SourceConfig,
        mode: AggregationMode,
    ) -> AnalysisResult<Vec<MeasurementTable>> {
        // STEP 1: Project only the mapped columns (validates the schema)
        let location_column = source.location_column.trim();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let required: Vec<&str> = std::iter::once(location_column)
            .chain(source.columns.iter().map(|c| c.source.trim()))
            .filter(|name| seen.insert(*name))
            .collect();

        let selected = materialize_with_columns(table.frame(), &required, table.name())?;

        // STEP 2: Canonical locations and group labels, one per row
        let locations: Vec<Option<Location>> = text_values(&selected, location_column)?
            .iter()
            .map(|raw| raw.as_deref().and_then(Location::parse))
            .collect();

        let skipped = locations.iter().filter(|l| l.is_none()).count();
        if skipped > 0 {
            tracing::warn!(
                "{}: skipped {} row(s) without a location",
                table.name(),
                skipped
            );
        }

        // STEP 3: Parse each mapped column
        let mut tables = Vec::with_capacity(source.columns.len());
        for mapping in &source.columns {
            let values = text_values(&selected, mapping.source.trim())?;

            let mut unparsed = 0usize;
            let records: Vec<MeasurementRecord> = locations
                .iter()
                .zip(values.iter())
                .filter_map(|(location, raw)| {
                    let location = location.as_ref()?;
                    let value = parse_cell(raw.as_deref());
                    if value.is_none() && raw.as_deref().is_some_and(|s| !s.trim().is_empty()) {
                        unparsed += 1;
                    }
                    Some(MeasurementRecord {
                        location: location.clone(),
                        group: self.classifier.classify(location),
                        variable: mapping.variable.clone(),
                        value,
                    })
                })
                .collect();

            if unparsed > 0 {
                tracing::debug!(
                    "{}: {} cell(s) in '{}' could not be parsed and are treated as absent",
                    table.name(),
                    unparsed,
                    mapping.source
                );
            }

            let measurement = MeasurementTable::new(
                mapping.variable.clone(),
                table.name(),
                AggregationMode::KeepAll,
                records,
            );

            // STEP 4: Aggregate when the caller wants one row per location
            let measurement = match mode {
                AggregationMode::KeepAll => measurement,
                AggregationMode::MeanPerLocation => measurement.aggregate_mean(),
            };

            tracing::debug!(
                "{}: '{}' → {} record(s) ({:?})",
                table.name(),
                measurement.variable(),
                measurement.len(),
                mode
            );

            tables.push(measurement);
        }

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;
    use crate::utils::GroupLabel;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn culture_source() -> SourceConfig {
        SourceConfig {
            name: "culture".to_string(),
            path: PathBuf::from("culture.csv"),
            sheet: None,
            location_column: "lokalizacja".to_string(),
            columns: vec![ColumnMapping::new("sedymentacja", "sedimentation")],
        }
    }

    fn culture_table() -> RawTable {
        let df = df![
            " lokalizacja " => &[Some("WPN"), Some("Centrum"), Some("WPN "), None, Some("Centrum")],
            "sedymentacja" => &[Some("3,6×10^2"), Some("1.2x10**3"), Some("abc"), Some("5"), Some("800")],
        ]
        .unwrap();
        RawTable::from_frame("culture", df).unwrap()
    }

    #[test]
    fn test_load_keep_all() {
        let classifier = GroupClassifier::default();
        let loader = DatasetLoader::new(&classifier);

        let tables = loader
            .load(&culture_table(), &culture_source(), AggregationMode::KeepAll)
            .unwrap();

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.variable(), "sedimentation");
        // Row without a location is skipped
        assert_eq!(table.len(), 4);
        assert_eq!(table.values_for(GroupLabel::Control), vec![Some(360.0), None]);
        assert_eq!(table.values_for(GroupLabel::Other), vec![Some(1200.0), Some(800.0)]);
    }

    #[test]
    fn test_load_mean_per_location() {
        let classifier = GroupClassifier::default();
        let loader = DatasetLoader::new(&classifier);

        let tables = loader
            .load(&culture_table(), &culture_source(), AggregationMode::MeanPerLocation)
            .unwrap();

        let table = &tables[0];
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table.records()[0].value.unwrap(), 360.0);
        assert_relative_eq!(table.records()[1].value.unwrap(), 1000.0);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let classifier = GroupClassifier::default();
        let loader = DatasetLoader::new(&classifier);
        let mut source = culture_source();
        source.columns.push(ColumnMapping::new("płuczka", "scrubber"));

        let err = loader
            .load(&culture_table(), &source, AggregationMode::KeepAll)
            .unwrap_err();

        assert!(matches!(err, AnalysisError::MissingColumn { column, .. } if column == "płuczka"));
    }

    #[test]
    fn test_same_source_column_mapped_twice() {
        let classifier = GroupClassifier::default();
        let loader = DatasetLoader::new(&classifier);
        let df = df![
            "lokalizacja" => &["WPN", "Centrum"],
            "sedymentacja" => &["3,6×10^2", "800"],
            "płuczka" => &["1x10^2", "2x10^2"],
        ]
        .unwrap();
        let table = RawTable::from_frame("culture", df).unwrap();

        let mut source = culture_source();
        source.columns = vec![
            ColumnMapping::new("sedymentacja", "sedimentation"),
            ColumnMapping::new("płuczka", "scrubber"),
            ColumnMapping::new("sedymentacja", "sedimentation_copy"),
        ];

        let tables = loader
            .load(&table, &source, AggregationMode::KeepAll)
            .unwrap();

        assert_eq!(tables.len(), 3);
        assert_eq!(tables[2].variable(), "sedimentation_copy");
        assert_eq!(
            tables[2].values_for(GroupLabel::Other),
            tables[0].values_for(GroupLabel::Other)
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join(format!("bioaerosol_{}.txt", std::process::id()));
        fs::write(&path, "a,b\n").unwrap();

        let err = RawTable::read(&culture_source(), &path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(matches!(err, AnalysisError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RawTable::read(&culture_source(), Path::new("/nonexistent/culture.csv"))
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_unique_headers() {
        let row = vec![
            Data::String(" Lokalizacja ".to_string()),
            Data::Empty,
            Data::String("qPCR".to_string()),
            Data::String("qPCR".to_string()),
        ];

        assert_eq!(
            unique_headers(&row),
            vec!["Lokalizacja", "column_2", "qPCR", "qPCR.1"]
        );
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String("3,6×10^2".to_string())).as_deref(), Some("3,6×10^2"));
        assert_eq!(cell_text(&Data::Float(360.0)).and_then(|s| s.parse::<f64>().ok()), Some(360.0));
        assert_eq!(cell_text(&Data::Int(12)).as_deref(), Some("12"));
    }
}
