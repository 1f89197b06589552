//! DataFrame projection helpers with column validation
//!
//! Provides explicit patterns for pulling named columns out of a raw sheet so
//! that a renamed or dropped column surfaces as `MissingColumn` instead of a
//! silent empty result.

use crate::error::{AnalysisError, AnalysisResult};
use polars::prelude::*;
use std::collections::HashSet;

/// Materialize a DataFrame with exactly the listed columns
///
/// # Arguments
/// * `df` - Raw sheet
/// * `columns` - Required column names (already trimmed)
/// * `context` - Source name for error messages (e.g., "culture")
///
/// # Errors
/// Returns `MissingColumn` for the first required column the sheet lacks.
pub fn materialize_with_columns(
    df: &DataFrame,
    columns: &[&str],
    context: &str,
) -> AnalysisResult<DataFrame> {
    // VALIDATE before projecting so the error names the column
    let actual_cols: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for &expected in columns {
        if !actual_cols.contains(expected) {
            let mut available: Vec<String> = actual_cols.iter().cloned().collect();
            available.sort();
            return Err(AnalysisError::MissingColumn {
                source_name: context.to_string(),
                column: expected.to_string(),
                available,
            });
        }
    }

    let col_exprs: Vec<Expr> = columns.iter().map(|&name| col(name)).collect();

    let projected = df.clone().lazy().select(&col_exprs).collect()?;
    Ok(projected)
}

/// Read any column as optional text, one entry per row
///
/// Numeric columns (CSV inference, workbook floats) are cast to their string
/// form so that every cell passes through the same notation parser.
pub fn text_values(df: &DataFrame, name: &str) -> AnalysisResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    let as_text = column.cast(&DataType::String)?;

    let values = as_text
        .str()?
        .into_iter()
        .map(|opt| opt.map(|s| s.to_string()))
        .collect();

    Ok(values)
}

/// Strip surrounding whitespace from every header
pub fn trim_column_names(df: &mut DataFrame) -> AnalysisResult<()> {
    let trimmed: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();

    df.set_column_names(trimmed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_with_columns_success() {
        let df = df![
            "lokalizacja" => &["WPN", "Centrum"],
            "sedimentation" => &["3,6×10^2", "4x10^2"],
            "extra_col" => &["e1", "e2"],
        ]
        .unwrap();

        let materialized = materialize_with_columns(
            &df,
            &["lokalizacja", "sedimentation"],
            "test",
        )
        .unwrap();

        assert_eq!(materialized.width(), 2);
        assert_eq!(materialized.height(), 2);
    }

    #[test]
    fn test_materialize_with_columns_missing() {
        let df = df![
            "lokalizacja" => &["WPN"],
        ]
        .unwrap();

        let result = materialize_with_columns(&df, &["missing_column"], "culture");

        match result {
            Err(AnalysisError::MissingColumn { source_name, column, available }) => {
                assert_eq!(source_name, "culture");
                assert_eq!(column, "missing_column");
                assert_eq!(available, vec!["lokalizacja".to_string()]);
            }
            other => panic!("expected MissingColumn, got {:?}", other.map(|df| df.shape())),
        }
    }

    #[test]
    fn test_text_values_casts_numbers() {
        let df = df![
            "qPCR" => &[Some(1.5f64), None, Some(200.0)],
        ]
        .unwrap();

        let values = text_values(&df, "qPCR").unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values[1], None);
        assert_eq!(values[0].as_deref().and_then(|s| s.parse::<f64>().ok()), Some(1.5));
        assert_eq!(values[2].as_deref().and_then(|s| s.parse::<f64>().ok()), Some(200.0));
    }

    #[test]
    fn test_trim_column_names() {
        let mut df = df![
            " Lokalizacja " => &["WPN"],
        ]
        .unwrap();

        trim_column_names(&mut df).unwrap();

        assert_eq!(df.get_column_names()[0].as_str(), "Lokalizacja");
    }
}
