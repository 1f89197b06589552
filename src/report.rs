//! Reporting Adapter
//!
//! Turns an `AnalysisReport` into console text, a JSON document, and CSV
//! exports. No charts: downstream plotting tools read the CSV/JSON output.
//!
//! Also builds the per-location averages table (every variable for every
//! location, scaled to a common power of ten and ordered by total).

use crate::comparison::{TestUsed, Variability};
use crate::error::{AnalysisError, AnalysisResult};
use crate::merge::MergedDataset;
use crate::pipeline::AnalysisReport;
use crate::utils::GroupClassifier;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// One location's values in units of 10^scale_exponent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationAverage {
    pub location: String,
    pub group: String,
    /// Same order as `MergedDataset::variables`
    pub scaled: Vec<Option<f64>>,
    /// Sum of the present scaled values (0 when none are present)
    pub total: f64,
}

/// Per-location averages sorted ascending by total
pub fn location_averages(
    merged: &MergedDataset,
    classifier: &GroupClassifier,
    scale_exponent: i32,
) -> Vec<LocationAverage> {
    let divisor = 10f64.powi(scale_exponent);

    let mut rows: Vec<LocationAverage> = merged
        .rows()
        .iter()
        .map(|row| {
            let scaled: Vec<Option<f64>> =
                row.values.iter().map(|v| v.map(|x| x / divisor)).collect();
            let total = scaled.iter().flatten().sum();
            LocationAverage {
                location: row.location.display().to_string(),
                group: classifier.label(row.group).to_string(),
                scaled,
                total,
            }
        })
        .collect();

    // Stable: ties keep merge order
    rows.sort_by(|a, b| a.total.total_cmp(&b.total));
    rows
}

/// Console summary of every comparison and control summary
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let alpha = report.significance_alpha;

    out.push_str(&format!(
        "Control marker: '{}' | granularity: {:?} | α = {}\n",
        report.control_marker, report.granularity, alpha
    ));
    out.push_str(&format!("Locations: {}\n", report.merged.len()));

    for (comparison, summary) in report.comparisons.iter().zip(&report.control_summaries) {
        out.push('\n');
        out.push_str(&format!(
            "ANALYSIS: {}\n",
            comparison.variable.to_uppercase()
        ));
        out.push_str(&"-".repeat(40));
        out.push('\n');
        out.push_str(&format!(
            "Samples: control = {}, other = {}\n",
            comparison.group_a_n, comparison.group_b_n
        ));

        match (comparison.normality_p_a, comparison.normality_p_b) {
            (Some(pa), Some(pb)) => {
                out.push_str(&format!(
                    "Shapiro-Wilk (control): p = {:.4} {}\n",
                    pa,
                    normal_word(comparison.normality_a)
                ));
                out.push_str(&format!(
                    "Shapiro-Wilk (other): p = {:.4} {}\n",
                    pb,
                    normal_word(comparison.normality_b)
                ));
            }
            _ if comparison.test_used != TestUsed::Insufficient => {
                out.push_str(
                    "Not enough data for Shapiro normality test. Using nonparametric test.\n",
                );
            }
            _ => {}
        }

        match comparison.p_value {
            Some(p) => out.push_str(&format!("{}: p = {:.4}\n", comparison.test_used, p)),
            None => out.push_str(&format!("{}\n", TestUsed::Insufficient)),
        }

        if comparison.is_significant(alpha) {
            out.push_str("Control has significantly fewer bacteria\n");
        } else {
            out.push_str("No significant difference or insufficient data\n");
        }

        match (summary.mean, summary.std_dev, summary.cv_percent) {
            (Some(mean), Some(sd), cv) => {
                out.push_str(&format!("Mean (control): {:.2}\n", mean));
                out.push_str(&format!("Standard deviation: {:.2}\n", sd));
                match cv {
                    Some(cv) => out.push_str(&format!("CV% (control): {:.2}%\n", cv)),
                    None => out.push_str("CV% (control): undefined (zero mean)\n"),
                }
            }
            _ => out.push_str("Not enough data to calculate CV for control\n"),
        }

        match summary.variability {
            Variability::Low => out.push_str("Low variability – good control\n"),
            Variability::High => out.push_str("High variability – control may be unstable\n"),
            Variability::Undetermined => {}
        }
    }

    out
}

fn normal_word(normal: bool) -> &'static str {
    if normal {
        "normal"
    } else {
        "not normal"
    }
}

/// Fixed-width table of per-location averages
pub fn render_averages_text(
    variables: &[String],
    rows: &[LocationAverage],
    scale_exponent: i32,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Average bacterial amount per location (×10^{})\n",
        scale_exponent
    ));

    out.push_str(&format!("{:<24}{:<18}", "location", "group"));
    for variable in variables {
        out.push_str(&format!("{:>14}", variable));
    }
    out.push('\n');

    for row in rows {
        out.push_str(&format!("{:<24}{:<18}", row.location, row.group));
        for value in &row.scaled {
            match value {
                Some(v) => out.push_str(&format!("{:>14.2}", v)),
                None => out.push_str(&format!("{:>14}", "")),
            }
        }
        out.push('\n');
    }

    out
}

/// Pretty-printed JSON of the whole report
pub fn write_json(report: &AnalysisReport, path: &Path) -> AnalysisResult<()> {
    let file = File::create(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, report).map_err(|e| AnalysisError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    Ok(())
}

/// Merged dataset as CSV (`location`, `group`, one column per variable)
pub fn write_merged_csv(
    merged: &MergedDataset,
    classifier: &GroupClassifier,
    path: &Path,
) -> AnalysisResult<()> {
    let mut df = merged.to_dataframe(classifier)?;
    write_csv(&mut df, path)
}

/// Per-location averages as CSV, sorted as given, with a `total` column
pub fn write_averages_csv(
    variables: &[String],
    rows: &[LocationAverage],
    path: &Path,
) -> AnalysisResult<()> {
    let mut columns = vec![
        Column::from(Series::new(
            "location".into(),
            rows.iter().map(|r| r.location.clone()).collect::<Vec<_>>(),
        )),
        Column::from(Series::new(
            "group".into(),
            rows.iter().map(|r| r.group.clone()).collect::<Vec<_>>(),
        )),
    ];
    for (idx, variable) in variables.iter().enumerate() {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.scaled[idx]).collect();
        columns.push(Column::from(Series::new(variable.as_str().into(), values)));
    }
    columns.push(Column::from(Series::new(
        "total".into(),
        rows.iter().map(|r| r.total).collect::<Vec<_>>(),
    )));

    let mut df = DataFrame::new(columns)?;
    write_csv(&mut df, path)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> AnalysisResult<()> {
    let mut file = File::create(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
