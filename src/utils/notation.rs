//! Scientific Notation Parser
//!
//! Converts spreadsheet cell text such as `3,6×10^2`, `3.6x10**2`,
//! `3.6 x 10 2` or `1.5x10^-3` into `f64`.
//!
//! **Grammar** (after normalization):
//!   `<mantissa> x 10 [**] <exponent>`
//!   - mantissa: run of digits and points (decimal comma already mapped to point)
//!   - multiplication sign: `×`, `x` or `X`
//!   - exponent marker: `^` or `**`, or nothing but whitespace
//!   - exponent: optionally signed integer
//!
//! Anything that does not match falls back to a plain float parse. Text that
//! is neither yields `None`. The parser never fails loudly: one malformed cell
//! must not abort the analysis of the rest of the sheet.

use regex::Regex;
use std::sync::LazyLock;

static SCIENTIFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\d.]+)\s*[xX]\s*10\s*(?:\*\*)?\s*([+-]?\d+)").expect("static pattern compiles")
});

/// Cell contents that spreadsheets and exports use for "no value"
const NULL_MARKERS: [&str; 8] = ["", "-", "nan", "NaN", "NA", "N/A", "null", "None"];

/// Parse free-text scientific notation into a finite float
///
/// # Examples
/// ```
/// use bioaerosol_stats::utils::parse_notation;
///
/// assert_eq!(parse_notation("3,6×10^2"), Some(360.0));
/// assert_eq!(parse_notation("abc"), None);
/// ```
pub fn parse_notation(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if NULL_MARKERS.contains(&trimmed) {
        return None;
    }

    let normalized = normalize(trimmed);

    let value = match SCIENTIFIC.captures(&normalized) {
        Some(caps) => {
            let mantissa: f64 = caps[1].parse().ok()?;
            let exponent: i32 = caps[2].parse().ok()?;
            mantissa * 10f64.powi(exponent)
        }
        None => normalized.parse::<f64>().ok()?,
    };

    value.is_finite().then_some(value)
}

/// Parse an optional cell (null cells from the reader arrive as `None`)
pub fn parse_cell(raw: Option<&str>) -> Option<f64> {
    raw.and_then(parse_notation)
}

/// Map decimal comma, multiplication glyph and caret onto one spelling
fn normalize(text: &str) -> String {
    text.replace(',', ".").replace('×', "x").replace('^', "**")
}
