//! Group Comparison Engine
//!
//! For one variable: drop absent values, gate on Shapiro-Wilk normality,
//! then run either Welch's t-test or the Mann-Whitney U test with a
//! one-sided alternative (control lower than the other sites by default).
//!
//! **Decision flow**:
//!   1. Either group empty → `Insufficient` (no p-value)
//!   2. Both groups ≥ `min_normality_size` → Shapiro-Wilk on each group
//!      Otherwise both groups are treated as non-normal without testing
//!   3. Both normal → Welch t-test; else Mann-Whitney U
//!
//! The control-group variability summary is computed separately by
//! `control_summary` and never folded into `ComparisonResult`.

use crate::stats::{
    coefficient_of_variation, mann_whitney_u, mean, sample_std_dev, shapiro_wilk, welch_t_test,
    Alternative, TestOutcome,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest sample on which the normality test is meaningful
const MIN_NORMALITY_SIZE: usize = 3;

/// Engine thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// A group is normal when its Shapiro-Wilk p-value exceeds this
    #[serde(default = "default_normality_alpha")]
    pub normality_alpha: f64,
    /// Both groups need at least this many values for the normality test;
    /// values below 3 are raised to 3
    #[serde(default = "default_min_normality_size")]
    pub min_normality_size: usize,
    #[serde(default)]
    pub alternative: Alternative,
}

fn default_normality_alpha() -> f64 {
    0.05
}

fn default_min_normality_size() -> usize {
    MIN_NORMALITY_SIZE
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            normality_alpha: default_normality_alpha(),
            min_normality_size: default_min_normality_size(),
            alternative: Alternative::Less,
        }
    }
}

/// Which test produced the p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestUsed {
    /// Welch's t-test (unequal variances)
    TTest,
    MannWhitneyU,
    /// At least one group had no values
    Insufficient,
}

impl fmt::Display for TestUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestUsed::TTest => write!(f, "Welch t-test"),
            TestUsed::MannWhitneyU => write!(f, "Mann–Whitney U"),
            TestUsed::Insufficient => write!(f, "Insufficient data for test"),
        }
    }
}

/// Outcome of comparing the control group (A) with the other sites (B)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub variable: String,
    pub group_a_n: usize,
    pub group_b_n: usize,
    pub normality_a: bool,
    pub normality_b: bool,
    /// Shapiro-Wilk p-values; `None` when the test was not run
    pub normality_p_a: Option<f64>,
    pub normality_p_b: Option<f64>,
    pub test_used: TestUsed,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub alternative: Alternative,
}

impl ComparisonResult {
    pub fn is_insufficient(&self) -> bool {
        self.test_used == TestUsed::Insufficient
    }

    /// True when a p-value exists and is below `alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value.is_some_and(|p| p < alpha)
    }
}

/// Drop absent and non-finite values
fn present(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect()
}

/// Compare group A (control) against group B (other sites)
pub fn compare(
    variable: &str,
    values_a: &[Option<f64>],
    values_b: &[Option<f64>],
    config: &ComparisonConfig,
) -> ComparisonResult {
    let a = present(values_a);
    let b = present(values_b);

    let mut result = ComparisonResult {
        variable: variable.to_string(),
        group_a_n: a.len(),
        group_b_n: b.len(),
        normality_a: false,
        normality_b: false,
        normality_p_a: None,
        normality_p_b: None,
        test_used: TestUsed::Insufficient,
        statistic: None,
        p_value: None,
        alternative: config.alternative,
    };

    if a.is_empty() || b.is_empty() {
        tracing::info!(
            "{}: insufficient data (control n = {}, other n = {})",
            variable,
            a.len(),
            b.len()
        );
        return result;
    }

    // Normality gate: only when both groups are large enough
    let min_size = config.min_normality_size.max(MIN_NORMALITY_SIZE);
    if a.len() >= min_size && b.len() >= min_size {
        let sw_a = shapiro_wilk(&a);
        let sw_b = shapiro_wilk(&b);
        result.normality_p_a = sw_a.map(|s| s.p_value);
        result.normality_p_b = sw_b.map(|s| s.p_value);
        result.normality_a = sw_a.is_some_and(|s| s.is_normal(config.normality_alpha));
        result.normality_b = sw_b.is_some_and(|s| s.is_normal(config.normality_alpha));
    } else {
        tracing::debug!(
            "{}: fewer than {} values in a group, skipping normality test",
            variable,
            min_size
        );
    }

    let parametric = if result.normality_a && result.normality_b {
        let outcome = welch_t_test(&a, &b, config.alternative);
        if outcome.is_none() {
            tracing::debug!("{}: t statistic undefined, using Mann–Whitney U", variable);
        }
        outcome
    } else {
        None
    };

    let (test_used, outcome) = match parametric {
        Some(outcome) => (TestUsed::TTest, Some(outcome)),
        None => (
            TestUsed::MannWhitneyU,
            mann_whitney_u(&a, &b, config.alternative),
        ),
    };

    result.test_used = test_used;
    if let Some(TestOutcome { statistic, p_value }) = outcome {
        result.statistic = Some(statistic);
        result.p_value = Some(p_value);
    }

    tracing::info!(
        "{}: {} (control n = {}, other n = {}), p = {:.4}",
        variable,
        result.test_used,
        result.group_a_n,
        result.group_b_n,
        result.p_value.unwrap_or(f64::NAN)
    );

    result
}

/// Qualitative stability of the control group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variability {
    Low,
    High,
    /// Fewer than two values, or a zero mean
    Undetermined,
}

/// Mean, spread and coefficient of variation of the control group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSummary {
    pub variable: String,
    pub n: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub cv_percent: Option<f64>,
    pub variability: Variability,
}

/// Summarize the control values; CV strictly below `cv_threshold` is low
pub fn control_summary(variable: &str, values: &[Option<f64>], cv_threshold: f64) -> ControlSummary {
    let values = present(values);
    let n = values.len();

    // A single value has a mean but no spread
    let (std_dev, cv_percent) = if n >= 2 {
        (sample_std_dev(&values), coefficient_of_variation(&values))
    } else {
        (None, None)
    };

    let variability = match cv_percent {
        Some(cv) if cv < cv_threshold => Variability::Low,
        Some(_) => Variability::High,
        None => Variability::Undetermined,
    };

    ControlSummary {
        variable: variable.to_string(),
        n,
        mean: mean(&values),
        std_dev,
        cv_percent,
        variability,
    }
}
