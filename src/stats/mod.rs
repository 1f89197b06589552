//! Statistical tests used by the group comparison
//!
//! Each test lives in its own module:
//! - `shapiro_wilk`: normality gate (Royston's AS R94 approximation)
//! - `welch`: two-sample t-test with unequal variances
//! - `mann_whitney`: rank-based two-sample test
//! - `descriptive`: mean, sample standard deviation, coefficient of variation

pub mod descriptive;
pub mod mann_whitney;
pub mod shapiro_wilk;
pub mod welch;

pub use descriptive::{coefficient_of_variation, mean, sample_std_dev};
pub use mann_whitney::mann_whitney_u;
pub use shapiro_wilk::{shapiro_wilk, ShapiroWilk};
pub use welch::welch_t_test;

use serde::{Deserialize, Serialize};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Alternative hypothesis, stated for the first sample relative to the second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alternative {
    /// First sample is stochastically less than the second
    #[default]
    Less,
    Greater,
    TwoSided,
}

/// Statistic and p-value of a two-sample test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Clamp a probability into [0, 1]
pub(crate) fn clamp_probability(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}

/// Standard normal CDF
pub(crate) fn norm_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Standard normal upper tail, 1 - CDF without cancellation
pub(crate) fn norm_sf(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

/// Standard normal quantile for p in (0, 1)
pub(crate) fn norm_ppf(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}
