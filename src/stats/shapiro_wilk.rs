//! Shapiro-Wilk normality test
//!
//! Royston's approximation (Applied Statistics algorithm AS R94, 1995):
//! coefficients from normal order-statistic expectations with polynomial
//! corrections for the two extreme pairs, and a normalizing transform of
//! `ln(1 - W)` for the p-value. Valid for 3 ≤ n ≤ 5000.
//!
//! The p-value is the probability of a W at least this small under
//! normality; a small p means the sample is unlikely to be normal.

use super::{norm_ppf, norm_sf};
use serde::Serialize;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

// Polynomial corrections for a1 and a2 (in 1/sqrt(n))
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

// p-value transform, 4 ≤ n ≤ 11 (in n)
const G: [f64; 2] = [-2.273, 0.459];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];

// p-value transform, n ≥ 12 (in ln n)
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];

/// W statistic and its p-value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapiroWilk {
    pub w: f64,
    pub p_value: f64,
}

impl ShapiroWilk {
    /// Normal at level `alpha` when the p-value exceeds it
    pub fn is_normal(&self, alpha: f64) -> bool {
        self.p_value > alpha
    }
}

/// Run the test; `None` below three values
///
/// A sample with zero range is reported as W = 1, p = 1.
pub fn shapiro_wilk(values: &[f64]) -> Option<ShapiroWilk> {
    let n = values.len();
    if n < 3 {
        return None;
    }

    let mut x = values.to_vec();
    x.sort_by(f64::total_cmp);

    let range = x[n - 1] - x[0];
    if range <= 0.0 {
        return Some(ShapiroWilk { w: 1.0, p_value: 1.0 });
    }

    // Scale by range; W is scale invariant
    for v in &mut x {
        *v /= range;
    }

    let a = coefficients(n);
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let b: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();

    let mut w = (b * b / ss).min(1.0);
    if n == 3 {
        // Smallest attainable W for three points
        w = w.max(0.75);
    }

    Some(ShapiroWilk {
        w,
        p_value: p_value(w, n),
    })
}

/// Evaluate c[0] + c[1]·x + c[2]·x² + …
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

/// Antisymmetric weights for the n/2 extreme pairs, largest first
fn coefficients(n: usize) -> Vec<f64> {
    let half = n / 2;
    if n == 3 {
        return vec![FRAC_1_SQRT_2];
    }

    let an = n as f64;
    let m: Vec<f64> = (1..=half)
        .map(|i| norm_ppf((i as f64 - 0.375) / (an + 0.25)))
        .collect();

    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    a[0] = a1;

    let (first_plain, fac) = if n > 5 {
        let a2 = poly(&C2, rsn) - m[1] / ssumm2;
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        (1, fac)
    };

    for i in first_plain..half {
        a[i] = -m[i] / fac;
    }

    a
}

fn p_value(w: f64, n: usize) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }

    if n == 3 {
        let pw = (6.0 / PI) * (w.sqrt().asin() - PI / 3.0);
        return pw.clamp(0.0, 1.0);
    }

    let an = n as f64;
    let w1 = (1.0 - w).ln();

    let (y, m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if w1 >= gamma {
            return 0.0;
        }
        (-(gamma - w1).ln(), poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (w1, poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    norm_sf((y - m) / s).clamp(0.0, 1.0)
}
