//! Mann-Whitney U test
//!
//! **Method selection**:
//!   - exact null distribution when at least one sample has ≤ 8 values and
//!     there are no ties
//!   - otherwise the normal approximation with tie-corrected variance and a
//!     continuity correction
//!
//! The reported statistic is U for the first sample (number of pairs where
//! the first sample's value is larger, ties counting one half).

use super::{clamp_probability, norm_sf, Alternative, TestOutcome};

const EXACT_MAX_SIZE: usize = 8;

/// Upper bound on the exact table length (m·n + 1 entries)
const EXACT_MAX_CELLS: usize = 1_000_000;

/// Mann-Whitney U test of `a` against `b`; `None` when either is empty
///
/// All-identical input (zero variance of U) yields p = 1.
pub fn mann_whitney_u(a: &[f64], b: &[f64], alternative: Alternative) -> Option<TestOutcome> {
    let (n1, n2) = (a.len(), b.len());
    if n1 == 0 || n2 == 0 {
        return None;
    }

    let (ranks, tie_sizes) = rank_with_ties(a, b);
    let r1: f64 = ranks[..n1].iter().sum();
    let n1f = n1 as f64;
    let n2f = n2 as f64;

    let u1 = r1 - n1f * (n1f + 1.0) / 2.0;
    let u2 = n1f * n2f - u1;

    // Upper-tail statistic for the chosen alternative
    let (u, factor) = match alternative {
        Alternative::Greater => (u1, 1.0),
        Alternative::Less => (u2, 1.0),
        Alternative::TwoSided => (u1.max(u2), 2.0),
    };

    let has_ties = tie_sizes.iter().any(|&t| t > 1);
    let use_exact = (n1 <= EXACT_MAX_SIZE || n2 <= EXACT_MAX_SIZE) && !has_ties;

    let upper_tail = if use_exact {
        exact_sf(u, n1, n2).unwrap_or_else(|| asymptotic_sf(u, n1, n2, &tie_sizes))
    } else {
        asymptotic_sf(u, n1, n2, &tie_sizes)
    };

    Some(TestOutcome {
        statistic: u1,
        p_value: clamp_probability(upper_tail * factor),
    })
}

/// Average ranks of the concatenated samples, plus the size of each tie group
fn rank_with_ties(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let combined: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let mut order: Vec<usize> = (0..combined.len()).collect();
    order.sort_by(|&i, &j| combined[i].total_cmp(&combined[j]));

    let mut ranks = vec![0.0; combined.len()];
    let mut tie_sizes = Vec::new();

    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && combined[order[end]] == combined[order[start]] {
            end += 1;
        }
        // Positions start..end share the average of ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        tie_sizes.push(end - start);
        start = end;
    }

    (ranks, tie_sizes)
}

/// P(U ≥ u) under H0 with the normal approximation
fn asymptotic_sf(u: f64, n1: usize, n2: usize, tie_sizes: &[usize]) -> f64 {
    let n1 = n1 as f64;
    let n2 = n2 as f64;
    let n = n1 + n2;

    let mu = n1 * n2 / 2.0;
    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| {
            let t = t as f64;
            t.powi(3) - t
        })
        .sum();
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    if !(variance > 0.0) {
        return 1.0;
    }

    let z = (u - mu - 0.5) / variance.sqrt();
    norm_sf(z)
}

/// P(U ≥ u) under H0 from the exact distribution; `None` if too large
fn exact_sf(u: f64, n1: usize, n2: usize) -> Option<f64> {
    let counts = u_distribution(n1, n2)?;
    let total: i128 = counts.iter().sum();

    let k = u.ceil().max(0.0) as usize;
    if k >= counts.len() {
        return Some(0.0);
    }
    let tail: i128 = counts[k..].iter().sum();

    Some(tail as f64 / total as f64)
}

/// Frequencies of U = 0..=m·n over all C(m+n, m) rank assignments
///
/// These are the coefficients of the Gaussian binomial [m+n choose m]_q,
/// built as ∏ₖ (1 - q^(n+k)) / (1 - q^k) with exact integer arithmetic.
fn u_distribution(m: usize, n: usize) -> Option<Vec<i128>> {
    let (m, n) = if m <= n { (m, n) } else { (n, m) };
    let max = m.checked_mul(n)?;
    if max + 1 > EXACT_MAX_CELLS {
        return None;
    }

    let mut c = vec![0i128; max + 1];
    c[0] = 1;

    for k in 1..=m {
        let shift = n + k;
        for idx in (shift..=max).rev() {
            c[idx] = c[idx].checked_sub(c[idx - shift])?;
        }
        for idx in k..=max {
            c[idx] = c[idx].checked_add(c[idx - k])?;
        }
    }

    Some(c)
}
