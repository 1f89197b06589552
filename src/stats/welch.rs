//! Welch's two-sample t-test (unequal variances)

use super::descriptive::{mean, sample_variance};
use super::{clamp_probability, Alternative, TestOutcome};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Welch's t-test of `a` against `b`
///
/// Returns `None` when either sample has fewer than two values or when the
/// standard error is zero (both samples constant), where the statistic is
/// undefined.
pub fn welch_t_test(a: &[f64], b: &[f64], alternative: Alternative) -> Option<TestOutcome> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(a)?, mean(b)?);
    let (v1, v2) = (sample_variance(a)?, sample_variance(b)?);

    let se1 = v1 / n1;
    let se2 = v2 / n2;
    let se = (se1 + se2).sqrt();
    if !(se > 0.0 && se.is_finite()) {
        return None;
    }

    let t = (m1 - m2) / se;

    // Welch-Satterthwaite degrees of freedom
    let df = (se1 + se2).powi(2) / (se1.powi(2) / (n1 - 1.0) + se2.powi(2) / (n2 - 1.0));

    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p_value = match alternative {
        Alternative::Less => dist.cdf(t),
        Alternative::Greater => dist.sf(t),
        Alternative::TwoSided => 2.0 * dist.sf(t.abs()),
    };

    Some(TestOutcome {
        statistic: t,
        p_value: clamp_probability(p_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clearly_lower_group() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [10.0, 11.0, 12.0, 13.0, 14.0];

        let result = welch_t_test(&a, &b, Alternative::Less).unwrap();

        assert_relative_eq!(result.statistic, -9.0, epsilon = 1e-12);
        // t = -9 on 8 df
        assert!(result.p_value < 1e-4);
        assert!(result.p_value > 0.0);
    }

    #[test]
    fn test_alternatives_are_consistent() {
        let a = [4.1, 5.3, 6.0, 5.5];
        let b = [5.0, 6.2, 7.1, 6.6, 5.9];

        let less = welch_t_test(&a, &b, Alternative::Less).unwrap();
        let greater = welch_t_test(&a, &b, Alternative::Greater).unwrap();
        let two_sided = welch_t_test(&a, &b, Alternative::TwoSided).unwrap();

        assert_relative_eq!(less.p_value + greater.p_value, 1.0, epsilon = 1e-9);
        assert_relative_eq!(two_sided.p_value, 2.0 * less.p_value.min(greater.p_value), epsilon = 1e-9);
        assert!(less.p_value < 0.5);
    }

    #[test]
    fn test_undefined_cases() {
        assert!(welch_t_test(&[1.0], &[2.0, 3.0], Alternative::Less).is_none());
        assert!(welch_t_test(&[2.0, 2.0, 2.0], &[5.0, 5.0, 5.0], Alternative::Less).is_none());
    }

    #[test]
    fn test_one_constant_sample_is_defined() {
        let result = welch_t_test(&[2.0, 2.0, 2.0], &[4.0, 5.0, 6.0], Alternative::Less).unwrap();

        // df collapses to n2 - 1 = 2
        assert_relative_eq!(result.statistic, -3.0 / (1.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert!(result.p_value < 0.05);
    }
}
