//! Population drift detection.
//!
//! Compares a current numeric sample (e.g. recent patient ages) against a
//! fixed baseline distribution with a two-sample Kolmogorov-Smirnov test.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Result of one drift check.
///
/// Invariant: `is_drift == (p_value < significance_level)` for the
/// significance level the monitor was built with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Whether the shift is statistically significant
    pub is_drift: bool,
    /// KS statistic D, the supremum distance between the two empirical CDFs
    pub statistic: f64,
    /// Two-sided asymptotic p-value
    pub p_value: f64,
}

/// Two-sample drift monitor with a fixed baseline.
///
/// Pure: `check_drift` is a deterministic function of the input sample,
/// the baseline, and the configured significance level.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    /// Baseline sample, kept sorted
    baseline: Vec<f64>,
    significance_level: f64,
}

impl DriftMonitor {
    /// Create a monitor over the given baseline sample.
    ///
    /// The significance level must be finite and in (0, 1].
    pub fn new(baseline: Vec<f64>, significance_level: f64) -> Result<Self> {
        if baseline.is_empty() {
            return Err(VigilError::InsufficientData(
                "baseline sample is empty".to_string(),
            ));
        }
        if !significance_level.is_finite() || significance_level <= 0.0 || significance_level > 1.0
        {
            return Err(VigilError::Config(format!(
                "significance level must be in (0, 1], got {}",
                significance_level
            )));
        }

        let mut baseline = baseline;
        baseline.sort_by(f64::total_cmp);

        Ok(Self {
            baseline,
            significance_level,
        })
    }

    /// The configured significance level.
    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// Compare `current` against the baseline.
    ///
    /// An empty sample is an error, not "no drift": the caller must treat
    /// it as "monitoring skipped".
    pub fn check_drift(&self, current: &[f64]) -> Result<DriftReport> {
        if current.is_empty() {
            return Err(VigilError::InsufficientData(
                "current sample is empty".to_string(),
            ));
        }

        let mut sorted = current.to_vec();
        sorted.sort_by(f64::total_cmp);

        let statistic = ks_statistic(&self.baseline, &sorted);
        let p_value = ks_p_value(statistic, self.baseline.len(), sorted.len());

        Ok(DriftReport {
            is_drift: p_value < self.significance_level,
            statistic,
            p_value,
        })
    }
}

/// Supremum distance between the empirical CDFs of two sorted samples.
fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;

    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        d = d.max(diff);
    }

    d
}

/// Two-sided asymptotic p-value for the two-sample KS statistic.
///
/// Uses the Kolmogorov distribution with the standard small-sample
/// correction lambda = (sqrt(ne) + 0.12 + 0.11/sqrt(ne)) * d where
/// ne = n*m/(n+m).
fn ks_p_value(d: f64, n: usize, m: usize) -> f64 {
    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    kolmogorov_survival(lambda)
}

/// Survival function of the Kolmogorov distribution:
/// Q(lambda) = 2 * sum_{j>=1} (-1)^{j-1} exp(-2 j^2 lambda^2), clamped to [0, 1].
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }

    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut previous_term = 0.0;

    for j in 1..=100 {
        let term = sign * (a2 * (j * j) as f64).exp();
        sum += term;
        if term.abs() <= 1e-12 * previous_term || term.abs() <= 1e-16 * sum.abs() {
            return (2.0 * sum).clamp(0.0, 1.0);
        }
        previous_term = term.abs();
        sign = -sign;
    }

    // Series failed to converge, which only happens for tiny lambda where
    // the distance is not significant anyway.
    1.0
}
