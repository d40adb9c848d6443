//! Weighted empirical CDFs and Kolmogorov-Smirnov helpers
//!
//! A [`WeightedEcdf`] is built from values and non-negative weights: values are
//! sorted ascending and the CDF ordinate at each value is the cumulative
//! (normalised) weight. Inversion interpolates linearly between ordinates and
//! clamps to the first / last value outside the ordinate range, which is what the
//! branch-percentile calculations rely on.

use crate::error::{PshaError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weighted empirical cumulative distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEcdf {
    x: Vec<f64>,
    cdf: Vec<f64>,
}

impl WeightedEcdf {
    /// Build from values and weights (weights are normalised; zero weights dropped)
    pub fn new(values: &[f64], weights: &[f64]) -> Result<Self> {
        if values.len() != weights.len() {
            return Err(PshaError::InvalidParameter(format!(
                "{} values but {} weights",
                values.len(),
                weights.len()
            )));
        }

        let mut pairs: Vec<(f64, f64)> = values
            .iter()
            .zip(weights)
            .filter(|(v, w)| **w > 0.0 && v.is_finite())
            .map(|(&v, &w)| (v, w))
            .collect();
        if pairs.is_empty() {
            return Err(PshaError::NoCandidates {
                context: "empirical CDF has no positively weighted values".to_string(),
            });
        }
        if pairs.iter().any(|(_, w)| !w.is_finite()) {
            return Err(PshaError::InvalidParameter(
                "empirical CDF weights must be finite".to_string(),
            ));
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = pairs.iter().map(|(_, w)| w).sum();
        let mut running = 0.0;
        let mut x = Vec::with_capacity(pairs.len());
        let mut cdf = Vec::with_capacity(pairs.len());
        for (v, w) in pairs {
            running += w / total;
            x.push(v);
            cdf.push(running);
        }
        // Guard against accumulated rounding
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }

        Ok(Self { x, cdf })
    }

    /// Equally weighted ECDF
    pub fn unweighted(values: &[f64]) -> Result<Self> {
        Self::new(values, &vec![1.0; values.len()])
    }

    /// Sorted support values
    pub fn values(&self) -> &[f64] {
        &self.x
    }

    /// Cumulative probabilities matching [`Self::values`]
    pub fn probabilities(&self) -> &[f64] {
        &self.cdf
    }

    /// P[X <= x] (right-continuous step function)
    pub fn cdf(&self, x: f64) -> f64 {
        let n = self.x.partition_point(|&v| v <= x);
        if n == 0 {
            0.0
        } else {
            self.cdf[n - 1]
        }
    }

    /// P[X > x]
    pub fn exceedance(&self, x: f64) -> f64 {
        1.0 - self.cdf(x)
    }

    /// Inverse CDF by linear interpolation between ordinates
    pub fn inverse(&self, p: f64) -> f64 {
        interp_inverse(p, &self.x, &self.cdf)
    }

    /// Weighted mean of the support
    pub fn mean(&self) -> f64 {
        let mut prev = 0.0;
        let mut mean = 0.0;
        for (x, c) in self.x.iter().zip(&self.cdf) {
            mean += x * (c - prev);
            prev = *c;
        }
        mean
    }

    /// Draw a value by inverse-transform sampling
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.inverse(rng.random::<f64>())
    }
}

/// Invert a non-parametric CDF at each probability in `ps`
///
/// `cdf_x` must be sorted ascending with matching non-decreasing `cdf_y`.
pub fn query_non_parametric_cdf_invs(ps: &[f64], cdf_x: &[f64], cdf_y: &[f64]) -> Vec<f64> {
    ps.iter().map(|&p| interp_inverse(p, cdf_x, cdf_y)).collect()
}

fn interp_inverse(p: f64, x: &[f64], cdf: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let i = cdf.partition_point(|&c| c < p);
    if i == 0 {
        return x[0];
    }
    if i >= x.len() {
        return x[x.len() - 1];
    }
    let (c0, c1) = (cdf[i - 1], cdf[i]);
    if c1 <= c0 {
        return x[i];
    }
    let f = (p - c0) / (c1 - c0);
    x[i - 1] + f * (x[i] - x[i - 1])
}

/// Critical value of the two-sided Kolmogorov-Smirnov statistic
///
/// Asymptotic form D_crit = c(alpha) / sqrt(n) with c(alpha) = sqrt(-ln(alpha / 2) / 2).
pub fn ks_critical_value(n: usize, alpha: f64) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    let c = (-(alpha / 2.0).ln() / 2.0).sqrt();
    c / (n as f64).sqrt()
}

/// Kolmogorov-Smirnov distance between a sample and a reference CDF
pub fn ks_statistic<F: Fn(f64) -> f64>(sample: &[f64], reference_cdf: F) -> f64 {
    let mut sorted: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;

    sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = reference_cdf(x);
            let above = (i as f64 + 1.0) / n - f;
            let below = f - i as f64 / n;
            above.max(below)
        })
        .fold(0.0, f64::max)
}
