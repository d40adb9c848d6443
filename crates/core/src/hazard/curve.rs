//! Hazard curves and their inversion
//!
//! A [`HazardCurve`] stores annual exceedance probability on an ascending IM grid,
//! split into fault and distributed-seismicity contributions. Conversions between
//! exceedance and IM level interpolate linearly in log-log space and never
//! extrapolate beyond the curve.

use crate::core_types::IM;
use crate::error::{PshaError, Result};
use serde::{Deserialize, Serialize};

/// Number of IM levels in the default hazard grid
pub const DEFAULT_N_IM_VALUES: usize = 200;

/// `n` log-spaced IM levels spanning the default range of `im`
pub fn default_im_values(im: &IM, n: usize) -> Vec<f64> {
    let (lo, hi) = im.default_range();
    log_space(lo, hi, n)
}

/// `n` values log-spaced between `lo` and `hi` (inclusive)
pub fn log_space(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let (a, b) = (lo.ln(), hi.ln());
            let step = (b - a) / (n - 1) as f64;
            (0..n).map(|i| (a + step * i as f64).exp()).collect()
        }
    }
}

/// Annual exceedance probability per IM level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardCurve {
    im_values: Vec<f64>,
    fault: Vec<f64>,
    ds: Vec<f64>,
}

impl HazardCurve {
    /// Build a curve; the IM grid must be positive and strictly ascending
    pub fn new(im_values: Vec<f64>, fault: Vec<f64>, ds: Vec<f64>) -> Result<Self> {
        if im_values.len() != fault.len() || im_values.len() != ds.len() {
            return Err(PshaError::InvalidParameter(format!(
                "hazard curve lengths differ: {} IM values, {} fault, {} ds",
                im_values.len(),
                fault.len(),
                ds.len()
            )));
        }
        if im_values.is_empty() {
            return Err(PshaError::InvalidParameter(
                "hazard curve needs at least one IM value".to_string(),
            ));
        }
        if im_values[0] <= 0.0 || im_values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PshaError::InvalidParameter(
                "IM values must be positive and strictly ascending".to_string(),
            ));
        }
        Ok(Self {
            im_values,
            fault,
            ds,
        })
    }

    /// All-zero curve on an IM grid
    pub fn zeros(im_values: Vec<f64>) -> Result<Self> {
        let n = im_values.len();
        Self::new(im_values, vec![0.0; n], vec![0.0; n])
    }

    /// IM levels (ascending)
    pub fn im_values(&self) -> &[f64] {
        &self.im_values
    }

    /// Fault-source contribution
    pub fn fault(&self) -> &[f64] {
        &self.fault
    }

    /// Distributed-seismicity contribution
    pub fn ds(&self) -> &[f64] {
        &self.ds
    }

    /// Total hazard (fault + distributed seismicity)
    pub fn total(&self) -> Vec<f64> {
        self.fault.iter().zip(&self.ds).map(|(f, d)| f + d).collect()
    }

    /// Whether the total curve is non-increasing in IM level
    pub fn is_monotonic(&self) -> bool {
        self.total().windows(2).all(|w| w[1] <= w[0] * (1.0 + 1e-12))
    }

    /// IM level with the given total annual exceedance probability
    pub fn exceedance_to_im(&self, exceedance: f64) -> Result<f64> {
        exceedance_to_im(exceedance, &self.im_values, &self.total())
    }

    /// Total annual exceedance probability at an IM level
    pub fn im_to_exceedance(&self, im_value: f64) -> Result<f64> {
        im_to_exceedance(im_value, &self.im_values, &self.total())
    }
}

/// Log-log inversion of a non-increasing hazard curve at `exceedance`
///
/// Only the positive part of the curve is usable; exceedances above the first value
/// or below the smallest positive value fail with `ExceedanceOutOfRange`.
pub fn exceedance_to_im(exceedance: f64, im_values: &[f64], hazard: &[f64]) -> Result<f64> {
    let n_pos = hazard.iter().take_while(|&&h| h > 0.0).count();
    let max = hazard.first().copied().unwrap_or(0.0);
    let min = if n_pos > 0 { hazard[n_pos - 1] } else { 0.0 };
    let out_of_range = PshaError::ExceedanceOutOfRange {
        exceedance,
        min,
        max,
    };
    if n_pos == 0 || !(exceedance > 0.0) || exceedance > max || exceedance < min {
        return Err(out_of_range);
    }
    if n_pos == 1 || exceedance == max {
        return Ok(im_values[0]);
    }

    let ln_excd = exceedance.ln();
    for i in 1..n_pos {
        let (h0, h1) = (hazard[i - 1], hazard[i]);
        if h1 <= exceedance && exceedance <= h0 {
            if h0 == h1 {
                return Ok(im_values[i - 1]);
            }
            let f = (ln_excd - h0.ln()) / (h1.ln() - h0.ln());
            let ln_im = im_values[i - 1].ln() + f * (im_values[i].ln() - im_values[i - 1].ln());
            return Ok(ln_im.exp());
        }
    }
    Err(out_of_range)
}

/// Log-log interpolation of a hazard curve at `im_value`
///
/// Segments touching zero hazard interpolate linearly in hazard instead.
pub fn im_to_exceedance(im_value: f64, im_values: &[f64], hazard: &[f64]) -> Result<f64> {
    let (Some(&min), Some(&max)) = (im_values.first(), im_values.last()) else {
        return Err(PshaError::InvalidParameter("empty hazard curve".to_string()));
    };
    if !(im_value >= min && im_value <= max) {
        return Err(PshaError::ImOutOfRange { im_value, min, max });
    }

    let i = im_values.partition_point(|&x| x < im_value);
    if i == 0 {
        return Ok(hazard[0]);
    }
    let (x0, x1) = (im_values[i - 1].ln(), im_values[i].ln());
    let f = (im_value.ln() - x0) / (x1 - x0);
    let (h0, h1) = (hazard[i - 1], hazard[i]);
    if h0 > 0.0 && h1 > 0.0 {
        Ok((h0.ln() + f * (h1.ln() - h0.ln())).exp())
    } else {
        Ok(h0 + f * (h1 - h0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn power_law_curve() -> HazardCurve {
        // H(x) = 1e-3 * x^-2 is a straight line in log-log space
        let im = log_space(0.01, 2.0, 50);
        let fault: Vec<f64> = im.iter().map(|x| 0.6e-3 * x.powi(-2)).collect();
        let ds: Vec<f64> = im.iter().map(|x| 0.4e-3 * x.powi(-2)).collect();
        HazardCurve::new(im, fault, ds).unwrap()
    }

    #[test]
    fn test_log_space_endpoints() {
        let v = log_space(1e-4, 10.0, 200);
        assert_eq!(v.len(), 200);
        assert_relative_eq!(v[0], 1e-4, max_relative = 1e-12);
        assert_relative_eq!(v[199], 10.0, max_relative = 1e-12);
    }

    #[test]
    fn test_inversion_exact_on_power_law() {
        let curve = power_law_curve();
        assert!(curve.is_monotonic());
        let im = curve.exceedance_to_im(1e-3 / 0.25).unwrap();
        assert_relative_eq!(im, 0.5, max_relative = 1e-9);
        assert_relative_eq!(curve.im_to_exceedance(0.5).unwrap(), 4e-3, max_relative = 1e-9);
    }

    #[test]
    fn test_round_trip() {
        let curve = power_law_curve();
        for x in [0.015, 0.1, 0.33, 1.7] {
            let excd = curve.im_to_exceedance(x).unwrap();
            assert_relative_eq!(curve.exceedance_to_im(excd).unwrap(), x, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_fails() {
        let curve = power_law_curve();
        assert!(matches!(
            curve.exceedance_to_im(100.0),
            Err(PshaError::ExceedanceOutOfRange { .. })
        ));
        assert!(matches!(
            curve.exceedance_to_im(1e-9),
            Err(PshaError::ExceedanceOutOfRange { .. })
        ));
        assert!(matches!(
            curve.im_to_exceedance(5.0),
            Err(PshaError::ImOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_tail_is_not_usable() {
        let curve = HazardCurve::new(
            vec![0.1, 0.2, 0.4, 0.8],
            vec![1e-2, 1e-3, 0.0, 0.0],
            vec![0.0; 4],
        )
        .unwrap();
        assert!(curve.exceedance_to_im(5e-4).is_err());
        assert!(curve.exceedance_to_im(5e-3).is_ok());
        // Linear in hazard where a segment touches zero
        assert_relative_eq!(curve.im_to_exceedance(0.4 * 2f64.sqrt()).unwrap(), 0.0);
        assert_relative_eq!(
            curve.im_to_exceedance(0.2 * 2f64.sqrt()).unwrap(),
            5e-4,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_invalid_grids_rejected() {
        assert!(HazardCurve::new(vec![0.2, 0.1], vec![0.0; 2], vec![0.0; 2]).is_err());
        assert!(HazardCurve::new(vec![0.1], vec![0.0; 2], vec![0.0]).is_err());
        assert!(HazardCurve::zeros(Vec::new()).is_err());
    }
}
