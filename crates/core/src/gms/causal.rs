//! Causal-parameter bounds for pre-filtering candidate ground motions
//!
//! Default bounds anchor on the disaggregation at the selection target: magnitude
//! and rupture distance span `mean +/- spread_factor * (p84 - p16) / 2` (never
//! narrower than a minimum half-width), Vs30 spans the site Vs30 +/- a relative
//! tolerance, and the scale-factor range comes from the configuration.

use super::dataset::GMRecord;
use crate::core_types::{HazardQuery, SiteInfo, IM};
use crate::disagg::{run_ensemble_disagg, DisaggSummary};
use crate::ensemble::Ensemble;
use crate::error::{PshaError, Result};
use crate::hazard::HazardConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Closed interval [low, high]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    /// Lower bound
    pub low: f64,
    /// Upper bound
    pub high: f64,
}

impl ParamRange {
    /// Interval from its bounds
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Whether `value` lies inside (inclusive)
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Pre-filter bounds for ground-motion selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CausalParamBounds {
    /// Magnitude range
    pub magnitude: ParamRange,
    /// Rupture distance range (km)
    pub rrup: ParamRange,
    /// Vs30 range (m/s)
    pub vs30: ParamRange,
    /// Amplitude scale-factor range, when scaling is used
    pub sf: Option<ParamRange>,
}

impl CausalParamBounds {
    /// Whether a record's magnitude, distance and Vs30 lie inside the bounds
    pub fn contains(&self, record: &GMRecord) -> bool {
        self.magnitude.contains(record.magnitude)
            && self.rrup.contains(record.rrup)
            && self.vs30.contains(record.vs30)
    }

    /// Whether a scale factor is allowed
    pub fn allows_scale_factor(&self, sf: f64) -> bool {
        self.sf.map_or(true, |range| range.contains(sf))
    }
}

/// Settings for deriving default bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalParamConfig {
    /// Multiplier on the disaggregation half-spread (p84 - p16) / 2
    pub spread_factor: f64,
    /// Smallest magnitude half-width
    pub min_magnitude_half_width: f64,
    /// Smallest distance half-width (km)
    pub min_rrup_half_width: f64,
    /// Relative Vs30 tolerance around the site Vs30
    pub vs30_tolerance: f64,
    /// Default scale-factor range
    pub sf_range: ParamRange,
}

impl Default for CausalParamConfig {
    fn default() -> Self {
        Self {
            spread_factor: 1.0,
            min_magnitude_half_width: 0.25,
            min_rrup_half_width: 10.0,
            vs30_tolerance: 0.3,
            sf_range: ParamRange::new(0.3, 3.0),
        }
    }
}

fn centred_range(mean: f64, p16: f64, p84: f64, factor: f64, min_half_width: f64) -> ParamRange {
    let half = (factor * (p84 - p16) / 2.0).max(min_half_width);
    ParamRange::new(mean - half, mean + half)
}

/// Default bounds from a disaggregation summary
pub fn default_causal_bounds(
    summary: &DisaggSummary,
    site: &SiteInfo,
    config: &CausalParamConfig,
    scaling: bool,
) -> Result<CausalParamBounds> {
    if !summary.mean_rrup.is_finite() {
        return Err(PshaError::InvalidParameter(
            "disaggregation has no rupture distances to derive distance bounds from".to_string(),
        ));
    }
    let magnitude = centred_range(
        summary.mean_magnitude,
        summary.magnitude_16th,
        summary.magnitude_84th,
        config.spread_factor,
        config.min_magnitude_half_width,
    );
    let mut rrup = centred_range(
        summary.mean_rrup,
        summary.rrup_16th,
        summary.rrup_84th,
        config.spread_factor,
        config.min_rrup_half_width,
    );
    rrup.low = rrup.low.max(0.0);

    let vs30 = site.effective_vs30();
    Ok(CausalParamBounds {
        magnitude,
        rrup,
        vs30: ParamRange::new(
            vs30 * (1.0 - config.vs30_tolerance),
            vs30 * (1.0 + config.vs30_tolerance),
        ),
        sf: scaling.then_some(config.sf_range),
    })
}

/// Default bounds for a site and conditioning IM
///
/// Exactly one of `exceedance` / `im_level` has to be given; a missing target is
/// reported before any hazard is computed.
pub fn compute_causal_bounds(
    ensemble: &Ensemble,
    site: &SiteInfo,
    im_j: &IM,
    exceedance: Option<f64>,
    im_level: Option<f64>,
    config: &CausalParamConfig,
    hazard_config: &HazardConfig,
    scaling: bool,
) -> Result<CausalParamBounds> {
    let query = HazardQuery::from_options(exceedance, im_level)?;
    let disagg = run_ensemble_disagg(ensemble, site, im_j, query, hazard_config)?;
    let bounds = default_causal_bounds(&disagg.summary, site, config, scaling)?;
    info!(
        "Causal bounds at {}: Mw [{:.2}, {:.2}], Rrup [{:.1}, {:.1}] km, Vs30 [{:.0}, {:.0}]",
        site.station_name,
        bounds.magnitude.low,
        bounds.magnitude.high,
        bounds.rrup.low,
        bounds.rrup.high,
        bounds.vs30.low,
        bounds.vs30.high
    );
    Ok(bounds)
}
