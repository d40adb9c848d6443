//! Hazard aggregation
//!
//! Per-branch hazard is the rate-weighted sum of per-rupture ground-motion exceedance
//! probabilities, kept separately for fault and distributed-seismicity ruptures:
//!
//! ```text
//! H(x) = sum_r P[IM > x | r] * annual_rec_prob(r)
//! ```
//!
//! The ensemble curve is the branch-weight-weighted sum of branch curves. Percentile
//! curves are computed independently at each IM level: the branches' total
//! exceedance values form a weighted empirical CDF which is inverted at each
//! requested percentile.

pub mod curve;
pub mod map;

pub use curve::{
    default_im_values, exceedance_to_im, im_to_exceedance, log_space, HazardCurve,
    DEFAULT_N_IM_VALUES,
};
pub use map::{hazard_map, HazardMapResult};

use crate::core_types::{SiteInfo, SourceKind, IM};
use crate::ensemble::{Branch, Ensemble};
use crate::error::Result;
use crate::stats::WeightedEcdf;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hazard calculation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Number of IM levels in the default grid
    pub n_im_values: usize,
    /// Branch percentiles reported alongside the mean curve
    pub percentiles: Vec<f64>,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            n_im_values: DEFAULT_N_IM_VALUES,
            percentiles: vec![0.16, 0.84],
        }
    }
}

/// Hazard curve of a single branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchHazardResult {
    /// Branch name
    pub branch_name: String,
    /// Branch weight
    pub weight: f64,
    /// Hazard curve
    pub curve: HazardCurve,
}

impl BranchHazardResult {
    /// IM level at an exceedance
    pub fn exceedance_to_im(&self, exceedance: f64) -> Result<f64> {
        self.curve.exceedance_to_im(exceedance)
    }

    /// Exceedance at an IM level
    pub fn im_to_exceedance(&self, im_value: f64) -> Result<f64> {
        self.curve.im_to_exceedance(im_value)
    }

    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Branch-percentile hazard curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileCurve {
    /// Percentile as a probability (e.g. 0.16)
    pub percentile: f64,
    /// Exceedance per IM level
    pub values: Vec<f64>,
}

/// Weighted ensemble hazard with its branch curves and percentile bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleHazardResult {
    /// Ensemble name
    pub ensemble_name: String,
    /// Station
    pub station: String,
    /// IM
    pub im: IM,
    /// Mean hazard curve
    pub curve: HazardCurve,
    /// Contributing branch curves
    pub branches: Vec<BranchHazardResult>,
    /// Percentile curves over branches, on the same IM grid
    pub percentiles: Vec<PercentileCurve>,
}

impl EnsembleHazardResult {
    /// IM level of the mean curve at an exceedance
    pub fn exceedance_to_im(&self, exceedance: f64) -> Result<f64> {
        self.curve.exceedance_to_im(exceedance)
    }

    /// Exceedance of the mean curve at an IM level
    pub fn im_to_exceedance(&self, im_value: f64) -> Result<f64> {
        self.curve.im_to_exceedance(im_value)
    }

    /// Percentile curve for `percentile`, if it was computed
    pub fn percentile(&self, percentile: f64) -> Option<&[f64]> {
        self.percentiles
            .iter()
            .find(|p| (p.percentile - percentile).abs() < 1e-9)
            .map(|p| p.values.as_slice())
    }

    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Hazard curve of one branch at a site
///
/// A source kind without any rupture data yields an all-zero component.
pub fn branch_hazard_curve(
    branch: &Branch,
    site: &SiteInfo,
    im: &IM,
    im_values: &[f64],
) -> Result<HazardCurve> {
    let joined = branch.joined_ruptures(site, im)?;
    let mut fault = vec![0.0; im_values.len()];
    let mut ds = vec![0.0; im_values.len()];

    for rupture in &joined {
        let rate = rupture.rupture.annual_rec_prob;
        let target = match rupture.rupture.source {
            SourceKind::Fault => &mut fault,
            SourceKind::Distributed => &mut ds,
        };
        for (h, &x) in target.iter_mut().zip(im_values) {
            *h += rupture.gm.exceedance(x) * rate;
        }
    }

    debug!(
        "Branch {} hazard for {} at {}: {} ruptures",
        branch.name,
        im,
        site.station_name,
        joined.len()
    );
    HazardCurve::new(im_values.to_vec(), fault, ds)
}

/// Weighted ensemble hazard for a site and IM
///
/// Branches are evaluated in parallel. `im_values` defaults to the IM's log grid.
pub fn run_ensemble_hazard(
    ensemble: &Ensemble,
    site: &SiteInfo,
    im: &IM,
    config: &HazardConfig,
    im_values: Option<&[f64]>,
) -> Result<EnsembleHazardResult> {
    ensemble.check_im(im)?;
    let im_ensemble = ensemble.get_im_ensemble(im.im_type)?;
    let im_values = match im_values {
        Some(values) => values.to_vec(),
        None => default_im_values(im, config.n_im_values),
    };

    let branches = im_ensemble
        .branches()
        .par_iter()
        .map(|branch| {
            Ok(BranchHazardResult {
                branch_name: branch.name.clone(),
                weight: branch.weight,
                curve: branch_hazard_curve(branch, site, im, &im_values)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let n = im_values.len();
    let mut fault = vec![0.0; n];
    let mut ds = vec![0.0; n];
    for branch in &branches {
        for i in 0..n {
            fault[i] += branch.weight * branch.curve.fault()[i];
            ds[i] += branch.weight * branch.curve.ds()[i];
        }
    }
    let curve = HazardCurve::new(im_values, fault, ds)?;
    let percentiles = branch_percentiles(&branches, &config.percentiles)?;

    info!(
        "Ensemble hazard for {} at {}: {} branches, {} IM levels",
        im,
        site.station_name,
        branches.len(),
        n
    );
    Ok(EnsembleHazardResult {
        ensemble_name: ensemble.name.clone(),
        station: site.station_name.clone(),
        im: *im,
        curve,
        branches,
        percentiles,
    })
}

/// Percentile curves over branches, computed independently per IM level
pub fn branch_percentiles(
    branches: &[BranchHazardResult],
    percentiles: &[f64],
) -> Result<Vec<PercentileCurve>> {
    let Some(first) = branches.first() else {
        return Ok(Vec::new());
    };
    let n = first.curve.im_values().len();
    let weights: Vec<f64> = branches.iter().map(|b| b.weight).collect();
    let totals: Vec<Vec<f64>> = branches.iter().map(|b| b.curve.total()).collect();

    let mut out: Vec<PercentileCurve> = percentiles
        .iter()
        .map(|&p| PercentileCurve {
            percentile: p,
            values: Vec::with_capacity(n),
        })
        .collect();
    for i in 0..n {
        let at_level: Vec<f64> = totals.iter().map(|t| t[i]).collect();
        let ecdf = WeightedEcdf::new(&at_level, &weights)?;
        for curve in &mut out {
            curve.values.push(ecdf.inverse(curve.percentile));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{ImType, Rupture, RuptureSet, TectonicType};
    use crate::ensemble::{BranchSiteData, GroundMotionData, IMEnsemble, LogNormalParams};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn branch(name: &str, weight: f64, mu_shift: f64) -> Branch {
        let ruptures = Arc::new(
            RuptureSet::new(vec![
                Rupture::new("f1", 0.01, 6.5, TectonicType::ActiveShallow, SourceKind::Fault),
                Rupture::new("d1", 0.05, 5.5, TectonicType::ActiveShallow, SourceKind::Distributed),
            ])
            .unwrap(),
        );
        let mut data = BranchSiteData::default();
        data.gm.insert(
            IM::new(ImType::PGA),
            GroundMotionData::Parametric(vec![
                LogNormalParams::new("f1", -1.5 + mu_shift, 0.6),
                LogNormalParams::new("d1", -2.5 + mu_shift, 0.6),
            ]),
        );
        Branch::new(name, weight, ruptures).with_site("SITE", data)
    }

    fn ensemble(branches: Vec<Branch>) -> Ensemble {
        Ensemble::new(
            "test",
            vec![IMEnsemble::new(vec![ImType::PGA], branches).unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn test_branch_curve_at_median() {
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let b = branch("a", 1.0, 0.0);
        let x = (-1.5f64).exp();
        let curve = branch_hazard_curve(&b, &site, &IM::new(ImType::PGA), &[x]).unwrap();
        assert_relative_eq!(curve.fault()[0], 0.005, max_relative = 1e-9);
        assert!(curve.ds()[0] > 0.0 && curve.ds()[0] < 0.05);
    }

    #[test]
    fn test_ensemble_is_weighted_sum() {
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let ens = ensemble(vec![branch("a", 0.3, 0.0), branch("b", 0.7, 0.5)]);
        let im = IM::new(ImType::PGA);
        let result = run_ensemble_hazard(&ens, &site, &im, &HazardConfig::default(), None).unwrap();

        assert_eq!(result.curve.im_values().len(), DEFAULT_N_IM_VALUES);
        assert!(result.curve.is_monotonic());
        let total = result.curve.total();
        let a = result.branches[0].curve.total();
        let b = result.branches[1].curve.total();
        for i in (0..DEFAULT_N_IM_VALUES).step_by(17) {
            assert_relative_eq!(total[i], 0.3 * a[i] + 0.7 * b[i], max_relative = 1e-12);
        }
    }

    #[test]
    fn test_percentiles_bracket_branches() {
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let ens = ensemble(vec![
            branch("a", 0.25, -0.3),
            branch("b", 0.5, 0.0),
            branch("c", 0.25, 0.3),
        ]);
        let result = run_ensemble_hazard(
            &ens,
            &site,
            &IM::new(ImType::PGA),
            &HazardConfig::default(),
            None,
        )
        .unwrap();
        let p16 = result.percentile(0.16).unwrap();
        let p84 = result.percentile(0.84).unwrap();
        let low = result.branches[0].curve.total();
        let high = result.branches[2].curve.total();
        for i in 0..p16.len() {
            assert!(p16[i] >= low[i] - 1e-15 && p84[i] <= high[i] + 1e-15);
        }
    }

    #[test]
    fn test_unsupported_im_fails_before_computation() {
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let ens = ensemble(vec![branch("a", 1.0, 0.0)]);
        let result = run_ensemble_hazard(
            &ens,
            &site,
            &IM::psa(1.0),
            &HazardConfig::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(crate::error::PshaError::UnsupportedIm(_))
        ));
    }
}
