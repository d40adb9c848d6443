//! Scenario spectra for a single rupture
//!
//! No hazard integration: the GMM predictions of each branch for one rupture are
//! combined across branches in log space,
//!
//! ```text
//! mean        = sum_b w_b * mu_b
//! sigma_tot^2 = sum_b w_b * sigma_b^2 + sum_b w_b^2 * (mu_b - mean)^2
//! ```
//!
//! and reported as a median `exp(mean)` with 16th / 84th bands
//! `exp(mean -/+ sigma_tot)`.

use crate::core_types::{RuptureId, SiteInfo, IM};
use crate::ensemble::{Ensemble, GroundMotionData};
use crate::error::{PshaError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// GMM prediction of one branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBranch {
    /// Branch name
    pub branch_name: String,
    /// Branch weight
    pub weight: f64,
    /// Mean of ln(IM)
    pub mu: f64,
    /// Standard deviation of ln(IM)
    pub sigma: f64,
}

/// Combined scenario prediction for one IM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioIm {
    /// IM
    pub im: IM,
    /// Weighted mean of ln(IM)
    pub mean_ln: f64,
    /// Total standard deviation of ln(IM)
    pub sigma_total: f64,
    /// Median IM
    pub median: f64,
    /// 16th percentile IM
    pub p16: f64,
    /// 84th percentile IM
    pub p84: f64,
    /// Branch predictions
    pub branches: Vec<ScenarioBranch>,
}

/// Scenario spectrum of a rupture at a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Station
    pub station: String,
    /// Scenario rupture
    pub rupture_id: RuptureId,
    /// Prediction per IM, in request order
    pub ims: Vec<ScenarioIm>,
}

impl ScenarioResult {
    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Combine branch predictions with the weighted variance decomposition
pub fn combine_branches(im: IM, branches: Vec<ScenarioBranch>) -> ScenarioIm {
    let mean_ln: f64 = branches.iter().map(|b| b.weight * b.mu).sum();
    let within: f64 = branches.iter().map(|b| b.weight * b.sigma.powi(2)).sum();
    let between: f64 = branches
        .iter()
        .map(|b| b.weight.powi(2) * (b.mu - mean_ln).powi(2))
        .sum();
    let sigma_total = (within + between).sqrt();
    let median = mean_ln.exp();
    ScenarioIm {
        im,
        mean_ln,
        sigma_total,
        median,
        p16: median * (-sigma_total).exp(),
        p84: median * sigma_total.exp(),
        branches,
    }
}

/// Scenario prediction of `rupture_id` at `site` for each IM
///
/// Every branch of the IMs' ensembles needs GMM (lognormal) data for the rupture.
pub fn run_scenario(
    ensemble: &Ensemble,
    site: &SiteInfo,
    rupture_id: &RuptureId,
    ims: &[IM],
) -> Result<ScenarioResult> {
    let mut out = Vec::with_capacity(ims.len());
    for im in ims {
        ensemble.check_im(im)?;
        let im_ensemble = ensemble.get_im_ensemble(im.im_type)?;
        let branches = im_ensemble
            .branches()
            .iter()
            .map(|branch| {
                let GroundMotionData::Parametric(params) = branch.gm_data(site, im)? else {
                    return Err(PshaError::InvalidParameter(format!(
                        "scenario needs GMM data, branch {} has simulations for {}",
                        branch.name, im
                    )));
                };
                let p = params
                    .iter()
                    .find(|p| &p.rupture_id == rupture_id)
                    .ok_or_else(|| PshaError::MismatchedRuptureKeys {
                        context: format!("scenario rupture {} in branch {}", rupture_id, branch.name),
                        missing: 1,
                    })?;
                Ok(ScenarioBranch {
                    branch_name: branch.name.clone(),
                    weight: branch.weight,
                    mu: p.mu,
                    sigma: p.sigma,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        out.push(combine_branches(*im, branches));
    }

    info!(
        "Scenario {} at {}: {} IMs",
        rupture_id,
        site.station_name,
        ims.len()
    );
    Ok(ScenarioResult {
        station: site.station_name.clone(),
        rupture_id: rupture_id.clone(),
        ims: out,
    })
}
