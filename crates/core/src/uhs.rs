//! Uniform hazard spectra
//!
//! The ensemble hazard is computed for every spectral IM (in parallel) and each curve
//! is inverted at the requested exceedances. A cell whose curve does not reach the
//! exceedance is NaN rather than an error, so a spectrum can cover only part of the
//! period range.
//!
//! Percentiles are taken at fixed exceedance: each branch's curve is inverted to an
//! IM level and the branch-weighted empirical CDF of those levels is inverted at
//! 0.16 / 0.84. Branches that cannot reach the exceedance are dropped and the
//! remaining weights renormalised.

use crate::core_types::{ImType, SiteInfo, IM};
use crate::ensemble::Ensemble;
use crate::error::{PshaError, Result};
use crate::float_serde;
use crate::hazard::{run_ensemble_hazard, EnsembleHazardResult, HazardConfig};
use crate::stats::WeightedEcdf;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Spectrum of a single branch at one exceedance
///
/// Branches belong to one IM ensemble, so a branch only has values at the periods
/// its IM ensemble covers. The other periods are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSpectrum {
    /// Branch name
    pub branch_name: String,
    /// IM types of the branch's IM ensemble
    pub im_types: Vec<ImType>,
    /// Branch weight
    pub weight: f64,
    /// IM level per period
    #[serde(with = "float_serde::vec")]
    pub values: Vec<f64>,
}

/// Uniform hazard spectrum at one exceedance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UhsResult {
    /// Station
    pub station: String,
    /// Annual exceedance probability
    pub exceedance: f64,
    /// IMs in period order
    pub ims: Vec<IM>,
    /// Periods (PGA at 0)
    pub periods: Vec<f64>,
    /// IM level of the mean hazard curve per period
    #[serde(with = "float_serde::vec")]
    pub mean: Vec<f64>,
    /// 16th percentile IM level over branches
    #[serde(with = "float_serde::vec")]
    pub p16: Vec<f64>,
    /// 84th percentile IM level over branches
    #[serde(with = "float_serde::vec")]
    pub p84: Vec<f64>,
    /// Per-branch spectra
    pub branches: Vec<BranchSpectrum>,
}

impl UhsResult {
    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Period of a spectral IM for UHS ordering
fn uhs_period(im: &IM) -> f64 {
    match im.im_type {
        ImType::PGA => 0.0,
        _ => im.period.unwrap_or(0.0),
    }
}

/// Invert, mapping an out-of-range exceedance to NaN
fn invert_or_nan(result: Result<f64>) -> Result<f64> {
    match result {
        Ok(v) => Ok(v),
        Err(PshaError::ExceedanceOutOfRange { .. }) => Ok(f64::NAN),
        Err(e) => Err(e),
    }
}

/// Weighted percentile of branch IM levels, ignoring NaN branches
fn branch_percentile(values: &[f64], weights: &[f64], percentile: f64) -> f64 {
    WeightedEcdf::new(values, weights).map_or(f64::NAN, |ecdf| ecdf.inverse(percentile))
}

/// Collect per-IM branch levels into one spectrum per (IM ensemble, branch)
///
/// `groups[i]` is the IM ensemble index of `hazards[i]` and `levels[i]` holds its
/// branch levels in branch order.
fn branch_spectra(
    ensemble: &Ensemble,
    hazards: &[EnsembleHazardResult],
    groups: &[usize],
    levels: &[Vec<f64>],
) -> Vec<BranchSpectrum> {
    let n = hazards.len();
    let mut spectra: Vec<(usize, BranchSpectrum)> = Vec::new();
    for (i, hazard) in hazards.iter().enumerate() {
        let group = groups[i];
        for (branch, &level) in hazard.branches.iter().zip(&levels[i]) {
            let existing = spectra
                .iter()
                .position(|(g, s)| *g == group && s.branch_name == branch.branch_name);
            let k = existing.unwrap_or_else(|| {
                spectra.push((
                    group,
                    BranchSpectrum {
                        branch_name: branch.branch_name.clone(),
                        im_types: ensemble.im_ensembles()[group].im_types().to_vec(),
                        weight: branch.weight,
                        values: vec![f64::NAN; n],
                    },
                ));
                spectra.len() - 1
            });
            spectra[k].1.values[i] = level;
        }
    }
    spectra.into_iter().map(|(_, s)| s).collect()
}

/// Uniform hazard spectra for a site, one per exceedance
pub fn run_uhs(
    ensemble: &Ensemble,
    site: &SiteInfo,
    ims: &[IM],
    exceedances: &[f64],
    config: &HazardConfig,
) -> Result<Vec<UhsResult>> {
    if let Some(im) = ims.iter().find(|im| !im.is_spectral()) {
        return Err(PshaError::InvalidParameter(format!(
            "UHS needs PGA / pSA IMs, got {im}"
        )));
    }
    for im in ims {
        ensemble.check_im(im)?;
    }

    let mut hazards = ims
        .par_iter()
        .map(|im| run_ensemble_hazard(ensemble, site, im, config, None))
        .collect::<Result<Vec<EnsembleHazardResult>>>()?;
    hazards.sort_by(|a, b| uhs_period(&a.im).total_cmp(&uhs_period(&b.im)));

    let sorted_ims: Vec<IM> = hazards.iter().map(|h| h.im).collect();
    let periods: Vec<f64> = sorted_ims.iter().map(uhs_period).collect();
    let groups = sorted_ims
        .iter()
        .map(|im| {
            ensemble
                .im_ensembles()
                .iter()
                .position(|e| e.im_types().contains(&im.im_type))
                .ok_or_else(|| PshaError::UnsupportedIm(im.to_string()))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut results = Vec::with_capacity(exceedances.len());
    for &exceedance in exceedances {
        let mut mean = Vec::with_capacity(hazards.len());
        let mut p16 = Vec::with_capacity(hazards.len());
        let mut p84 = Vec::with_capacity(hazards.len());
        let mut per_branch: Vec<Vec<f64>> = Vec::new();

        for hazard in &hazards {
            mean.push(invert_or_nan(hazard.exceedance_to_im(exceedance))?);
            let values = hazard
                .branches
                .iter()
                .map(|b| invert_or_nan(b.exceedance_to_im(exceedance)))
                .collect::<Result<Vec<f64>>>()?;
            let weights: Vec<f64> = hazard.branches.iter().map(|b| b.weight).collect();
            p16.push(branch_percentile(&values, &weights, 0.16));
            p84.push(branch_percentile(&values, &weights, 0.84));
            per_branch.push(values);
        }

        let branches = branch_spectra(ensemble, &hazards, &groups, &per_branch);

        results.push(UhsResult {
            station: site.station_name.clone(),
            exceedance,
            ims: sorted_ims.clone(),
            periods: periods.clone(),
            mean,
            p16,
            p84,
            branches,
        });
    }

    info!(
        "UHS at {}: {} periods x {} exceedances",
        site.station_name,
        periods.len(),
        exceedances.len()
    );
    Ok(results)
}
