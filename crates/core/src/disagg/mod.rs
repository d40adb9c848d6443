//! Disaggregation of hazard by rupture
//!
//! For a target IM level x, a rupture's contribution to a branch's hazard is
//!
//! ```text
//! c_r = P[IM > x | r] * annual_rec_prob(r) / H_branch(x)
//! ```
//!
//! Branch results are combined with hazard-consistent weights
//! `w_b * H_b(x) / H_mean(x)` rather than the raw branch weights, so the
//! ensemble contributions again sum to one. A branch with zero hazard at x gets
//! zero weight.
//!
//! Epsilon is `(ln x - mu) / sigma` for lognormal ruptures. For simulated ruptures
//! it is the standard-normal quantile that reproduces the rupture's exceedance
//! probability at x.

pub mod grid;

pub use grid::{DisaggGridConfig, DisaggGridData};

use crate::core_types::{HazardQuery, RuptureId, SiteInfo, SourceKind, IM};
use crate::ensemble::{Branch, Ensemble};
use crate::error::{PshaError, Result};
use crate::float_serde;
use crate::hazard::{run_ensemble_hazard, HazardConfig};
use crate::stats::WeightedEcdf;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Contribution of one rupture to the hazard at the target IM level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuptureContribution {
    /// Rupture
    pub rupture_id: RuptureId,
    /// Source kind
    pub source: SourceKind,
    /// Magnitude
    pub magnitude: f64,
    /// Rupture distance to the site (km), when known
    pub rrup: Option<f64>,
    /// Annual recurrence probability
    pub annual_rec_prob: f64,
    /// Fraction of the total hazard
    pub contribution: f64,
    /// Epsilon of the target IM level (NaN when undefined)
    #[serde(with = "float_serde::scalar")]
    pub epsilon: f64,
}

/// Contribution-weighted summary statistics of a disaggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisaggSummary {
    /// Mean magnitude
    pub mean_magnitude: f64,
    /// Mean rupture distance (km)
    #[serde(with = "float_serde::scalar")]
    pub mean_rrup: f64,
    /// Mean epsilon
    #[serde(with = "float_serde::scalar")]
    pub mean_epsilon: f64,
    /// Mean recurrence interval (years)
    pub mean_recurrence_interval: f64,
    /// 16th percentile magnitude
    pub magnitude_16th: f64,
    /// 84th percentile magnitude
    pub magnitude_84th: f64,
    /// 16th percentile rupture distance (km)
    #[serde(with = "float_serde::scalar")]
    pub rrup_16th: f64,
    /// 84th percentile rupture distance (km)
    #[serde(with = "float_serde::scalar")]
    pub rrup_84th: f64,
}

impl DisaggSummary {
    /// Summarise contributions; zero-contribution ruptures are ignored
    pub fn from_contributions(contributions: &[RuptureContribution]) -> Result<Self> {
        let active: Vec<&RuptureContribution> = contributions
            .iter()
            .filter(|c| c.contribution > 0.0)
            .collect();
        if active.is_empty() {
            return Err(PshaError::NoCandidates {
                context: "disaggregation has no contributing ruptures".to_string(),
            });
        }

        let weights: Vec<f64> = active.iter().map(|c| c.contribution).collect();
        let magnitudes: Vec<f64> = active.iter().map(|c| c.magnitude).collect();
        let mag_ecdf = WeightedEcdf::new(&magnitudes, &weights)?;

        let (rrups, rrup_weights): (Vec<f64>, Vec<f64>) = active
            .iter()
            .filter_map(|c| c.rrup.map(|r| (r, c.contribution)))
            .unzip();
        let (mean_rrup, rrup_16th, rrup_84th) = match WeightedEcdf::new(&rrups, &rrup_weights) {
            Ok(ecdf) => (ecdf.mean(), ecdf.inverse(0.16), ecdf.inverse(0.84)),
            Err(_) => (f64::NAN, f64::NAN, f64::NAN),
        };

        Ok(Self {
            mean_magnitude: weighted_mean(active.iter().map(|c| (c.magnitude, c.contribution))),
            mean_rrup,
            mean_epsilon: weighted_mean(
                active
                    .iter()
                    .filter(|c| c.epsilon.is_finite())
                    .map(|c| (c.epsilon, c.contribution)),
            ),
            mean_recurrence_interval: weighted_mean(
                active
                    .iter()
                    .map(|c| (1.0 / c.annual_rec_prob, c.contribution)),
            ),
            magnitude_16th: mag_ecdf.inverse(0.16),
            magnitude_84th: mag_ecdf.inverse(0.84),
            rrup_16th,
            rrup_84th,
        })
    }
}

fn weighted_mean(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    let (sum, total) = pairs.fold((0.0, 0.0), |(s, t), (v, w)| (s + v * w, t + w));
    if total > 0.0 {
        sum / total
    } else {
        f64::NAN
    }
}

/// Disaggregation of a single branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDisaggResult {
    /// Branch name
    pub branch_name: String,
    /// Branch weight
    pub weight: f64,
    /// Target IM level
    pub im_value: f64,
    /// Branch hazard at the target IM level
    pub total_hazard: f64,
    /// Per-rupture contributions (all zero when the branch hazard is zero)
    pub contributions: Vec<RuptureContribution>,
}

impl BranchDisaggResult {
    /// Sum of contributions (one, or zero for a zero-hazard branch)
    pub fn contribution_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }
}

/// Disaggregate one branch's hazard at `im_value`
pub fn branch_disagg(
    branch: &Branch,
    site: &SiteInfo,
    im: &IM,
    im_value: f64,
) -> Result<BranchDisaggResult> {
    let joined = branch.joined_ruptures(site, im)?;
    let rates: Vec<f64> = joined
        .iter()
        .map(|j| j.gm.exceedance(im_value) * j.rupture.annual_rec_prob)
        .collect();
    let total_hazard: f64 = rates.iter().sum();
    if total_hazard <= 0.0 {
        debug!(
            "Branch {} has zero hazard at {} = {}",
            branch.name, im, im_value
        );
    }

    let contributions = joined
        .iter()
        .zip(&rates)
        .map(|(j, &rate)| RuptureContribution {
            rupture_id: j.rupture.id.clone(),
            source: j.rupture.source,
            magnitude: j.rupture.magnitude,
            rrup: j.rrup,
            annual_rec_prob: j.rupture.annual_rec_prob,
            contribution: if total_hazard > 0.0 {
                rate / total_hazard
            } else {
                0.0
            },
            epsilon: j.gm.epsilon(im_value),
        })
        .collect();

    Ok(BranchDisaggResult {
        branch_name: branch.name.clone(),
        weight: branch.weight,
        im_value,
        total_hazard,
        contributions,
    })
}

/// Hazard-consistent branch weights `w_b * H_b / sum(w_b * H_b)`
///
/// These sum to one by construction whenever any branch has hazard; zero-hazard
/// branches get zero weight.
pub fn disagg_mean_weights(weights: &[f64], hazards: &[f64]) -> Result<Vec<f64>> {
    let mean_hazard: f64 = weights.iter().zip(hazards).map(|(w, h)| w * h).sum();
    if !(mean_hazard > 0.0) {
        return Err(PshaError::NoCandidates {
            context: "no branch has hazard at the disaggregation target".to_string(),
        });
    }
    Ok(weights
        .iter()
        .zip(hazards)
        .map(|(w, h)| if *h > 0.0 { w * h / mean_hazard } else { 0.0 })
        .collect())
}

/// Ensemble disaggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDisaggResult {
    /// Ensemble name
    pub ensemble_name: String,
    /// Station
    pub station: String,
    /// IM
    pub im: IM,
    /// Query the target was resolved from
    pub query: HazardQuery,
    /// Target IM level
    pub im_value: f64,
    /// Mean annual exceedance at the target IM level
    pub exceedance: f64,
    /// Hazard-consistent branch weights
    pub adjusted_weights: Vec<f64>,
    /// Combined per-rupture contributions, sorted by descending contribution
    pub contributions: Vec<RuptureContribution>,
    /// Contribution-weighted summary
    pub summary: DisaggSummary,
    /// Per-branch results
    pub branches: Vec<BranchDisaggResult>,
}

impl EnsembleDisaggResult {
    /// Fault-rupture contributions by rupture id
    pub fn fault_contributions(&self) -> FxHashMap<RuptureId, f64> {
        self.contributions_of(SourceKind::Fault)
    }

    /// Distributed-seismicity contributions by rupture id
    pub fn ds_contributions(&self) -> FxHashMap<RuptureId, f64> {
        self.contributions_of(SourceKind::Distributed)
    }

    fn contributions_of(&self, source: SourceKind) -> FxHashMap<RuptureId, f64> {
        self.contributions
            .iter()
            .filter(|c| c.source == source)
            .map(|c| (c.rupture_id.clone(), c.contribution))
            .collect()
    }

    /// Epsilon per rupture
    pub fn epsilons(&self) -> FxHashMap<RuptureId, f64> {
        self.contributions
            .iter()
            .map(|c| (c.rupture_id.clone(), c.epsilon))
            .collect()
    }

    /// Total contribution (one up to rounding)
    pub fn contribution_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// Magnitude / distance / epsilon grid of the contributions
    pub fn grid(&self, config: &DisaggGridConfig) -> Result<DisaggGridData> {
        DisaggGridData::from_contributions(&self.contributions, config)
    }

    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Resolve a hazard query to an IM level
///
/// Exceedance queries are inverted on the ensemble mean hazard curve and fail with
/// `ExceedanceOutOfRange` outside of it.
pub fn resolve_im_value(
    ensemble: &Ensemble,
    site: &SiteInfo,
    im: &IM,
    query: HazardQuery,
    config: &HazardConfig,
) -> Result<f64> {
    match query {
        HazardQuery::ImLevel(value) => Ok(value),
        HazardQuery::Exceedance(exceedance) => {
            let hazard = run_ensemble_hazard(ensemble, site, im, config, None)?;
            hazard.exceedance_to_im(exceedance)
        }
    }
}

/// Disaggregate the ensemble hazard for a site, IM and target
pub fn run_ensemble_disagg(
    ensemble: &Ensemble,
    site: &SiteInfo,
    im: &IM,
    query: HazardQuery,
    config: &HazardConfig,
) -> Result<EnsembleDisaggResult> {
    ensemble.check_im(im)?;
    let im_ensemble = ensemble.get_im_ensemble(im.im_type)?;
    let im_value = resolve_im_value(ensemble, site, im, query, config)?;
    info!(
        "Disaggregation for {} at {}: {} resolved to IM level {:.5}",
        im, site.station_name, query, im_value
    );

    let branches = im_ensemble
        .branches()
        .par_iter()
        .map(|branch| branch_disagg(branch, site, im, im_value))
        .collect::<Result<Vec<_>>>()?;

    let weights: Vec<f64> = branches.iter().map(|b| b.weight).collect();
    let hazards: Vec<f64> = branches.iter().map(|b| b.total_hazard).collect();
    let adjusted_weights = disagg_mean_weights(&weights, &hazards)?;
    let exceedance: f64 = weights.iter().zip(&hazards).map(|(w, h)| w * h).sum();

    let contributions = combine_branches(&branches, &adjusted_weights);
    let summary = DisaggSummary::from_contributions(&contributions)?;

    Ok(EnsembleDisaggResult {
        ensemble_name: ensemble.name.clone(),
        station: site.station_name.clone(),
        im: *im,
        query,
        im_value,
        exceedance,
        adjusted_weights,
        contributions,
        summary,
        branches,
    })
}

/// Sum branch contributions with the adjusted weights
///
/// A rupture's epsilon is the contribution-weighted mean of its branch epsilons.
fn combine_branches(
    branches: &[BranchDisaggResult],
    adjusted_weights: &[f64],
) -> Vec<RuptureContribution> {
    struct Acc {
        record: RuptureContribution,
        eps_sum: f64,
        eps_weight: f64,
    }

    let mut order: Vec<RuptureId> = Vec::new();
    let mut acc: FxHashMap<RuptureId, Acc> = FxHashMap::default();
    for (branch, &weight) in branches.iter().zip(adjusted_weights) {
        for c in &branch.contributions {
            let weighted = weight * c.contribution;
            let entry = acc.entry(c.rupture_id.clone()).or_insert_with(|| {
                order.push(c.rupture_id.clone());
                Acc {
                    record: RuptureContribution {
                        contribution: 0.0,
                        epsilon: c.epsilon,
                        ..c.clone()
                    },
                    eps_sum: 0.0,
                    eps_weight: 0.0,
                }
            });
            entry.record.contribution += weighted;
            if weighted > 0.0 && c.epsilon.is_finite() {
                entry.eps_sum += weighted * c.epsilon;
                entry.eps_weight += weighted;
            }
        }
    }

    let mut out: Vec<RuptureContribution> = order
        .iter()
        .filter_map(|id| acc.remove(id))
        .map(|a| {
            let mut record = a.record;
            if a.eps_weight > 0.0 {
                record.epsilon = a.eps_sum / a.eps_weight;
            }
            record
        })
        .collect();
    out.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    out
}
