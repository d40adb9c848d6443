//! Per-rupture ground-motion distributions and their join with rupture tables
//!
//! Ground-motion data for one branch, site and IM is either parametric (lognormal
//! `mu`/`sigma` per rupture, from a GMM) or empirical (simulated IM values per
//! rupture). Before any hazard integration the data is joined to the branch's
//! rupture table by [`RuptureId`]; ids that are not in the table fail the join.

use crate::core_types::{Rupture, RuptureId, RuptureSet};
use crate::error::{PshaError, Result};
use crate::stats::{lognormal_exceedance, std_normal_ppf};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Lognormal ground-motion parameters of one rupture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogNormalParams {
    /// Rupture
    pub rupture_id: RuptureId,
    /// Mean of ln(IM)
    pub mu: f64,
    /// Standard deviation of ln(IM)
    pub sigma: f64,
}

impl LogNormalParams {
    /// Create parameters for a rupture
    pub fn new(rupture_id: impl Into<String>, mu: f64, sigma: f64) -> Self {
        Self {
            rupture_id: RuptureId::new(rupture_id),
            mu,
            sigma,
        }
    }
}

#[derive(Deserialize)]
struct RawSamples {
    rupture_id: RuptureId,
    values: Vec<f64>,
}

/// Simulated IM values of one rupture (kept sorted ascending)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSamples")]
pub struct EmpiricalSamples {
    rupture_id: RuptureId,
    values: Vec<f64>,
}

impl From<RawSamples> for EmpiricalSamples {
    fn from(raw: RawSamples) -> Self {
        Self::new(raw.rupture_id, raw.values)
    }
}

impl EmpiricalSamples {
    /// Wrap samples; non-finite values are dropped
    pub fn new(rupture_id: impl Into<RuptureId>, mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        values.sort_by(f64::total_cmp);
        Self {
            rupture_id: rupture_id.into(),
            values,
        }
    }

    /// Rupture
    pub fn rupture_id(&self) -> &RuptureId {
        &self.rupture_id
    }

    /// Sorted IM values
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Ground-motion data of one branch for one site and IM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundMotionData {
    /// GMM lognormal parameters per rupture
    Parametric(Vec<LogNormalParams>),
    /// Simulated IM values per rupture
    Empirical(Vec<EmpiricalSamples>),
}

impl GroundMotionData {
    /// Number of ruptures with data
    pub fn len(&self) -> usize {
        match self {
            Self::Parametric(p) => p.len(),
            Self::Empirical(e) => e.len(),
        }
    }

    /// Whether there is no data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is GMM (lognormal) data
    pub fn is_parametric(&self) -> bool {
        matches!(self, Self::Parametric(_))
    }

    fn rupture_ids(&self) -> Vec<&RuptureId> {
        match self {
            Self::Parametric(p) => p.iter().map(|r| &r.rupture_id).collect(),
            Self::Empirical(e) => e.iter().map(|r| &r.rupture_id).collect(),
        }
    }
}

/// Ground-motion distribution of a single rupture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuptureGm<'a> {
    /// ln(IM) ~ N(mu, sigma)
    LogNormal {
        /// Mean of ln(IM)
        mu: f64,
        /// Standard deviation of ln(IM)
        sigma: f64,
    },
    /// Sorted simulated values
    Empirical(&'a [f64]),
}

impl RuptureGm<'_> {
    /// P[IM > x | rupture]
    pub fn exceedance(&self, x: f64) -> f64 {
        match *self {
            Self::LogNormal { mu, sigma } => lognormal_exceedance(x, mu, sigma),
            Self::Empirical(values) => {
                if values.is_empty() {
                    return 0.0;
                }
                let above = values.len() - values.partition_point(|&v| v <= x);
                above as f64 / values.len() as f64
            }
        }
    }

    /// Number of standard deviations between the rupture's ground motion and `x`
    ///
    /// Lognormal: `(ln x - mu) / sigma`. Empirical: the standard-normal quantile that
    /// reproduces the rupture's exceedance probability, P[IM > x] = P[Z > epsilon].
    pub fn epsilon(&self, x: f64) -> f64 {
        match *self {
            Self::LogNormal { mu, sigma } => (x.ln() - mu) / sigma,
            Self::Empirical(_) => epsilon_from_exceedance(self.exceedance(x)),
        }
    }
}

/// Epsilon implied by an exceedance probability under the standard normal
pub fn epsilon_from_exceedance(p_exceedance: f64) -> f64 {
    -std_normal_ppf(p_exceedance)
}

/// A rupture joined with its ground-motion distribution and site distance
#[derive(Debug, Clone, Copy)]
pub struct JoinedRupture<'a> {
    /// Rupture table entry
    pub rupture: &'a Rupture,
    /// Ground-motion distribution at the site
    pub gm: RuptureGm<'a>,
    /// Rupture distance to the site (km), when known
    pub rrup: Option<f64>,
}

/// Join ground-motion data with a rupture table
///
/// Every rupture id in `gm` must exist in `ruptures` and appear only once.
/// Ruptures without ground-motion data do not contribute at this site.
pub fn join_ruptures<'a>(
    ruptures: &'a RuptureSet,
    gm: &'a GroundMotionData,
    rrup: &FxHashMap<RuptureId, f64>,
    context: &str,
) -> Result<Vec<JoinedRupture<'a>>> {
    let ids = gm.rupture_ids();
    let mut seen = FxHashSet::default();
    let unmatched = ids
        .iter()
        .filter(|id| ruptures.get(id).is_none() || !seen.insert(**id))
        .count();
    if unmatched > 0 {
        return Err(PshaError::MismatchedRuptureKeys {
            context: context.to_string(),
            missing: unmatched,
        });
    }

    let joined = match gm {
        GroundMotionData::Parametric(params) => params
            .iter()
            .filter_map(|p| {
                ruptures.get(&p.rupture_id).map(|rupture| JoinedRupture {
                    rupture,
                    gm: RuptureGm::LogNormal {
                        mu: p.mu,
                        sigma: p.sigma,
                    },
                    rrup: rrup.get(&p.rupture_id).copied(),
                })
            })
            .collect(),
        GroundMotionData::Empirical(samples) => samples
            .iter()
            .filter_map(|s| {
                ruptures.get(&s.rupture_id).map(|rupture| JoinedRupture {
                    rupture,
                    gm: RuptureGm::Empirical(&s.values),
                    rrup: rrup.get(&s.rupture_id).copied(),
                })
            })
            .collect(),
    };
    Ok(joined)
}
