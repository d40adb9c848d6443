//! Generalised conditional intensity measure (GCIM) distributions
//!
//! The distribution of a target IM vector given the conditioning IM_j = im_j, built
//! one of two ways:
//!
//! - **Empirical**: a pool of simulated IM vectors is weighted by a Gaussian kernel on
//!   the conditioning IM, `w = exp(-0.5 * ((ln IM_j - ln im_j) / sigma)^2)`, with zero
//!   weight beyond `n_sigma` standard deviations. Marginals are weighted empirical
//!   CDFs and the joint structure is the kernel-weighted correlation of ln IM
//!   (Gaussian copula).
//! - **Parametric**: each rupture's lognormal GMM prediction is conditioned on im_j
//!   by bivariate-normal conditioning,
//!   `mu_i|j = mu_i + sigma_i * rho_ij * eps_j`, `sigma_i|j = sigma_i * sqrt(1 - rho_ij^2)`,
//!   and ruptures are mixed with their hazard-consistent disaggregation weights.
//!
//! # Scientific References
//! - Bradley, B.A. (2010). "A generalized conditional intensity measure approach and
//!   holistic ground-motion selection". Earthquake Engng Struct. Dyn., 39, 1321-1342
//! - Baker, J.W., Jayaram, N. (2008). Earthquake Spectra, 24(1), 299-317

use super::dataset::GMRecord;
use super::realisations::Realisations;
use crate::core_types::{RuptureId, SiteInfo, IM};
use crate::disagg::{branch_disagg, disagg_mean_weights};
use crate::ensemble::{Branch, Ensemble, GroundMotionData};
use crate::error::{PshaError, Result};
use crate::stats::{
    baker_jayaram_2008, cholesky_with_repair, std_normal_cdf, weighted_correlation, WeightedEcdf,
};
use nalgebra::{DMatrix, DVector};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use rand_distr::StandardNormal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gaussian kernel on the conditioning IM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Kernel standard deviation in ln units
    pub sigma: f64,
    /// Truncation in kernel standard deviations
    pub n_sigma: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            sigma: 0.1,
            n_sigma: 3.0,
        }
    }
}

impl KernelConfig {
    /// Kernel weight of a pool member with conditioning value `x`
    pub fn weight(&self, x: f64, im_j_value: f64) -> f64 {
        if !(x > 0.0) {
            return 0.0;
        }
        let z = (x.ln() - im_j_value.ln()) / self.sigma;
        if z.abs() > self.n_sigma {
            0.0
        } else {
            (-0.5 * z * z).exp()
        }
    }
}

/// Simulated IM vectors used by the empirical GCIM
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool {
    ims: Vec<IM>,
    values: DMatrix<f64>,
    prior_weights: Vec<f64>,
}

impl CandidatePool {
    /// Pool from an (n_members x n_ims) matrix of IM values and per-member prior weights
    pub fn new(ims: Vec<IM>, values: DMatrix<f64>, prior_weights: Vec<f64>) -> Result<Self> {
        if values.ncols() != ims.len() || values.nrows() != prior_weights.len() {
            return Err(PshaError::InvalidParameter(format!(
                "pool matrix is {}x{} for {} IMs and {} weights",
                values.nrows(),
                values.ncols(),
                ims.len(),
                prior_weights.len()
            )));
        }
        Ok(Self {
            ims,
            values,
            prior_weights,
        })
    }

    /// Equally weighted pool from records carrying every IM in `ims`
    pub fn from_records(records: &[GMRecord], ims: &[IM]) -> Result<Self> {
        let rows: Vec<Vec<f64>> = records
            .iter()
            .filter_map(|r| ims.iter().map(|im| r.im_value(im)).collect())
            .collect();
        let values = DMatrix::from_fn(rows.len(), ims.len(), |i, j| rows[i][j]);
        Self::new(ims.to_vec(), values, vec![1.0; rows.len()])
    }

    /// Number of pool members
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn column(&self, im: &IM) -> Result<usize> {
        self.ims
            .iter()
            .position(|x| x == im)
            .ok_or_else(|| PshaError::MissingImData {
                branch: "candidate pool".to_string(),
                im: im.to_string(),
            })
    }
}

/// One lognormal component of a marginal mixture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixtureComponent {
    /// Mixture weight
    pub weight: f64,
    /// Mean of ln(IM)
    pub mu: f64,
    /// Standard deviation of ln(IM)
    pub sigma: f64,
}

/// Marginal GCIM distribution of one target IM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcimMarginal {
    /// Kernel-weighted empirical CDF
    Empirical(WeightedEcdf),
    /// Mixture of conditional lognormals
    LogNormalMixture(Vec<MixtureComponent>),
}

impl GcimMarginal {
    /// P[IM <= x | IM_j = im_j]
    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            Self::Empirical(ecdf) => ecdf.cdf(x),
            Self::LogNormalMixture(components) => {
                if x <= 0.0 {
                    return 0.0;
                }
                let ln_x = x.ln();
                components
                    .iter()
                    .map(|c| c.weight * std_normal_cdf((ln_x - c.mu) / c.sigma))
                    .sum()
            }
        }
    }

    /// Value at probability `p`
    pub fn quantile(&self, p: f64) -> f64 {
        match self {
            Self::Empirical(ecdf) => ecdf.inverse(p),
            Self::LogNormalMixture(components) => {
                // Bisection in ln space over the components' +/- 8 sigma envelope
                let mut lo = components
                    .iter()
                    .map(|c| c.mu - 8.0 * c.sigma)
                    .fold(f64::INFINITY, f64::min);
                let mut hi = components
                    .iter()
                    .map(|c| c.mu + 8.0 * c.sigma)
                    .fold(f64::NEG_INFINITY, f64::max);
                for _ in 0..100 {
                    let mid = 0.5 * (lo + hi);
                    if self.cdf(mid.exp()) < p {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                (0.5 * (lo + hi)).exp()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ConditionalRupture {
    weight: f64,
    mu: Vec<f64>,
    sigma: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum GcimModel {
    Empirical,
    Parametric(Vec<ConditionalRupture>),
}

/// Conditional distribution of target IMs given IM_j = im_j
#[derive(Debug, Clone, PartialEq)]
pub struct Gcim {
    /// Conditioning IM
    pub im_j: IM,
    /// Conditioning IM level
    pub im_j_value: f64,
    /// Target IMs
    pub ims: Vec<IM>,
    /// Marginal distribution per target IM
    pub marginals: Vec<GcimMarginal>,
    correlation: DMatrix<f64>,
    chol: DMatrix<f64>,
    model: GcimModel,
}

impl Gcim {
    /// Kernel-weighted GCIM from a pool of simulated IM vectors
    pub fn empirical(
        pool: &CandidatePool,
        im_j: IM,
        im_j_value: f64,
        ims: &[IM],
        kernel: &KernelConfig,
    ) -> Result<Self> {
        let col_j = pool.column(&im_j)?;
        let cols = ims
            .iter()
            .map(|im| pool.column(im))
            .collect::<Result<Vec<_>>>()?;

        // Members need a kernel weight and positive values for every target IM
        let members: Vec<(usize, f64)> = (0..pool.len())
            .filter_map(|k| {
                let w = pool.prior_weights[k] * kernel.weight(pool.values[(k, col_j)], im_j_value);
                let usable = w > 0.0 && cols.iter().all(|&c| pool.values[(k, c)] > 0.0);
                usable.then_some((k, w))
            })
            .collect();
        if members.is_empty() {
            return Err(PshaError::NoCandidates {
                context: format!("no pool member within the kernel around {im_j} = {im_j_value}"),
            });
        }
        let total: f64 = members.iter().map(|(_, w)| w).sum();
        let weights: Vec<f64> = members.iter().map(|(_, w)| w / total).collect();
        debug!(
            "Empirical GCIM: {} of {} pool members inside the kernel",
            members.len(),
            pool.len()
        );

        let marginals = cols
            .iter()
            .map(|&c| {
                let values: Vec<f64> = members.iter().map(|(k, _)| pool.values[(*k, c)]).collect();
                WeightedEcdf::new(&values, &weights).map(GcimMarginal::Empirical)
            })
            .collect::<Result<Vec<_>>>()?;

        let ln_values = DMatrix::from_fn(members.len(), cols.len(), |r, i| {
            pool.values[(members[r].0, cols[i])].ln()
        });
        let correlation = weighted_correlation(&ln_values, &weights)?;
        let chol = cholesky_with_repair(&correlation)?;

        Ok(Self {
            im_j,
            im_j_value,
            ims: ims.to_vec(),
            marginals,
            correlation,
            chol,
            model: GcimModel::Empirical,
        })
    }

    /// Parametric GCIM from the ensemble's GMM branches
    ///
    /// All IMs have to be spectral (PGA / pSA) and belong to the conditioning IM's
    /// ensemble; the conditioning IM cannot also be a target.
    pub fn parametric(
        ensemble: &Ensemble,
        site: &SiteInfo,
        im_j: IM,
        im_j_value: f64,
        ims: &[IM],
    ) -> Result<Self> {
        let period_j = im_j.spectral_period().ok_or_else(|| {
            PshaError::InvalidParameter(format!("parametric GCIM needs a spectral IM_j, got {im_j}"))
        })?;
        let periods = ims
            .iter()
            .map(|im| {
                if *im == im_j {
                    return Err(PshaError::InvalidParameter(format!(
                        "{im} is the conditioning IM and cannot be a target"
                    )));
                }
                im.spectral_period().ok_or_else(|| {
                    PshaError::InvalidParameter(format!("parametric GCIM needs spectral IMs, got {im}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ensemble.check_im(&im_j)?;
        let im_ensemble = ensemble.get_im_ensemble(im_j.im_type)?;
        if let Some(im) = ims
            .iter()
            .find(|im| !im_ensemble.im_types().contains(&im.im_type))
        {
            return Err(PshaError::InvalidParameter(format!(
                "{im} is not in the same IM ensemble as {im_j}"
            )));
        }

        let rho_j: Vec<f64> = periods
            .iter()
            .map(|&t| baker_jayaram_2008(t, period_j))
            .collect();
        let correlation = conditional_correlation(&periods, &rho_j);
        let chol = cholesky_with_repair(&correlation)?;

        let disaggs = im_ensemble
            .branches()
            .iter()
            .map(|b| branch_disagg(b, site, &im_j, im_j_value))
            .collect::<Result<Vec<_>>>()?;
        let weights: Vec<f64> = disaggs.iter().map(|d| d.weight).collect();
        let hazards: Vec<f64> = disaggs.iter().map(|d| d.total_hazard).collect();
        let adjusted = disagg_mean_weights(&weights, &hazards)?;

        let mut ruptures = Vec::new();
        for ((branch, disagg), &branch_weight) in
            im_ensemble.branches().iter().zip(&disaggs).zip(&adjusted)
        {
            if branch_weight <= 0.0 {
                continue;
            }
            let params_j = lognormal_table(branch, site, &im_j)?;
            let params = ims
                .iter()
                .map(|im| lognormal_table(branch, site, im))
                .collect::<Result<Vec<_>>>()?;

            for c in disagg.contributions.iter().filter(|c| c.contribution > 0.0) {
                let Some(&(mu_j, sigma_j)) = params_j.get(&c.rupture_id) else {
                    continue;
                };
                let eps_j = (im_j_value.ln() - mu_j) / sigma_j;
                let mut mu = Vec::with_capacity(ims.len());
                let mut sigma = Vec::with_capacity(ims.len());
                for (table, &rho) in params.iter().zip(&rho_j) {
                    let &(mu_i, sigma_i) =
                        table
                            .get(&c.rupture_id)
                            .ok_or_else(|| PshaError::MismatchedRuptureKeys {
                                context: format!("branch {} target IMs", branch.name),
                                missing: 1,
                            })?;
                    mu.push(mu_i + sigma_i * rho * eps_j);
                    sigma.push(sigma_i * (1.0 - rho * rho).max(0.0).sqrt());
                }
                ruptures.push(ConditionalRupture {
                    weight: branch_weight * c.contribution,
                    mu,
                    sigma,
                });
            }
        }
        if ruptures.is_empty() {
            return Err(PshaError::NoCandidates {
                context: format!("no rupture contributes at {im_j} = {im_j_value}"),
            });
        }
        let total: f64 = ruptures.iter().map(|r| r.weight).sum();
        ruptures.iter_mut().for_each(|r| r.weight /= total);

        let marginals = (0..ims.len())
            .map(|i| {
                GcimMarginal::LogNormalMixture(
                    ruptures
                        .iter()
                        .map(|r| MixtureComponent {
                            weight: r.weight,
                            mu: r.mu[i],
                            sigma: r.sigma[i],
                        })
                        .collect(),
                )
            })
            .collect();
        debug!(
            "Parametric GCIM for {} IMs from {} conditioned ruptures",
            ims.len(),
            ruptures.len()
        );

        Ok(Self {
            im_j,
            im_j_value,
            ims: ims.to_vec(),
            marginals,
            correlation,
            chol,
            model: GcimModel::Parametric(ruptures),
        })
    }

    /// Correlation of ln target IMs used for sampling
    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.correlation
    }

    /// Draw `n` IM vectors from the joint distribution (equal weights)
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Realisations> {
        let m = self.ims.len();
        let mut values = DMatrix::zeros(n, m);

        let picker = match &self.model {
            GcimModel::Parametric(ruptures) => Some(
                WeightedIndex::new(ruptures.iter().map(|r| r.weight))
                    .map_err(|e| PshaError::InvalidParameter(e.to_string()))?,
            ),
            GcimModel::Empirical => None,
        };

        for s in 0..n {
            let normals = DVector::from_fn(m, |_, _| rng.sample::<f64, _>(StandardNormal));
            let z = &self.chol * normals;
            match (&self.model, &picker) {
                (GcimModel::Parametric(ruptures), Some(picker)) => {
                    let r = &ruptures[picker.sample(rng)];
                    for i in 0..m {
                        values[(s, i)] = (r.mu[i] + r.sigma[i] * z[i]).exp();
                    }
                }
                _ => {
                    for i in 0..m {
                        values[(s, i)] = self.marginals[i].quantile(std_normal_cdf(z[i]));
                    }
                }
            }
        }
        Realisations::new(self.ims.clone(), values, vec![1.0 / n as f64; n])
    }
}

/// (mu, sigma) per rupture of a parametric branch
fn lognormal_table(
    branch: &Branch,
    site: &SiteInfo,
    im: &IM,
) -> Result<FxHashMap<RuptureId, (f64, f64)>> {
    match branch.gm_data(site, im)? {
        GroundMotionData::Parametric(params) => Ok(params
            .iter()
            .map(|p| (p.rupture_id.clone(), (p.mu, p.sigma)))
            .collect()),
        GroundMotionData::Empirical(_) => Err(PshaError::InvalidParameter(format!(
            "branch {} has simulated data for {}; parametric GCIM needs GMM branches",
            branch.name, im
        ))),
    }
}

/// Correlation of ln target IMs conditional on IM_j
///
/// `rho_ik|j = (rho_ik - rho_ij * rho_kj) / sqrt((1 - rho_ij^2) * (1 - rho_kj^2))`
fn conditional_correlation(periods: &[f64], rho_j: &[f64]) -> DMatrix<f64> {
    let m = periods.len();
    DMatrix::from_fn(m, m, |i, k| {
        if i == k {
            return 1.0;
        }
        let rho_ik = baker_jayaram_2008(periods[i], periods[k]);
        let denom = ((1.0 - rho_j[i] * rho_j[i]) * (1.0 - rho_j[k] * rho_j[k])).sqrt();
        if denom > 1e-12 {
            ((rho_ik - rho_j[i] * rho_j[k]) / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    })
}
