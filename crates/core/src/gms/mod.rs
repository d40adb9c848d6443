//! Ground-motion selection (GMS)
//!
//! 1. Resolve the conditioning IM level im_j from the query.
//! 2. Build the GCIM of the target IMs given im_j (empirical or parametric).
//! 3. Pre-filter the candidate dataset with causal-parameter bounds, either given or
//!    derived from the disaggregation at im_j.
//! 4. Draw `n_replica` replicas of `n_gms` realisations, choose one according to the
//!    [`ReplicaPolicy`] and match its realisations with candidates.
//!
//! The KS statistic of each target IM (selected set vs. GCIM marginal) is reported
//! against `ks_critical_value(n, alpha)` as a goodness-of-fit bound; it never
//! rejects a selection.
//!
//! Selection is stochastic. Identical requests may give different sets, so every
//! result carries a fresh opaque [`Uuid`].

pub mod cache;
pub mod causal;
pub mod dataset;
pub mod gcim;
pub mod realisations;
pub mod selection;

pub use cache::GmsCache;
pub use causal::{
    compute_causal_bounds, default_causal_bounds, CausalParamBounds, CausalParamConfig,
    ParamRange,
};
pub use dataset::{GMDataset, GMRecord, InMemoryGMDataset};
pub use gcim::{CandidatePool, Gcim, GcimMarginal, KernelConfig, MixtureComponent};
pub use realisations::{best_replica, generate_replicas, Realisations};
pub use selection::{
    filter_candidates, normalise_im_weights, select_ground_motions, SelectedGroundMotion,
    SelectionSettings,
};

use crate::core_types::{HazardQuery, SiteInfo, IM};
use crate::disagg::{resolve_im_value, run_ensemble_disagg};
use crate::ensemble::Ensemble;
use crate::error::{PshaError, Result};
use crate::hazard::HazardConfig;
use crate::stats::{ks_critical_value, ks_statistic};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// How one of the `n_replica` realisation replicas is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaPolicy {
    /// Replica whose realisations best reproduce the GCIM marginals (mean KS distance)
    #[default]
    BestRealisations,
    /// Replica whose selected set best reproduces the GCIM marginals
    BestSelection,
}

/// GMS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmsConfig {
    /// Number of ground motions to select
    pub n_gms: usize,
    /// Number of independent realisation replicas
    pub n_replica: usize,
    /// Replica choice
    pub replica_policy: ReplicaPolicy,
    /// Kernel of the empirical GCIM
    pub kernel: KernelConfig,
    /// Misfit weight per target IM (uniform when absent)
    pub im_weights: Option<Vec<f64>>,
    /// Amplitude scale candidates onto im_j
    pub scale: bool,
    /// Significance level of the reported KS bound
    pub ks_alpha: f64,
}

impl Default for GmsConfig {
    fn default() -> Self {
        Self {
            n_gms: 20,
            n_replica: 10,
            replica_policy: ReplicaPolicy::BestRealisations,
            kernel: KernelConfig::default(),
            im_weights: None,
            scale: true,
            ks_alpha: 0.1,
        }
    }
}

/// Where the GCIM comes from
#[derive(Debug, Clone, Copy)]
pub enum GcimSource<'a> {
    /// GMM branches of the ensemble
    Parametric,
    /// Kernel-weighted pool of simulated IM vectors
    Empirical(&'a CandidatePool),
}

/// One selection request
#[derive(Debug, Clone)]
pub struct GmsRequest<'a> {
    /// Site
    pub site: &'a SiteInfo,
    /// Conditioning IM
    pub im_j: IM,
    /// Target IMs
    pub ims: Vec<IM>,
    /// Target exceedance or IM level of the conditioning IM
    pub query: HazardQuery,
    /// Causal bounds; derived from the disaggregation when absent
    pub bounds: Option<CausalParamBounds>,
    /// GCIM source
    pub source: GcimSource<'a>,
}

/// KS statistic of one target IM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// Target IM
    pub im: IM,
    /// KS distance between the selected set and the GCIM marginal
    pub statistic: f64,
}

/// Outcome of a GMS run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmsResult {
    /// Opaque result key
    pub id: Uuid,
    /// Station
    pub station: String,
    /// Dataset the motions were selected from
    pub dataset_name: String,
    /// Conditioning IM
    pub im_j: IM,
    /// Conditioning IM level
    pub im_j_value: f64,
    /// Query the level was resolved from
    pub query: HazardQuery,
    /// Target IMs
    pub ims: Vec<IM>,
    /// GCIM marginal per target IM
    pub marginals: Vec<GcimMarginal>,
    /// Realisations the selection matched
    pub realisations: Realisations,
    /// Selected motions, ascending misfit
    pub selected: Vec<SelectedGroundMotion>,
    /// Causal bounds used for the pre-filter
    pub bounds: CausalParamBounds,
    /// Candidates left after the pre-filter
    pub n_candidates: usize,
    /// KS statistic per target IM
    pub ks: Vec<KsResult>,
    /// KS critical value for the selected set size
    pub ks_critical_value: f64,
    /// Significance level of the critical value
    pub ks_alpha: f64,
}

impl GmsResult {
    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn selected_columns(selected: &[SelectedGroundMotion], n_ims: usize) -> Vec<Vec<f64>> {
    (0..n_ims)
        .map(|i| selected.iter().map(|s| s.im_values[i]).collect())
        .collect()
}

/// Run ground-motion selection
pub fn run_gms<R: Rng + ?Sized>(
    ensemble: &Ensemble,
    dataset: &dyn GMDataset,
    request: &GmsRequest<'_>,
    config: &GmsConfig,
    causal_config: &CausalParamConfig,
    hazard_config: &HazardConfig,
    rng: &mut R,
) -> Result<GmsResult> {
    if request.ims.is_empty() {
        return Err(PshaError::InvalidParameter(
            "GMS needs at least one target IM".to_string(),
        ));
    }
    ensemble.check_im(&request.im_j)?;
    let site = request.site;
    let im_weights = normalise_im_weights(request.ims.len(), config.im_weights.as_deref())?;

    let im_j_value = resolve_im_value(ensemble, site, &request.im_j, request.query, hazard_config)?;
    info!(
        "GMS at {}: {} resolved to {} = {:.5}",
        site.station_name, request.query, request.im_j, im_j_value
    );

    let bounds = match request.bounds {
        Some(mut bounds) => {
            if config.scale && bounds.sf.is_none() {
                bounds.sf = Some(causal_config.sf_range);
            }
            bounds
        }
        None => {
            let disagg = run_ensemble_disagg(
                ensemble,
                site,
                &request.im_j,
                HazardQuery::ImLevel(im_j_value),
                hazard_config,
            )?;
            default_causal_bounds(&disagg.summary, site, causal_config, config.scale)?
        }
    };

    let gcim = match request.source {
        GcimSource::Parametric => {
            Gcim::parametric(ensemble, site, request.im_j, im_j_value, &request.ims)?
        }
        GcimSource::Empirical(pool) => {
            Gcim::empirical(pool, request.im_j, im_j_value, &request.ims, &config.kernel)?
        }
    };

    let records = dataset.metadata(site, None)?;
    let candidates = filter_candidates(
        &records,
        &bounds,
        &request.ims,
        &request.im_j,
        config.scale,
    );
    if candidates.is_empty() {
        return Err(PshaError::NoCandidates {
            context: format!(
                "no ground motion in {} satisfies the causal bounds",
                dataset.name()
            ),
        });
    }
    info!(
        "{} of {} ground motions in {} pass the causal pre-filter",
        candidates.len(),
        records.len(),
        dataset.name()
    );

    let settings = SelectionSettings {
        ims: &request.ims,
        im_j: request.im_j,
        im_j_value,
        im_weights: &im_weights,
        scale: config.scale,
    };
    let replicas = generate_replicas(&gcim, config.n_gms, config.n_replica, rng)?;

    let (realisations, selected) = match config.replica_policy {
        ReplicaPolicy::BestRealisations => {
            let best = best_replica(&replicas, &gcim).unwrap_or(0);
            debug!("Using replica {} of {}", best, replicas.len());
            let selected = select_ground_motions(&replicas[best], &candidates, &bounds, &settings)?;
            (replicas[best].clone(), selected)
        }
        ReplicaPolicy::BestSelection => {
            let mut best: Option<(f64, usize, Vec<SelectedGroundMotion>)> = None;
            for (i, replica) in replicas.iter().enumerate() {
                let selected = select_ground_motions(replica, &candidates, &bounds, &settings)?;
                let distance = realisations::mean_ks_distance(
                    selected_columns(&selected, request.ims.len()).into_iter(),
                    &gcim,
                );
                if best.as_ref().map_or(true, |(d, _, _)| distance < *d) {
                    best = Some((distance, i, selected));
                }
            }
            let (_, i, selected) = best.ok_or_else(|| PshaError::NoCandidates {
                context: "no replica produced a selection".to_string(),
            })?;
            debug!("Using replica {} of {} (best selection)", i, replicas.len());
            (replicas[i].clone(), selected)
        }
    };

    let ks = selected_columns(&selected, request.ims.len())
        .iter()
        .zip(&request.ims)
        .zip(&gcim.marginals)
        .map(|((column, im), marginal)| KsResult {
            im: *im,
            statistic: ks_statistic(column, |x| marginal.cdf(x)),
        })
        .collect();

    let result = GmsResult {
        id: Uuid::new_v4(),
        station: site.station_name.clone(),
        dataset_name: dataset.name().to_string(),
        im_j: request.im_j,
        im_j_value,
        query: request.query,
        ims: request.ims.clone(),
        marginals: gcim.marginals.clone(),
        realisations,
        ks_critical_value: ks_critical_value(selected.len(), config.ks_alpha),
        ks_alpha: config.ks_alpha,
        selected,
        bounds,
        n_candidates: candidates.len(),
        ks,
    };
    info!(
        "Selected {} ground motions at {} (result {})",
        result.selected.len(),
        site.station_name,
        result.id
    );
    Ok(result)
}
