//! Ground-motion prediction ensembles
//!
//! An [`Ensemble`] groups branches by the IM types they predict ([`IMEnsemble`]).
//! Each [`Branch`] carries a weight, a shared rupture table and per-site data
//! (rupture distances plus ground-motion distributions per IM). Branch weights of
//! an IM ensemble are validated to sum to one when it is built, so every
//! downstream weighted combination can rely on it.

pub mod ground_motion;

pub use ground_motion::{
    epsilon_from_exceedance, join_ruptures, EmpiricalSamples, GroundMotionData, JoinedRupture,
    LogNormalParams, RuptureGm,
};

use crate::core_types::{ImType, RuptureId, RuptureSet, SiteInfo, IM};
use crate::error::{PshaError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Tolerance on the branch-weight sum
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Branch data for one site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchSiteData {
    /// Rupture distance (km) per rupture
    #[serde(default)]
    pub rrup: FxHashMap<RuptureId, f64>,
    /// Ground-motion data per IM
    pub gm: FxHashMap<IM, GroundMotionData>,
}

/// A weighted member of an IM ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name
    pub name: String,
    /// Branch weight
    pub weight: f64,
    /// Rupture table (shared between branches using the same source model)
    pub ruptures: Arc<RuptureSet>,
    /// Per-station data
    pub sites: FxHashMap<String, BranchSiteData>,
}

impl Branch {
    /// Create a branch without site data
    pub fn new(name: impl Into<String>, weight: f64, ruptures: Arc<RuptureSet>) -> Self {
        Self {
            name: name.into(),
            weight,
            ruptures,
            sites: FxHashMap::default(),
        }
    }

    /// Add or replace the data for a station
    pub fn with_site(mut self, station: impl Into<String>, data: BranchSiteData) -> Self {
        self.sites.insert(station.into(), data);
        self
    }

    /// Data for a site
    pub fn site_data(&self, site: &SiteInfo) -> Result<&BranchSiteData> {
        self.sites
            .get(&site.station_name)
            .ok_or_else(|| PshaError::MissingSiteData {
                branch: self.name.clone(),
                station: site.station_name.clone(),
            })
    }

    /// Ground-motion data for a site and IM
    pub fn gm_data(&self, site: &SiteInfo, im: &IM) -> Result<&GroundMotionData> {
        self.site_data(site)?
            .gm
            .get(im)
            .ok_or_else(|| PshaError::MissingImData {
                branch: self.name.clone(),
                im: im.to_string(),
            })
    }

    /// Ruptures joined with their ground-motion distributions for a site and IM
    pub fn joined_ruptures(&self, site: &SiteInfo, im: &IM) -> Result<Vec<JoinedRupture<'_>>> {
        let site_data = self.site_data(site)?;
        let gm = site_data
            .gm
            .get(im)
            .ok_or_else(|| PshaError::MissingImData {
                branch: self.name.clone(),
                im: im.to_string(),
            })?;
        join_ruptures(
            &self.ruptures,
            gm,
            &site_data.rrup,
            &format!("branch {} / {}", self.name, im),
        )
    }
}

#[derive(Deserialize, Serialize)]
struct IMEnsembleDef {
    im_types: Vec<ImType>,
    branches: Vec<Branch>,
}

/// Branches predicting a group of IM types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IMEnsembleDef", into = "IMEnsembleDef")]
pub struct IMEnsemble {
    im_types: Vec<ImType>,
    branches: Vec<Branch>,
}

impl IMEnsemble {
    /// Build an IM ensemble; branch weights must sum to one
    pub fn new(im_types: Vec<ImType>, branches: Vec<Branch>) -> Result<Self> {
        if branches.is_empty() {
            return Err(PshaError::InvalidParameter(
                "an IM ensemble needs at least one branch".to_string(),
            ));
        }
        if let Some(bad) = branches.iter().find(|b| !(b.weight >= 0.0)) {
            return Err(PshaError::InvalidParameter(format!(
                "branch {} has negative weight {}",
                bad.name, bad.weight
            )));
        }
        for branch in &branches {
            let foreign = branch
                .sites
                .values()
                .flat_map(|d| d.gm.keys())
                .find(|im| !im_types.contains(&im.im_type));
            if let Some(im) = foreign {
                return Err(PshaError::InvalidParameter(format!(
                    "branch {} carries data for {} outside the ensemble's IM types",
                    branch.name, im
                )));
            }
        }
        let sum: f64 = branches.iter().map(|b| b.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(PshaError::InvalidWeights {
                context: format!("IM ensemble {im_types:?}"),
                sum,
            });
        }
        Ok(Self { im_types, branches })
    }

    /// IM types covered
    pub fn im_types(&self) -> &[ImType] {
        &self.im_types
    }

    /// Branches
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Branch weights in branch order
    pub fn weights(&self) -> Vec<f64> {
        self.branches.iter().map(|b| b.weight).collect()
    }

    /// IMs with data for a site on every branch, sorted by type then period
    pub fn available_ims(&self, site: &SiteInfo) -> Vec<IM> {
        let mut ims: Vec<IM> = match self.branches[0].sites.get(&site.station_name) {
            Some(data) => data.gm.keys().copied().collect(),
            None => return Vec::new(),
        };
        ims.retain(|im| {
            self.branches.iter().all(|b| {
                b.sites
                    .get(&site.station_name)
                    .is_some_and(|d| d.gm.contains_key(im))
            })
        });
        ims.sort_by(|a, b| {
            a.im_type
                .as_str()
                .cmp(b.im_type.as_str())
                .then(a.period.unwrap_or(0.0).total_cmp(&b.period.unwrap_or(0.0)))
        });
        ims
    }
}

impl TryFrom<IMEnsembleDef> for IMEnsemble {
    type Error = PshaError;

    fn try_from(def: IMEnsembleDef) -> Result<Self> {
        Self::new(def.im_types, def.branches)
    }
}

impl From<IMEnsemble> for IMEnsembleDef {
    fn from(ens: IMEnsemble) -> Self {
        Self {
            im_types: ens.im_types,
            branches: ens.branches,
        }
    }
}

/// A full ensemble: one IM ensemble per group of IM types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    /// Ensemble name
    pub name: String,
    im_ensembles: Vec<IMEnsemble>,
}

impl Ensemble {
    /// Build an ensemble; each IM type may belong to one IM ensemble only
    pub fn new(name: impl Into<String>, im_ensembles: Vec<IMEnsemble>) -> Result<Self> {
        let name = name.into();
        let mut seen = Vec::new();
        for im_type in im_ensembles.iter().flat_map(|e| e.im_types.iter()) {
            if seen.contains(im_type) {
                return Err(PshaError::InvalidParameter(format!(
                    "IM type {} belongs to more than one IM ensemble",
                    im_type.as_str()
                )));
            }
            seen.push(*im_type);
        }
        info!(
            "Ensemble {} created with {} IM ensemble(s)",
            name,
            im_ensembles.len()
        );
        Ok(Self { name, im_ensembles })
    }

    /// Load and validate an ensemble description from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let ensemble: Self = serde_json::from_str(&contents)?;
        Self::new(ensemble.name, ensemble.im_ensembles)
    }

    /// Save the ensemble description as JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// IM ensembles
    pub fn im_ensembles(&self) -> &[IMEnsemble] {
        &self.im_ensembles
    }

    /// IM ensemble covering an IM type
    pub fn get_im_ensemble(&self, im_type: ImType) -> Result<&IMEnsemble> {
        self.im_ensembles
            .iter()
            .find(|e| e.im_types.contains(&im_type))
            .ok_or_else(|| PshaError::UnsupportedIm(im_type.as_str().to_string()))
    }

    /// Fail unless the ensemble supports `im`
    pub fn check_im(&self, im: &IM) -> Result<()> {
        self.get_im_ensemble(im.im_type)
            .map(|_| ())
            .map_err(|_| PshaError::UnsupportedIm(im.to_string()))
    }
}
