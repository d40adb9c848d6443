//! Rupture directivity adjustment
//!
//! The Bayless & Somerville (2020) model depends on where the rupture starts. The
//! hypocentre is unknown ahead of an earthquake, so the adjustment is averaged over
//! sampled hypocentre placements:
//!
//! ```text
//! fD(site, T)      = sum_h w_h * fD_h(site, T)
//! phi_red(site, T) = sum_h w_h * phi_red_h(site, T)
//! ```
//!
//! Placements are independent and evaluated in parallel.

pub(crate) mod bayless;
pub mod geometry;
pub mod hypocentre;

pub use geometry::{fault_rrup, gc2, to_local_km, Plane, SiteGrid, NO_HYPOCENTRE};
pub use hypocentre::{
    place_hypocentre, sample_hypocentres, HypocentreConfig, HypocentreMethod,
    HypocentrePlacement, RuptureType,
};

use bayless::{bayless_2020, BaylessInput, BaylessOutput, HypocentreGeometry};
use crate::error::{PshaError, Result};
use nalgebra::{DMatrix, Vector2};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Finite fault rupture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSource {
    /// Rupture name
    pub name: String,
    /// Planes in trace order
    pub planes: Vec<Plane>,
    /// Moment magnitude
    pub magnitude: f64,
    /// Rake (degrees)
    pub rake: f64,
}

impl FaultSource {
    /// Faulting style from the rake
    pub fn rupture_type(&self) -> RuptureType {
        RuptureType::from_rake(self.rake)
    }
}

/// Hypocentre-averaged directivity at a set of sites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectivityResult {
    /// Spectral periods (s), column order
    pub periods: Vec<f64>,
    /// Sites (km, local frame), row order
    pub sites: Vec<Vector2<f64>>,
    /// ln adjustment, sites x periods
    pub fd: DMatrix<f64>,
    /// Within-event standard deviation reduction, sites x periods
    pub phi_red: DMatrix<f64>,
    /// Number of hypocentre placements averaged
    pub n_hypo: usize,
}

impl DirectivityResult {
    /// Multiplicative amplification exp(fD) of one site and period
    pub fn amplification(&self, site: usize, period: usize) -> f64 {
        self.fd[(site, period)].exp()
    }

    /// Dictionary form of the result
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// GC2 coordinates and rupture distance of the sites, independent of the hypocentre
struct SiteCoordinates {
    u: Vec<f64>,
    t: Vec<f64>,
    rrup: Vec<f64>,
}

impl SiteCoordinates {
    fn new(planes: &[Plane], sites: &[Vector2<f64>]) -> Self {
        let (u, t) = sites.iter().map(|s| gc2(planes, s)).unzip();
        let rrup = sites.iter().map(|s| fault_rrup(planes, s)).collect();
        Self { u, t, rrup }
    }
}

/// Hypocentre geometry and the hypocentre's GC2 U on the trace
fn hypocentre_geometry(planes: &[Plane]) -> Result<(HypocentreGeometry, f64)> {
    let mut with_hyp = planes.iter().enumerate().filter(|(_, p)| p.has_hypocentre());
    let (k, plane) = with_hyp.next().ok_or_else(|| {
        PshaError::InvalidParameter("no plane carries a hypocentre".to_string())
    })?;
    if with_hyp.next().is_some() {
        return Err(PshaError::InvalidParameter(
            "more than one plane carries a hypocentre".to_string(),
        ));
    }

    let before: f64 = planes[..k].iter().map(|p| p.length).sum();
    let u_hyp = before + plane.length / 2.0 + plane.shyp;
    let total = geometry::trace_length(planes);
    Ok((
        HypocentreGeometry {
            smax: (-u_hyp, total - u_hyp),
            d: plane.dhyp,
            tbot: plane.surface_width(),
            dtop: plane.dtop,
            dbot: plane.bottom_depth(),
            dip: plane.dip,
        },
        u_hyp,
    ))
}

fn single_hypocentre(
    placement: &HypocentrePlacement,
    coords: &SiteCoordinates,
    source: &FaultSource,
    periods: &[f64],
) -> Result<BaylessOutput> {
    let (geometry, u_hyp) = hypocentre_geometry(&placement.planes)?;
    let u: Vec<f64> = coords.u.iter().map(|u| u - u_hyp).collect();
    Ok(bayless_2020(&BaylessInput {
        u: &u,
        t: &coords.t,
        rrup: &coords.rrup,
        geometry,
        magnitude: source.magnitude,
        rake: source.rake,
        periods,
    }))
}

/// Weighted directivity over the given hypocentre placements
///
/// Placement weights are normalised before combining. Every placement must share
/// the source's plane geometry.
pub fn compute_directivity(
    source: &FaultSource,
    sites: &[Vector2<f64>],
    periods: &[f64],
    placements: &[HypocentrePlacement],
) -> Result<DirectivityResult> {
    if placements.is_empty() {
        return Err(PshaError::InvalidParameter(
            "no hypocentre placements to average".to_string(),
        ));
    }
    if let Some(p) = periods.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(PshaError::InvalidParameter(format!(
            "directivity periods must be positive, got {p}"
        )));
    }
    let total: f64 = placements.iter().map(|p| p.weight).sum();
    if !(total > 0.0) || placements.iter().any(|p| p.weight < 0.0) {
        return Err(PshaError::InvalidWeights {
            context: "hypocentre placements".to_string(),
            sum: total,
        });
    }

    let coords = SiteCoordinates::new(&source.planes, sites);
    let outputs = placements
        .par_iter()
        .map(|placement| {
            let out = single_hypocentre(placement, &coords, source, periods)?;
            let w = placement.weight / total;
            Ok((out.fd * w, out.phi_red * w))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut fd = DMatrix::zeros(sites.len(), periods.len());
    let mut phi_red = DMatrix::zeros(sites.len(), periods.len());
    for (f, p) in outputs {
        fd += f;
        phi_red += p;
    }

    info!(
        "Directivity for {}: {} sites, {} periods, {} hypocentres",
        source.name,
        sites.len(),
        periods.len(),
        placements.len()
    );
    Ok(DirectivityResult {
        periods: periods.to_vec(),
        sites: sites.to_vec(),
        fd,
        phi_red,
        n_hypo: placements.len(),
    })
}

/// Sample hypocentres with `config` and average the directivity over them
pub fn run_directivity<R: Rng + ?Sized>(
    source: &FaultSource,
    sites: &[Vector2<f64>],
    periods: &[f64],
    config: &HypocentreConfig,
    rng: &mut R,
) -> Result<DirectivityResult> {
    let placements =
        sample_hypocentres(&source.planes, source.rupture_type(), config.method, rng)?;
    compute_directivity(source, sites, periods, &placements)
}

// ============================================================================
// PUBLIC RE-EXPORTS FOR VALIDATION TESTING
// ============================================================================

/// Public re-exports of the single-hypocentre model for validation tests
pub mod bayless_validation {
    pub use super::bayless::{bayless_2020, BaylessInput, BaylessOutput, HypocentreGeometry};
}
