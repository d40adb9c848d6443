//! Synthetic inputs for running the engine without external data
//!
//! The ground-motion model is a toy magnitude / distance scaling with a simple
//! spectral shape. It is only meant to produce plausible-looking numbers.

use psha_core::core_types::{Rupture, RuptureSet, SiteInfo, SourceKind, TectonicType, IM};
use psha_core::ensemble::{
    Branch, BranchSiteData, Ensemble, GroundMotionData, IMEnsemble, LogNormalParams,
};
use psha_core::gms::{GMRecord, InMemoryGMDataset};
use psha_core::{ImType, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Spectral periods of the synthetic ensemble
pub const PERIODS: [f64; 8] = [0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 3.0];

/// PGA followed by pSA at [`PERIODS`]
pub fn spectral_ims() -> Vec<IM> {
    std::iter::once(IM::new(ImType::PGA))
        .chain(PERIODS.iter().map(|&p| IM::psa(p)))
        .collect()
}

/// ln median of the toy model
fn ln_median(magnitude: f64, rrup: f64, period: f64) -> f64 {
    let shape = if period <= 0.0 {
        0.0
    } else {
        // Plateau between 0.1 and 0.5 s, falling off beyond
        0.5 - 0.6 * (period / 0.3).log10().abs().powf(1.5)
    };
    let corner = if period >= 1.0 {
        0.35 * (magnitude - 6.5)
    } else {
        0.0
    };
    0.2f64.ln() + 0.9 * (magnitude - 6.5) - 1.2 * ((rrup + 10.0) / 40.0).ln() + shape + corner
}

struct SourceRow {
    id: String,
    rate: f64,
    magnitude: f64,
    rrup: f64,
    source: SourceKind,
}

fn source_rows<R: Rng + ?Sized>(n_faults: usize, n_ds: usize, rng: &mut R) -> Vec<SourceRow> {
    let faults: Vec<SourceRow> = (0..n_faults)
        .map(|k| {
            let magnitude = rng.random_range(6.5..8.0);
            SourceRow {
                id: format!("fault_{k:03}"),
                // Larger ruptures are rarer
                rate: 10f64.powf(-1.0 - 0.8 * (magnitude - 6.0)) * rng.random_range(0.5..1.5),
                magnitude,
                rrup: rng.random_range(2.0..120.0),
                source: SourceKind::Fault,
            }
        })
        .collect();
    let ds = (0..n_ds).map(|k| {
        let magnitude = 5.0 + 0.1 * (k % 20) as f64;
        SourceRow {
            id: format!("ds_{k:03}"),
            rate: 10f64.powf(1.0 - (magnitude - 3.0)) * 1e-2,
            magnitude,
            rrup: 10.0 + 10.0 * (k / 20) as f64,
            source: SourceKind::Distributed,
        }
    });
    faults.into_iter().chain(ds).collect()
}

fn branch_data(rows: &[SourceRow], shift: f64, sigma: f64) -> BranchSiteData {
    let mut data = BranchSiteData::default();
    for row in rows {
        data.rrup.insert(row.id.as_str().into(), row.rrup);
    }
    for im in spectral_ims() {
        let period = im.period.unwrap_or(0.0);
        let params = rows
            .iter()
            .map(|r| {
                LogNormalParams::new(
                    r.id.as_str(),
                    ln_median(r.magnitude, r.rrup, period) + shift,
                    sigma,
                )
            })
            .collect();
        data.gm.insert(im, GroundMotionData::Parametric(params));
    }
    data
}

/// Three-branch GMM ensemble for one site
pub fn ensemble<R: Rng + ?Sized>(site: &SiteInfo, rng: &mut R) -> Result<Ensemble> {
    let rows = source_rows(40, 100, rng);
    let ruptures = Arc::new(RuptureSet::new(
        rows.iter()
            .map(|r| {
                Rupture::new(
                    r.id.as_str(),
                    r.rate,
                    r.magnitude,
                    TectonicType::ActiveShallow,
                    r.source,
                )
            })
            .collect(),
    )?);

    let branches = [("gmm_low", 0.2, -0.2, 0.65), ("gmm_central", 0.6, 0.0, 0.6), ("gmm_high", 0.2, 0.25, 0.55)]
        .into_iter()
        .map(|(name, weight, shift, sigma)| {
            Branch::new(name, weight, ruptures.clone())
                .with_site(site.station_name.clone(), branch_data(&rows, shift, sigma))
        })
        .collect();
    let ims = IMEnsemble::new(vec![ImType::PGA, ImType::PSA], branches)?;
    Ensemble::new("synthetic", vec![ims])
}

/// Recorded-motion dataset following the toy model with correlated residuals
pub fn dataset<R: Rng + ?Sized>(n: usize, rng: &mut R) -> InMemoryGMDataset {
    let records = (0..n)
        .map(|k| {
            let magnitude = rng.random_range(5.0..8.5);
            let rrup = rng.random_range(0.0..150.0);
            let vs30 = rng.random_range(180.0..900.0);
            let event: f64 = rng.sample(StandardNormal);
            let mut im_values = FxHashMap::default();
            for im in spectral_ims() {
                let own: f64 = rng.sample(StandardNormal);
                let residual = 0.6 * (0.7 * event + 0.714 * own);
                let period = im.period.unwrap_or(0.0);
                im_values.insert(im, (ln_median(magnitude, rrup, period) + residual).exp());
            }
            GMRecord {
                id: format!("RSN{k:05}"),
                magnitude,
                rrup,
                vs30,
                im_values,
            }
        })
        .collect();
    InMemoryGMDataset::new("synthetic", records)
}
