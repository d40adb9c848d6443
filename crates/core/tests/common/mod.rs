//! Synthetic ensembles and datasets shared by the integration tests
#![allow(dead_code)]

use psha_core::core_types::{Rupture, RuptureSet, SiteInfo, SourceKind, TectonicType, IM};
use psha_core::ensemble::{
    Branch, BranchSiteData, EmpiricalSamples, Ensemble, GroundMotionData, IMEnsemble,
    LogNormalParams,
};
use psha_core::gms::{GMRecord, InMemoryGMDataset};
use psha_core::ImType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const STATION: &str = "CCCC";

/// Spectral periods carried by the synthetic GMM branches (PGA at 0)
pub const PERIODS: [f64; 4] = [0.1, 0.5, 1.0, 3.0];

pub fn site() -> SiteInfo {
    SiteInfo::new(STATION, -43.53, 172.63, 400.0)
}

pub fn pga() -> IM {
    IM::new(ImType::PGA)
}

pub fn spectral_ims() -> Vec<IM> {
    std::iter::once(pga())
        .chain(PERIODS.iter().map(|&p| IM::psa(p)))
        .collect()
}

/// (id, annual rate, magnitude, rrup, source)
const RUPTURES: [(&str, f64, f64, f64, SourceKind); 4] = [
    ("fault_a", 0.01, 6.5, 30.0, SourceKind::Fault),
    ("fault_b", 0.002, 7.5, 12.0, SourceKind::Fault),
    ("ds_1", 0.05, 5.5, 20.0, SourceKind::Distributed),
    ("ds_2", 0.02, 6.0, 45.0, SourceKind::Distributed),
];

pub fn rupture_set() -> Arc<RuptureSet> {
    let ruptures = RUPTURES
        .iter()
        .map(|(id, rate, mag, _, source)| {
            Rupture::new(*id, *rate, *mag, TectonicType::ActiveShallow, *source)
        })
        .collect();
    Arc::new(RuptureSet::new(ruptures).unwrap())
}

/// Toy GMM: ln median of an IM for magnitude and distance
pub fn toy_ln_median(magnitude: f64, rrup: f64, period: f64) -> f64 {
    let shape = if period <= 0.0 {
        0.0
    } else if period < 0.3 {
        0.5
    } else if period < 0.8 {
        0.4
    } else if period < 2.0 {
        -0.2
    } else {
        -1.2
    };
    let long_period = if period >= 1.0 { 0.3 * (magnitude - 6.5) } else { 0.0 };
    0.2f64.ln() + 0.9 * (magnitude - 6.5) - 1.2 * ((rrup + 10.0) / 40.0).ln() + shape + long_period
}

fn gmm_site_data(shift: f64, sigma: f64) -> BranchSiteData {
    let mut data = BranchSiteData::default();
    for (id, _, _, rrup, _) in RUPTURES {
        data.rrup.insert(id.into(), rrup);
    }
    for im in spectral_ims() {
        let period = im.period.unwrap_or(0.0);
        let params = RUPTURES
            .iter()
            .map(|(id, _, mag, rrup, _)| {
                LogNormalParams::new(*id, toy_ln_median(*mag, *rrup, period) + shift, sigma)
            })
            .collect();
        data.gm.insert(im, GroundMotionData::Parametric(params));
    }
    data
}

/// Two GMM branches (weights 0.6 / 0.4) over PGA and pSA
pub fn two_branch_ensemble() -> Ensemble {
    let ruptures = rupture_set();
    let a = Branch::new("gmm_a", 0.6, ruptures.clone()).with_site(STATION, gmm_site_data(0.0, 0.6));
    let b = Branch::new("gmm_b", 0.4, ruptures).with_site(STATION, gmm_site_data(0.25, 0.55));
    let ims = IMEnsemble::new(vec![ImType::PGA, ImType::PSA], vec![a, b]).unwrap();
    Ensemble::new("synthetic", vec![ims]).unwrap()
}

/// PGA and pSA predicted by separate IM ensembles with different branch sets
///
/// PGA: gmm_a / gmm_b / gmm_c (0.3 / 0.3 / 0.4). pSA: gmm_a / gmm_d (0.5 / 0.5).
pub fn split_ensemble() -> Ensemble {
    let ruptures = rupture_set();
    let pga_branches = vec![
        Branch::new("gmm_a", 0.3, ruptures.clone()).with_site(STATION, gmm_site_data(0.0, 0.6)),
        Branch::new("gmm_b", 0.3, ruptures.clone()).with_site(STATION, gmm_site_data(0.2, 0.6)),
        Branch::new("gmm_c", 0.4, ruptures.clone()).with_site(STATION, gmm_site_data(-0.1, 0.5)),
    ];
    let psa_branches = vec![
        Branch::new("gmm_a", 0.5, ruptures.clone()).with_site(STATION, gmm_site_data(0.1, 0.6)),
        Branch::new("gmm_d", 0.5, ruptures).with_site(STATION, gmm_site_data(0.3, 0.55)),
    ];
    Ensemble::new(
        "split",
        vec![
            IMEnsemble::new(vec![ImType::PGA], pga_branches).unwrap(),
            IMEnsemble::new(vec![ImType::PSA], psa_branches).unwrap(),
        ],
    )
    .unwrap()
}

/// Single-IM ensemble from (weight, [(id, rate, mu, sigma)]) branches, pSA(1.0) only
pub fn lognormal_ensemble(branches: &[(f64, Vec<(&str, f64, f64, f64)>)]) -> Ensemble {
    let mut ids: Vec<(&str, f64)> = Vec::new();
    for (_, ruptures) in branches {
        for (id, rate, _, _) in ruptures {
            if !ids.iter().any(|(x, _)| x == id) {
                ids.push((*id, *rate));
            }
        }
    }
    let set = Arc::new(
        RuptureSet::new(
            ids.iter()
                .map(|(id, rate)| {
                    Rupture::new(*id, *rate, 6.5, TectonicType::ActiveShallow, SourceKind::Fault)
                })
                .collect(),
        )
        .unwrap(),
    );
    let branches = branches
        .iter()
        .enumerate()
        .map(|(k, (weight, ruptures))| {
            let mut data = BranchSiteData::default();
            for (id, _, _, _) in ruptures {
                data.rrup.insert((*id).into(), 20.0);
            }
            data.gm.insert(
                IM::psa(1.0),
                GroundMotionData::Parametric(
                    ruptures
                        .iter()
                        .map(|(id, _, mu, sigma)| LogNormalParams::new(*id, *mu, *sigma))
                        .collect(),
                ),
            );
            Branch::new(format!("branch_{k}"), *weight, set.clone()).with_site(STATION, data)
        })
        .collect();
    let ims = IMEnsemble::new(vec![ImType::PSA], branches).unwrap();
    Ensemble::new("lognormal", vec![ims]).unwrap()
}

/// One rupture (rate 0.01) whose pSA(1.0) is `n` simulated values exp(Z), Z ~ N(0, 1)
pub fn simulated_ensemble(n: usize, seed: u64) -> Ensemble {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..n)
        .map(|_| rng.sample::<f64, _>(StandardNormal).exp())
        .collect();
    let set = Arc::new(
        RuptureSet::new(vec![Rupture::new(
            "sim",
            0.01,
            7.0,
            TectonicType::ActiveShallow,
            SourceKind::Fault,
        )])
        .unwrap(),
    );
    let mut data = BranchSiteData::default();
    data.rrup.insert("sim".into(), 15.0);
    data.gm.insert(
        IM::psa(1.0),
        GroundMotionData::Empirical(vec![EmpiricalSamples::new("sim", values)]),
    );
    let branch = Branch::new("simulations", 1.0, set).with_site(STATION, data);
    let ims = IMEnsemble::new(vec![ImType::PSA], vec![branch]).unwrap();
    Ensemble::new("simulated", vec![ims]).unwrap()
}

/// Synthetic recorded ground motions following the toy GMM with correlated residuals
pub fn synthetic_records(n: usize, seed: u64) -> Vec<GMRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|k| {
            let magnitude = rng.random_range(5.0..8.5);
            let rrup = rng.random_range(0.0..150.0);
            let vs30 = rng.random_range(200.0..800.0);
            let common: f64 = rng.sample(StandardNormal);
            let mut im_values = FxHashMap::default();
            for im in spectral_ims() {
                let own: f64 = rng.sample(StandardNormal);
                let residual = 0.6 * (0.7 * common + 0.714 * own);
                let period = im.period.unwrap_or(0.0);
                im_values.insert(im, (toy_ln_median(magnitude, rrup, period) + residual).exp());
            }
            GMRecord {
                id: format!("RSN{k:05}"),
                magnitude,
                rrup,
                vs30,
                im_values,
            }
        })
        .collect()
}

pub fn synthetic_dataset(n: usize, seed: u64) -> InMemoryGMDataset {
    InMemoryGMDataset::new("synthetic", synthetic_records(n, seed))
}
