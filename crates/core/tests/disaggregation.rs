//! Ensemble disaggregation: contributions, adjusted weights, epsilon and gridding

mod common;

use approx::assert_relative_eq;
use common::{lognormal_ensemble, simulated_ensemble, site, two_branch_ensemble};
use psha_core::disagg::{run_ensemble_disagg, DisaggGridConfig};
use psha_core::hazard::{run_ensemble_hazard, HazardConfig};
use psha_core::{HazardQuery, PshaError, RuptureId, IM};

fn regression_ensemble() -> psha_core::Ensemble {
    lognormal_ensemble(&[(
        1.0,
        vec![
            ("r1", 0.01, -1.867, 0.4965),
            ("r2", 0.002, 0.3f64.ln(), 0.6),
        ],
    )])
}

#[test]
fn test_two_rupture_regression() {
    let ensemble = regression_ensemble();
    let config = HazardConfig::default();

    let low = run_ensemble_disagg(&ensemble, &site(), &IM::psa(1.0), HazardQuery::ImLevel(0.2), &config)
        .unwrap();
    let c = low.fault_contributions();
    assert_relative_eq!(c[&RuptureId::from("r1")], 0.668, epsilon = 1e-3);
    assert_relative_eq!(c[&RuptureId::from("r2")], 0.332, epsilon = 1e-3);
    assert_eq!(low.contributions[0].rupture_id.as_str(), "r1");

    // At a higher level the rarer, stronger rupture dominates
    let high = run_ensemble_disagg(&ensemble, &site(), &IM::psa(1.0), HazardQuery::ImLevel(0.5), &config)
        .unwrap();
    let c = high.fault_contributions();
    assert_relative_eq!(c[&RuptureId::from("r1")], 0.186, epsilon = 1e-3);
    assert_relative_eq!(c[&RuptureId::from("r2")], 0.814, epsilon = 1e-3);
    assert_eq!(high.contributions[0].rupture_id.as_str(), "r2");
}

#[test]
fn test_identical_branches_match_single_branch() {
    let rows = vec![("r1", 0.01, -1.867, 0.4965), ("r2", 0.002, 0.3f64.ln(), 0.6)];
    let single = regression_ensemble();
    let doubled = lognormal_ensemble(&[(0.5, rows.clone()), (0.5, rows)]);
    let config = HazardConfig::default();

    for level in [0.2, 0.5] {
        let query = HazardQuery::ImLevel(level);
        let a = run_ensemble_disagg(&single, &site(), &IM::psa(1.0), query, &config).unwrap();
        let b = run_ensemble_disagg(&doubled, &site(), &IM::psa(1.0), query, &config).unwrap();
        assert_eq!(b.adjusted_weights, vec![0.5, 0.5]);
        let (ca, cb) = (a.fault_contributions(), b.fault_contributions());
        for (id, value) in &ca {
            assert_relative_eq!(cb[id], *value, max_relative = 1e-12);
        }
        assert_relative_eq!(a.exceedance, b.exceedance, max_relative = 1e-12);
    }
}

#[test]
fn test_lognormal_epsilon() {
    let ensemble = regression_ensemble();
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(1.0),
        HazardQuery::ImLevel(0.5),
        &HazardConfig::default(),
    )
    .unwrap();
    let eps = result.epsilons();
    assert_relative_eq!(eps[&RuptureId::from("r1")], (0.5f64.ln() + 1.867) / 0.4965, epsilon = 1e-9);
    assert_relative_eq!(eps[&RuptureId::from("r2")], (0.5f64 / 0.3).ln() / 0.6, epsilon = 1e-9);
}

#[test]
fn test_contributions_and_weights_sum_to_one() {
    let ensemble = two_branch_ensemble();
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(1.0),
        HazardQuery::Exceedance(1.0 / 475.0),
        &HazardConfig::default(),
    )
    .unwrap();

    assert_relative_eq!(result.contribution_sum(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.adjusted_weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    for branch in &result.branches {
        assert_relative_eq!(branch.contribution_sum(), 1.0, epsilon = 1e-9);
    }

    // Adjusted weight is w_b * H_b / sum(w * H)
    let weighted: Vec<f64> = result
        .branches
        .iter()
        .map(|b| b.weight * b.total_hazard)
        .collect();
    let total: f64 = weighted.iter().sum();
    for (adjusted, w) in result.adjusted_weights.iter().zip(&weighted) {
        assert_relative_eq!(*adjusted, w / total, max_relative = 1e-12);
    }
    assert_relative_eq!(result.exceedance, 1.0 / 475.0, max_relative = 1e-2);

    // Contributions are sorted and split by source kind
    assert!(result
        .contributions
        .windows(2)
        .all(|w| w[0].contribution >= w[1].contribution));
    let fault: f64 = result.fault_contributions().values().sum();
    let ds: f64 = result.ds_contributions().values().sum();
    assert_relative_eq!(fault + ds, 1.0, epsilon = 1e-9);
}

#[test]
fn test_exceedance_query_matches_hazard_inversion() {
    let ensemble = two_branch_ensemble();
    let config = HazardConfig::default();
    let hazard = run_ensemble_hazard(&ensemble, &site(), &IM::psa(1.0), &config, None).unwrap();
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(1.0),
        HazardQuery::Exceedance(1e-3),
        &config,
    )
    .unwrap();
    assert_relative_eq!(
        result.im_value,
        hazard.exceedance_to_im(1e-3).unwrap(),
        max_relative = 1e-12
    );
}

#[test]
fn test_zero_hazard_branch_gets_no_weight() {
    let ensemble = lognormal_ensemble(&[
        (0.5, vec![("r1", 0.01, -1.867, 0.4965), ("r2", 0.002, 0.3f64.ln(), 0.6)]),
        (0.5, vec![("r1", 0.01, -100.0, 0.5), ("r2", 0.002, -100.0, 0.5)]),
    ]);
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(1.0),
        HazardQuery::ImLevel(0.2),
        &HazardConfig::default(),
    )
    .unwrap();
    assert_eq!(result.adjusted_weights, vec![1.0, 0.0]);
    assert_eq!(result.branches[1].total_hazard, 0.0);
    let c = result.fault_contributions();
    assert_relative_eq!(c[&RuptureId::from("r1")], 0.668, epsilon = 1e-3);
    assert_relative_eq!(result.contribution_sum(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_all_zero_hazard_has_no_candidates() {
    let ensemble = lognormal_ensemble(&[(1.0, vec![("r1", 0.01, -100.0, 0.5)])]);
    assert!(matches!(
        run_ensemble_disagg(
            &ensemble,
            &site(),
            &IM::psa(1.0),
            HazardQuery::ImLevel(0.2),
            &HazardConfig::default(),
        ),
        Err(PshaError::NoCandidates { .. })
    ));
}

#[test]
fn test_simulated_epsilon_matches_standard_normal() {
    // ln(IM) ~ N(0, 1), so the epsilon of IM level e^x is x
    let ensemble = simulated_ensemble(1_000_000, 11);
    for x in [-0.5f64, 0.0, 1.0] {
        let result = run_ensemble_disagg(
            &ensemble,
            &site(),
            &IM::psa(1.0),
            HazardQuery::ImLevel(x.exp()),
            &HazardConfig::default(),
        )
        .unwrap();
        assert_eq!(result.contributions.len(), 1);
        assert_relative_eq!(result.contributions[0].epsilon, x, epsilon = 1e-2);
        assert_relative_eq!(result.summary.mean_epsilon, x, epsilon = 1e-2);
    }
}

#[test]
fn test_summary_statistics() {
    let ensemble = two_branch_ensemble();
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(1.0),
        HazardQuery::Exceedance(1.0 / 475.0),
        &HazardConfig::default(),
    )
    .unwrap();
    let s = result.summary;
    assert!((5.5..=7.5).contains(&s.mean_magnitude));
    assert!((12.0..=45.0).contains(&s.mean_rrup));
    assert!(s.magnitude_16th <= s.magnitude_84th);
    assert!(s.rrup_16th <= s.rrup_84th);
    assert!(s.mean_recurrence_interval >= 20.0);
}

#[test]
fn test_grid_conserves_contribution() {
    let ensemble = two_branch_ensemble();
    let result = run_ensemble_disagg(
        &ensemble,
        &site(),
        &IM::psa(0.5),
        HazardQuery::Exceedance(1.0 / 475.0),
        &HazardConfig::default(),
    )
    .unwrap();
    let grid = result.grid(&DisaggGridConfig::default()).unwrap();

    assert_eq!(grid.excluded_contribution, 0.0);
    assert_relative_eq!(grid.total_grid().sum(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(grid.fault_grid.sum(), result.fault_contributions().values().sum::<f64>(), epsilon = 1e-9);
    assert_eq!(grid.epsilon_grids.len(), 8);
    let eps_total: f64 = grid.epsilon_grids.iter().map(|g| g.sum()).sum();
    assert_relative_eq!(eps_total, 1.0, epsilon = 1e-9);

    // Every rupture lands in the magnitude / distance range of the grid
    let mags = grid.mag_bin_edges.clone();
    assert!(mags[0] <= 5.5 && *mags.last().unwrap() >= 7.5);
    assert!(grid.rrup_bin_edges[0] <= 12.0 && *grid.rrup_bin_edges.last().unwrap() >= 45.0);
}

#[test]
fn test_unsupported_im() {
    let ensemble = regression_ensemble();
    assert!(matches!(
        run_ensemble_disagg(
            &ensemble,
            &site(),
            &common::pga(),
            HazardQuery::ImLevel(0.2),
            &HazardConfig::default(),
        ),
        Err(PshaError::UnsupportedIm(_))
    ));
}
