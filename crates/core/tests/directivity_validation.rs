//! Hypocentre-averaged Bayless & Somerville (2020) directivity

mod common;

use approx::assert_relative_eq;
use nalgebra::Vector2;
use psha_core::directivity::bayless_validation::{
    bayless_2020, BaylessInput, HypocentreGeometry,
};
use psha_core::directivity::{
    compute_directivity, place_hypocentre, run_directivity, sample_hypocentres, FaultSource,
    HypocentreConfig, HypocentreMethod, HypocentrePlacement, Plane, RuptureType, SiteGrid,
};
use psha_core::PshaError;
use rand::rngs::StdRng;
use rand::SeedableRng;

const PERIODS: [f64; 3] = [1.0, 3.0, 7.5];

/// Vertical north-striking strike-slip fault centred on the origin
fn vertical_strike_slip() -> FaultSource {
    FaultSource {
        name: "vertical_ss".to_string(),
        planes: vec![Plane::new(Vector2::new(0.0, 0.0), 0.0, 90.0, 40.0, 15.0, 0.0)],
        magnitude: 7.0,
        rake: 180.0,
    }
}

/// Two connected planes with a 30 degree bend
fn bent_fault() -> FaultSource {
    let first = Plane::new(Vector2::new(0.0, 0.0), 0.0, 60.0, 20.0, 12.0, 0.0);
    let bend = 30f64.to_radians();
    let centre = first.trace_end() + Vector2::new(bend.sin(), bend.cos()) * 10.0;
    let second = Plane::new(centre, 30.0, 60.0, 20.0, 12.0, 0.0);
    FaultSource {
        name: "bent".to_string(),
        planes: vec![first, second],
        magnitude: 6.8,
        rake: 90.0,
    }
}

fn central_placement(source: &FaultSource) -> HypocentrePlacement {
    HypocentrePlacement {
        planes: place_hypocentre(&source.planes, 0.5, 0.5),
        weight: 1.0,
    }
}

#[test]
fn test_central_hypocentre_is_symmetric() {
    let source = vertical_strike_slip();
    let mut sites = Vec::new();
    for (x, y) in [(5.0, 8.0), (12.0, 15.0), (3.0, 30.0), (25.0, 5.0)] {
        sites.extend([
            Vector2::new(x, y),
            Vector2::new(-x, y),
            Vector2::new(x, -y),
            Vector2::new(-x, -y),
        ]);
    }
    let result =
        compute_directivity(&source, &sites, &PERIODS, &[central_placement(&source)]).unwrap();

    for group in 0..4 {
        for p in 0..PERIODS.len() {
            let reference = result.fd[(4 * group, p)];
            for k in 1..4 {
                assert_relative_eq!(result.fd[(4 * group + k, p)], reference, epsilon = 1e-9);
                assert_relative_eq!(
                    result.phi_red[(4 * group + k, p)],
                    result.phi_red[(4 * group, p)],
                    epsilon = 1e-9
                );
            }
        }
    }
}

#[test]
fn test_average_is_weighted_mean_of_placements() {
    let source = vertical_strike_slip();
    let sites = SiteGrid::around(&source.planes, 20.0, 7).sites;
    let a = HypocentrePlacement {
        planes: place_hypocentre(&source.planes, 0.2, 0.6),
        weight: 1.0,
    };
    let b = HypocentrePlacement {
        planes: place_hypocentre(&source.planes, 0.9, 0.4),
        weight: 3.0,
    };

    let only_a = compute_directivity(&source, &sites, &PERIODS, &[a.clone()]).unwrap();
    let only_b = compute_directivity(&source, &sites, &PERIODS, &[b.clone()]).unwrap();
    let both = compute_directivity(&source, &sites, &PERIODS, &[a, b]).unwrap();

    assert_eq!(both.n_hypo, 2);
    let expected = &only_a.fd * 0.25 + &only_b.fd * 0.75;
    for (x, y) in both.fd.iter().zip(expected.iter()) {
        assert_relative_eq!(*x, *y, epsilon = 1e-12);
    }
}

#[test]
fn test_grid_sampling_on_multi_plane_fault() {
    let source = bent_fault();
    let mut rng = StdRng::seed_from_u64(0);
    let method = HypocentreMethod::UniformGrid {
        n_strike: 8,
        n_dip: 4,
    };
    let placements =
        sample_hypocentres(&source.planes, source.rupture_type(), method, &mut rng).unwrap();

    assert_eq!(source.rupture_type(), RuptureType::DipSlip);
    assert_eq!(placements.len(), 32);
    assert_relative_eq!(
        placements.iter().map(|p| p.weight).sum::<f64>(),
        1.0,
        epsilon = 1e-12
    );
    for placement in &placements {
        let with_hyp = placement.planes.iter().filter(|p| p.has_hypocentre()).count();
        assert_eq!(with_hyp, 1);
    }
    // Both planes receive hypocentres
    let on_second = placements
        .iter()
        .filter(|p| p.hypocentre_plane() == Some(1))
        .count();
    assert_eq!(on_second, 16);

    let sites = SiteGrid::around(&source.planes, 30.0, 9).sites;
    let result = compute_directivity(&source, &sites, &PERIODS, &placements).unwrap();
    assert!(result.fd.iter().all(|v| v.is_finite()));
    assert!(result.phi_red.iter().all(|v| *v >= 0.0));
}

#[test]
fn test_every_method_places_one_hypocentre() {
    let source = bent_fault();
    let methods = [
        HypocentreMethod::UniformGrid {
            n_strike: 5,
            n_dip: 3,
        },
        HypocentreMethod::MonteCarlo { n: 40 },
        HypocentreMethod::LatinHypercube { n: 40 },
    ];
    for method in methods {
        let mut rng = StdRng::seed_from_u64(11);
        let placements =
            sample_hypocentres(&source.planes, source.rupture_type(), method, &mut rng).unwrap();
        assert_eq!(placements.len(), method.n_hypo());
        for placement in &placements {
            let with_hyp = placement.planes.iter().filter(|p| p.has_hypocentre()).count();
            assert_eq!(with_hyp, 1, "{method:?}");
            assert!(placement.hypocentre_plane().is_some());
        }
        assert_relative_eq!(
            placements.iter().map(|p| p.weight).sum::<f64>(),
            1.0,
            epsilon = 1e-12
        );
    }
}

/// Values evaluated independently from the closed-form model
#[test]
fn test_model_matches_reference_values() {
    let strike_slip = bayless_2020(&BaylessInput {
        u: &[15.0, -5.0, 2.0],
        t: &[3.0, 12.0, 25.0],
        rrup: &[3.0, 12.0, 25.0],
        geometry: HypocentreGeometry {
            smax: (-20.0, 20.0),
            d: 8.0,
            tbot: 0.0,
            dtop: 0.0,
            dbot: 15.0,
            dip: 90.0,
        },
        magnitude: 7.0,
        rake: 180.0,
        periods: &[1.0, 3.0],
    });
    let fd = [
        [0.07992705882583886, 0.2042641722631253],
        [-0.025948345515539126, -0.06631442963363103],
        [0.02546375596749922, 0.0650759969379726],
    ];
    let phi_red = [
        [0.035, 0.08],
        [0.03499999999498744, 0.07999999998854271],
        [0.034994724342371664, 0.07998794135399236],
    ];
    for i in 0..3 {
        for j in 0..2 {
            assert_relative_eq!(strike_slip.fd[(i, j)], fd[i][j], max_relative = 1e-9);
            assert_relative_eq!(strike_slip.phi_red[(i, j)], phi_red[i][j], max_relative = 1e-9);
        }
    }

    let dip = 45f64.to_radians();
    let geometry = HypocentreGeometry {
        smax: (-10.0, 30.0),
        d: 6.0,
        tbot: 14.0 * dip.cos(),
        dtop: 2.0,
        dbot: 2.0 + 14.0 * dip.sin(),
        dip: 45.0,
    };
    let run = |rake: f64| {
        bayless_2020(&BaylessInput {
            u: &[1.0, 20.0, -3.0],
            t: &[5.0, -4.0, 30.0],
            rrup: &[3.5, 6.0, 25.0],
            geometry,
            magnitude: 6.5,
            rake,
            periods: &[2.0],
        })
    };
    let reverse = run(90.0);
    let oblique = run(-45.0);
    let expected = [
        (0.343302561923669, 0.16011454048378504),
        (-0.11578145229661173, 0.06830890587409219),
        (0.44607865125724033, 0.23557634618045475),
    ];
    for (i, (r, o)) in expected.iter().enumerate() {
        assert_relative_eq!(reverse.fd[(i, 0)], *r, max_relative = 1e-9);
        assert_relative_eq!(oblique.fd[(i, 0)], *o, max_relative = 1e-9);
    }
    assert_relative_eq!(reverse.phi_red[(2, 0)], 0.06426893233344948, max_relative = 1e-9);
    assert_relative_eq!(oblique.phi_red[(2, 0)], 0.06560945554214412, max_relative = 1e-9);
}

#[test]
fn test_seeded_runs_repeat() {
    let source = vertical_strike_slip();
    let sites = SiteGrid::around(&source.planes, 20.0, 5).sites;
    let config = HypocentreConfig {
        method: HypocentreMethod::LatinHypercube { n: 50 },
        seed: Some(3),
    };
    let run = || {
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_default());
        run_directivity(&source, &sites, &PERIODS, &config, &mut rng).unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.n_hypo, 50);
    assert_eq!(a.fd, b.fd);
}

#[test]
fn test_far_sites_are_unaffected() {
    let source = vertical_strike_slip();
    // Rmax for M7 strike-slip is 80 km
    let sites = [Vector2::new(150.0, 0.0), Vector2::new(0.0, 200.0)];
    let result =
        compute_directivity(&source, &sites, &PERIODS, &[central_placement(&source)]).unwrap();
    assert!(result.fd.iter().all(|v| v.abs() < 1e-12));
    assert_relative_eq!(result.amplification(0, 0), 1.0, epsilon = 1e-12);
}

#[test]
fn test_invalid_inputs() {
    let source = vertical_strike_slip();
    let sites = [Vector2::new(5.0, 5.0)];
    let placement = central_placement(&source);

    assert!(matches!(
        compute_directivity(&source, &sites, &[0.0, 1.0], &[placement.clone()]),
        Err(PshaError::InvalidParameter(_))
    ));
    assert!(matches!(
        compute_directivity(&source, &sites, &PERIODS, &[]),
        Err(PshaError::InvalidParameter(_))
    ));
    let no_hypocentre = HypocentrePlacement {
        planes: source.planes.clone(),
        weight: 1.0,
    };
    assert!(matches!(
        compute_directivity(&source, &sites, &PERIODS, &[no_hypocentre]),
        Err(PshaError::InvalidParameter(_))
    ));
}

#[test]
fn test_result_json() {
    let source = vertical_strike_slip();
    let sites = [Vector2::new(5.0, 25.0)];
    let result =
        compute_directivity(&source, &sites, &PERIODS, &[central_placement(&source)]).unwrap();
    let value = result.to_json_value().unwrap();
    assert_eq!(value["n_hypo"], 1);
    assert_eq!(value["periods"].as_array().unwrap().len(), 3);
}
