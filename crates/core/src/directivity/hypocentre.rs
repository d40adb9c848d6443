//! Hypocentre placement on a multi-plane fault
//!
//! A hypocentre position is a pair of unit fractions: along the whole trace and down
//! the dip of the plane it lands on. Along-strike positions follow a normal(0.5, 0.23)
//! truncated to [0, 1]; down-dip positions follow a rupture-type dependent density.
//!
//! Each placement is a copy of the plane list where exactly one plane carries the
//! hypocentre and every other plane keeps the [`NO_HYPOCENTRE`] marker.
//!
//! # Scientific References
//! - Mai, P.M., Spudich, P., Boatwright, J. (2005). "Hypocenter locations in
//!   finite-source rupture models". BSSA 95(3), 965-980
//! - McKay, M.D., Beckman, R.J., Conover, W.J. (1979). "A comparison of three methods
//!   for selecting values of input variables in the analysis of output from a
//!   computer code". Technometrics 21(2)

use super::geometry::{trace_length, Plane, NO_HYPOCENTRE};
use crate::error::{PshaError, Result};
use crate::stats::{BaseDensity, UnitTruncated};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Faulting style derived from rake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuptureType {
    /// Rake within 30 degrees of 0 or +-180
    StrikeSlip,
    /// Rake within 30 degrees of +-90
    DipSlip,
    /// Everything in between
    Oblique,
}

impl RuptureType {
    /// Classify a rake angle (degrees)
    pub fn from_rake(rake: f64) -> Self {
        let r = rake.abs();
        if r <= 30.0 || r >= 150.0 {
            Self::StrikeSlip
        } else if (60.0..=120.0).contains(&r) {
            Self::DipSlip
        } else {
            Self::Oblique
        }
    }

    /// Down-dip hypocentre density, as a fraction of the width
    pub fn down_dip_density(self) -> Result<UnitTruncated> {
        let base = match self {
            Self::StrikeSlip => BaseDensity::Weibull {
                shape: 3.921,
                scale: 0.626,
            },
            Self::DipSlip => BaseDensity::Gamma {
                shape: 7.364,
                scale: 0.072,
            },
            Self::Oblique => BaseDensity::Weibull {
                shape: 3.353,
                scale: 0.612,
            },
        };
        UnitTruncated::new(base)
    }
}

/// Hypocentre sampling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HypocentreMethod {
    /// Regular grid weighted by the placement densities
    UniformGrid {
        /// Positions along strike
        n_strike: usize,
        /// Positions down dip
        n_dip: usize,
    },
    /// Independent draws from the placement densities
    MonteCarlo {
        /// Number of draws
        n: usize,
    },
    /// Latin hypercube design over the placement densities
    LatinHypercube {
        /// Number of strata
        n: usize,
    },
}

impl HypocentreMethod {
    /// Number of placements produced
    pub fn n_hypo(&self) -> usize {
        match *self {
            Self::UniformGrid { n_strike, n_dip } => n_strike * n_dip,
            Self::MonteCarlo { n } | Self::LatinHypercube { n } => n,
        }
    }
}

/// Hypocentre sampling settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypocentreConfig {
    /// Sampling strategy
    pub method: HypocentreMethod,
    /// RNG seed of the stochastic strategies (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for HypocentreConfig {
    fn default() -> Self {
        Self {
            method: HypocentreMethod::LatinHypercube { n: 100 },
            seed: None,
        }
    }
}

/// One hypocentre placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypocentrePlacement {
    /// Plane list with the hypocentre set on exactly one plane
    pub planes: Vec<Plane>,
    /// Placement weight (weights of a sampling run sum to 1)
    pub weight: f64,
}

impl HypocentrePlacement {
    /// Index of the plane carrying the hypocentre
    pub fn hypocentre_plane(&self) -> Option<usize> {
        self.planes.iter().position(Plane::has_hypocentre)
    }
}

/// Put a hypocentre at fractional position (`fs` along the trace, `fd` down dip)
pub fn place_hypocentre(planes: &[Plane], fs: f64, fd: f64) -> Vec<Plane> {
    let mut out: Vec<Plane> = planes
        .iter()
        .map(|p| Plane {
            shyp: NO_HYPOCENTRE,
            dhyp: NO_HYPOCENTRE,
            ..*p
        })
        .collect();

    let target = fs.clamp(0.0, 1.0) * trace_length(planes);
    let mut start = 0.0;
    let last = out.len().saturating_sub(1);
    for (k, plane) in out.iter_mut().enumerate() {
        if target <= start + plane.length || k == last {
            let along = (target - start).clamp(0.0, plane.length);
            plane.shyp = along - plane.length / 2.0;
            plane.dhyp = fd.clamp(0.0, 1.0) * plane.width;
            break;
        }
        start += plane.length;
    }
    out
}

/// Sample hypocentre placements
pub fn sample_hypocentres<R: Rng + ?Sized>(
    planes: &[Plane],
    rupture_type: RuptureType,
    method: HypocentreMethod,
    rng: &mut R,
) -> Result<Vec<HypocentrePlacement>> {
    if planes.is_empty() {
        return Err(PshaError::InvalidParameter(
            "fault has no planes".to_string(),
        ));
    }
    if method.n_hypo() == 0 {
        return Err(PshaError::InvalidParameter(
            "at least one hypocentre has to be sampled".to_string(),
        ));
    }
    let strike = UnitTruncated::along_strike()?;
    let dip = rupture_type.down_dip_density()?;

    let placements = match method {
        HypocentreMethod::UniformGrid { n_strike, n_dip } => {
            let mut raw = Vec::with_capacity(n_strike * n_dip);
            for i in 0..n_strike {
                let fs = (i as f64 + 0.5) / n_strike as f64;
                for j in 0..n_dip {
                    let fd = (j as f64 + 0.5) / n_dip as f64;
                    raw.push((fs, fd, strike.pdf(fs) * dip.pdf(fd)));
                }
            }
            let total: f64 = raw.iter().map(|(_, _, w)| w).sum();
            if !(total > 0.0) {
                return Err(PshaError::InvalidWeights {
                    context: "hypocentre grid".to_string(),
                    sum: total,
                });
            }
            raw.into_iter()
                .map(|(fs, fd, w)| HypocentrePlacement {
                    planes: place_hypocentre(planes, fs, fd),
                    weight: w / total,
                })
                .collect()
        }
        HypocentreMethod::MonteCarlo { n } => (0..n)
            .map(|_| {
                let fs = strike.sample(rng);
                let fd = dip.sample(rng);
                HypocentrePlacement {
                    planes: place_hypocentre(planes, fs, fd),
                    weight: 1.0 / n as f64,
                }
            })
            .collect(),
        HypocentreMethod::LatinHypercube { n } => {
            let us = latin_hypercube_column(n, rng);
            let ud = latin_hypercube_column(n, rng);
            us.into_iter()
                .zip(ud)
                .map(|(a, b)| HypocentrePlacement {
                    planes: place_hypocentre(planes, strike.inverse_cdf(a), dip.inverse_cdf(b)),
                    weight: 1.0 / n as f64,
                })
                .collect()
        }
    };

    debug!(
        "Sampled {} hypocentres ({:?}, {:?})",
        method.n_hypo(),
        method,
        rupture_type
    );
    Ok(placements)
}

/// One stratified uniform column: a random point in each of `n` strata, shuffled
fn latin_hypercube_column<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let mut strata: Vec<usize> = (0..n).collect();
    strata.shuffle(rng);
    strata
        .into_iter()
        .map(|k| (k as f64 + rng.random::<f64>()) / n as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_planes() -> Vec<Plane> {
        vec![
            Plane::new(Vector2::new(0.0, -10.0), 0.0, 60.0, 20.0, 12.0, 1.0),
            Plane::new(Vector2::new(0.0, 15.0), 0.0, 60.0, 30.0, 12.0, 1.0),
        ]
    }

    #[test]
    fn test_rake_classification() {
        assert_eq!(RuptureType::from_rake(0.0), RuptureType::StrikeSlip);
        assert_eq!(RuptureType::from_rake(-175.0), RuptureType::StrikeSlip);
        assert_eq!(RuptureType::from_rake(90.0), RuptureType::DipSlip);
        assert_eq!(RuptureType::from_rake(-100.0), RuptureType::DipSlip);
        assert_eq!(RuptureType::from_rake(45.0), RuptureType::Oblique);
        assert_eq!(RuptureType::from_rake(-135.0), RuptureType::Oblique);
    }

    #[test]
    fn test_place_hypocentre_picks_plane() {
        let planes = two_planes();
        // 30 km along a 50 km trace lands 10 km into the second plane
        let placed = place_hypocentre(&planes, 0.6, 0.5);
        assert!(!placed[0].has_hypocentre());
        assert!(placed[1].has_hypocentre());
        assert_relative_eq!(placed[1].shyp, -5.0, epsilon = 1e-9);
        assert_relative_eq!(placed[1].dhyp, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uniform_grid_weights() {
        let mut rng = StdRng::seed_from_u64(1);
        let placements = sample_hypocentres(
            &two_planes(),
            RuptureType::DipSlip,
            HypocentreMethod::UniformGrid { n_strike: 7, n_dip: 5 },
            &mut rng,
        )
        .unwrap();
        assert_eq!(placements.len(), 35);
        let total: f64 = placements.iter().map(|p| p.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        // The truncated normal favours the centre of the trace
        let centre = placements[3 * 5 + 2].weight;
        assert!(centre > placements[2].weight);
    }

    #[test]
    fn test_stochastic_methods_place_one_hypocentre_per_copy() {
        let mut rng = StdRng::seed_from_u64(7);
        for method in [
            HypocentreMethod::MonteCarlo { n: 40 },
            HypocentreMethod::LatinHypercube { n: 40 },
        ] {
            let placements =
                sample_hypocentres(&two_planes(), RuptureType::StrikeSlip, method, &mut rng)
                    .unwrap();
            assert_eq!(placements.len(), 40);
            for p in &placements {
                assert_eq!(p.planes.iter().filter(|pl| pl.has_hypocentre()).count(), 1);
                assert_relative_eq!(p.weight, 1.0 / 40.0, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_latin_hypercube_strata_are_covered() {
        let mut rng = StdRng::seed_from_u64(3);
        let column = latin_hypercube_column(10, &mut rng);
        let mut strata: Vec<usize> = column.iter().map(|u| (u * 10.0) as usize).collect();
        strata.sort_unstable();
        assert_eq!(strata, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_hypocentres_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(sample_hypocentres(
            &two_planes(),
            RuptureType::Oblique,
            HypocentreMethod::MonteCarlo { n: 0 },
            &mut rng
        )
        .is_err());
    }
}
