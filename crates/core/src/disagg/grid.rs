//! Magnitude / distance / epsilon binning of disaggregation contributions
//!
//! Bin bounds follow the data: the contributing magnitudes and distances are
//! rounded outwards to multiples of the bin width. Epsilon bins are fixed; the
//! configured edges are the inner edges, the first and last bins are open.

use super::RuptureContribution;
use crate::core_types::SourceKind;
use crate::error::{PshaError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Grid settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisaggGridConfig {
    /// Magnitude bin width
    pub mag_bin_size: f64,
    /// Rupture-distance bin width (km)
    pub rrup_bin_size: f64,
    /// Inner epsilon bin edges (ascending)
    pub epsilon_bin_edges: Vec<f64>,
}

impl Default for DisaggGridConfig {
    fn default() -> Self {
        Self {
            mag_bin_size: 0.25,
            rrup_bin_size: 10.0,
            epsilon_bin_edges: vec![-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0],
        }
    }
}

/// Binned disaggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisaggGridData {
    /// Magnitude bin edges (n_mag + 1)
    pub mag_bin_edges: Vec<f64>,
    /// Rupture-distance bin edges (n_rrup + 1)
    pub rrup_bin_edges: Vec<f64>,
    /// Fault contributions (n_mag x n_rrup)
    pub fault_grid: DMatrix<f64>,
    /// Distributed-seismicity contributions (n_mag x n_rrup)
    pub ds_grid: DMatrix<f64>,
    /// Inner epsilon bin edges
    pub epsilon_bin_edges: Vec<f64>,
    /// Total contributions per epsilon bin (one grid per bin, lowest first)
    pub epsilon_grids: Vec<DMatrix<f64>>,
    /// Contribution of ruptures without a site distance (left out of the grids)
    pub excluded_contribution: f64,
}

impl DisaggGridData {
    /// Bin contributions into magnitude x distance cells
    pub fn from_contributions(
        contributions: &[RuptureContribution],
        config: &DisaggGridConfig,
    ) -> Result<Self> {
        if !(config.mag_bin_size > 0.0 && config.rrup_bin_size > 0.0) {
            return Err(PshaError::InvalidParameter(
                "disaggregation bin sizes must be positive".to_string(),
            ));
        }
        if config.epsilon_bin_edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PshaError::InvalidParameter(
                "epsilon bin edges must be ascending".to_string(),
            ));
        }

        let mut excluded_contribution = 0.0;
        let mut placed: Vec<(&RuptureContribution, f64)> = Vec::new();
        for c in contributions.iter().filter(|c| c.contribution > 0.0) {
            match c.rrup {
                Some(rrup) => placed.push((c, rrup)),
                None => excluded_contribution += c.contribution,
            }
        }
        if excluded_contribution > 0.0 {
            warn!(
                "{:.4} of the contribution comes from ruptures without a site distance and is not gridded",
                excluded_contribution
            );
        }
        if placed.is_empty() {
            return Err(PshaError::NoCandidates {
                context: "no contributing ruptures with a site distance to grid".to_string(),
            });
        }

        let (mag_min, mag_max) = min_max(placed.iter().map(|(c, _)| c.magnitude));
        let (rrup_min, rrup_max) = min_max(placed.iter().map(|(_, r)| *r));
        let mag_bin_edges = bin_edges(mag_min, mag_max, config.mag_bin_size);
        let rrup_bin_edges = bin_edges(rrup_min.max(0.0), rrup_max, config.rrup_bin_size);
        let n_mag = mag_bin_edges.len() - 1;
        let n_rrup = rrup_bin_edges.len() - 1;
        let n_eps = config.epsilon_bin_edges.len() + 1;

        let mut fault_grid = DMatrix::zeros(n_mag, n_rrup);
        let mut ds_grid = DMatrix::zeros(n_mag, n_rrup);
        let mut epsilon_grids = vec![DMatrix::zeros(n_mag, n_rrup); n_eps];

        for (c, rrup) in placed {
            let i = bin_index(c.magnitude, &mag_bin_edges);
            let j = bin_index(rrup, &rrup_bin_edges);
            match c.source {
                SourceKind::Fault => fault_grid[(i, j)] += c.contribution,
                SourceKind::Distributed => ds_grid[(i, j)] += c.contribution,
            }
            if !c.epsilon.is_nan() {
                let k = config
                    .epsilon_bin_edges
                    .partition_point(|&edge| edge <= c.epsilon);
                epsilon_grids[k][(i, j)] += c.contribution;
            }
        }

        Ok(Self {
            mag_bin_edges,
            rrup_bin_edges,
            fault_grid,
            ds_grid,
            epsilon_bin_edges: config.epsilon_bin_edges.clone(),
            epsilon_grids,
            excluded_contribution,
        })
    }

    /// Fault + distributed-seismicity contributions
    pub fn total_grid(&self) -> DMatrix<f64> {
        &self.fault_grid + &self.ds_grid
    }

    /// Magnitude bin centres
    pub fn mag_bin_centres(&self) -> Vec<f64> {
        centres(&self.mag_bin_edges)
    }

    /// Distance bin centres
    pub fn rrup_bin_centres(&self) -> Vec<f64> {
        centres(&self.rrup_bin_edges)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Edges at multiples of `size` covering [lo, hi], at least one bin
fn bin_edges(lo: f64, hi: f64, size: f64) -> Vec<f64> {
    let start = (lo / size).floor();
    let mut end = (hi / size).ceil();
    if end <= start {
        end = start + 1.0;
    }
    let n = (end - start).round() as usize;
    (0..=n).map(|i| (start + i as f64) * size).collect()
}

fn bin_index(value: f64, edges: &[f64]) -> usize {
    let n_bins = edges.len() - 1;
    edges
        .partition_point(|&e| e <= value)
        .saturating_sub(1)
        .min(n_bins - 1)
}

fn centres(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}
