//! GCIM realisations and replica choice

use super::gcim::Gcim;
use crate::core_types::IM;
use crate::error::{PshaError, Result};
use crate::stats::ks_statistic;
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weighted set of simulated IM vectors (rows are realisations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realisations {
    ims: Vec<IM>,
    values: DMatrix<f64>,
    weights: Vec<f64>,
}

impl Realisations {
    /// Wrap realisation values; weights are normalised to sum to one
    pub fn new(ims: Vec<IM>, values: DMatrix<f64>, weights: Vec<f64>) -> Result<Self> {
        if values.ncols() != ims.len() || values.nrows() != weights.len() {
            return Err(PshaError::InvalidParameter(format!(
                "realisation matrix is {}x{} for {} IMs and {} weights",
                values.nrows(),
                values.ncols(),
                ims.len(),
                weights.len()
            )));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(PshaError::InvalidWeights {
                context: "realisations".to_string(),
                sum: total,
            });
        }
        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self {
            ims,
            values,
            weights,
        })
    }

    /// Target IMs (columns)
    pub fn ims(&self) -> &[IM] {
        &self.ims
    }

    /// Realisation values (n_realisations x n_ims)
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Normalised realisation weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of realisations
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    /// Whether there are no realisations
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of one target IM across realisations
    pub fn column(&self, i: usize) -> Vec<f64> {
        self.values.column(i).iter().copied().collect()
    }

    /// Mean KS distance between each IM's realisations and its GCIM marginal
    pub fn ks_distance(&self, gcim: &Gcim) -> f64 {
        mean_ks_distance(
            (0..self.ims.len()).map(|i| self.column(i)),
            gcim,
        )
    }
}

/// Mean over IMs of the KS statistic of `columns` against the GCIM marginals
pub fn mean_ks_distance(columns: impl Iterator<Item = Vec<f64>>, gcim: &Gcim) -> f64 {
    let stats: Vec<f64> = columns
        .zip(&gcim.marginals)
        .map(|(column, marginal)| ks_statistic(&column, |x| marginal.cdf(x)))
        .collect();
    if stats.is_empty() {
        return f64::NAN;
    }
    stats.iter().sum::<f64>() / stats.len() as f64
}

/// Draw `n_replica` independent replicas of `n_realisations` each
pub fn generate_replicas<R: Rng + ?Sized>(
    gcim: &Gcim,
    n_realisations: usize,
    n_replica: usize,
    rng: &mut R,
) -> Result<Vec<Realisations>> {
    if n_realisations == 0 || n_replica == 0 {
        return Err(PshaError::InvalidParameter(
            "number of realisations and replicas must be positive".to_string(),
        ));
    }
    (0..n_replica)
        .map(|_| gcim.sample(n_realisations, rng))
        .collect()
}

/// Index of the replica whose realisations best reproduce the GCIM marginals
pub fn best_replica(replicas: &[Realisations], gcim: &Gcim) -> Option<usize> {
    let distances: Vec<f64> = replicas.iter().map(|r| r.ks_distance(gcim)).collect();
    debug!("Replica KS distances: {:?}", distances);
    distances
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}
