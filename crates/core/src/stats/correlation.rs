//! Correlation matrices: weighted estimation, positive-definite repair and
//! spectral-period correlation model
//!
//! # References
//! - Baker, J.W., Jayaram, N. (2008). "Correlation of spectral acceleration values
//!   from NGA ground motion models". Earthquake Spectra, 24(1), 299-317
//! - Higham, N.J. (1988). "Computing a nearest symmetric positive semidefinite matrix".
//!   Linear Algebra and its Applications, 103, 103-118

use crate::error::{PshaError, Result};
use nalgebra::DMatrix;
use std::f64::consts::PI;
use tracing::debug;

/// Smallest eigenvalue kept when repairing a correlation matrix
const MIN_EIGENVALUE: f64 = 1e-8;

/// Weighted Pearson correlation of the columns of `data` (rows are observations)
///
/// Columns with zero weighted variance are treated as uncorrelated with everything.
pub fn weighted_correlation(data: &DMatrix<f64>, weights: &[f64]) -> Result<DMatrix<f64>> {
    let (n_obs, n_vars) = data.shape();
    if weights.len() != n_obs {
        return Err(PshaError::InvalidParameter(format!(
            "{} observations but {} weights",
            n_obs,
            weights.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PshaError::NoCandidates {
            context: "all correlation weights are zero".to_string(),
        });
    }

    let means: Vec<f64> = (0..n_vars)
        .map(|j| (0..n_obs).map(|i| weights[i] * data[(i, j)]).sum::<f64>() / total)
        .collect();

    let mut cov = DMatrix::zeros(n_vars, n_vars);
    for a in 0..n_vars {
        for b in a..n_vars {
            let c = (0..n_obs)
                .map(|i| weights[i] * (data[(i, a)] - means[a]) * (data[(i, b)] - means[b]))
                .sum::<f64>()
                / total;
            cov[(a, b)] = c;
            cov[(b, a)] = c;
        }
    }

    let mut corr = DMatrix::identity(n_vars, n_vars);
    for a in 0..n_vars {
        for b in 0..n_vars {
            if a == b {
                continue;
            }
            let denom = (cov[(a, a)] * cov[(b, b)]).sqrt();
            corr[(a, b)] = if denom > 0.0 {
                (cov[(a, b)] / denom).clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }
    Ok(corr)
}

/// Nearest correlation matrix with strictly positive eigenvalues
///
/// Clips the eigenvalues of the symmetrised input and rescales to a unit diagonal.
pub fn nearest_positive_definite(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let symmetric = (matrix + matrix.transpose()) * 0.5;
    let mut eigen = symmetric.symmetric_eigen();
    eigen
        .eigenvalues
        .iter_mut()
        .for_each(|v| *v = v.max(MIN_EIGENVALUE));
    let repaired = eigen.recompose();

    let n = repaired.nrows();
    let mut out = repaired.clone();
    for a in 0..n {
        for b in 0..n {
            out[(a, b)] = repaired[(a, b)] / (repaired[(a, a)] * repaired[(b, b)]).sqrt();
        }
    }
    (&out + out.transpose()) * 0.5
}

/// Lower Cholesky factor, repairing the matrix first if it is not positive definite
pub fn cholesky_with_repair(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if let Some(chol) = matrix.clone().cholesky() {
        return Ok(chol.l());
    }
    debug!(
        "Correlation matrix ({}x{}) not positive definite, projecting to nearest PD matrix",
        matrix.nrows(),
        matrix.ncols()
    );
    nearest_positive_definite(matrix)
        .cholesky()
        .map(|chol| chol.l())
        .ok_or(PshaError::CorrelationNotPositiveDefinite)
}

/// Baker & Jayaram (2008) correlation between spectral accelerations at two periods
pub fn baker_jayaram_2008(t1: f64, t2: f64) -> f64 {
    let t_min = t1.min(t2);
    let t_max = t1.max(t2);
    if (t_max - t_min).abs() < 1e-12 {
        return 1.0;
    }

    let c1 = 1.0 - (PI / 2.0 - 0.366 * (t_max / t_min.max(0.109)).ln()).cos();
    let c2 = if t_max < 0.2 {
        1.0 - 0.105 * (1.0 - 1.0 / (1.0 + (100.0 * t_max - 5.0).exp()))
            * (t_max - t_min)
            / (t_max - 0.0099)
    } else {
        0.0
    };
    let c3 = if t_max < 0.109 { c2 } else { c1 };
    let c4 = c1 + 0.5 * (c3.sqrt() - c3) * (1.0 + (PI * t_min / 0.109).cos());

    if t_max < 0.109 {
        c2
    } else if t_min > 0.109 {
        c1
    } else if t_max < 0.2 {
        c2.min(c4)
    } else {
        c4
    }
}
