//! Non-parametric and parametric statistics utilities
//!
//! Weighted empirical CDF construction and inversion, Kolmogorov-Smirnov bounds,
//! normal / truncated densities and correlation-matrix handling. Everything above
//! this module builds on these primitives.

pub mod correlation;
pub mod distributions;
pub mod ecdf;

pub use correlation::{
    baker_jayaram_2008, cholesky_with_repair, nearest_positive_definite, weighted_correlation,
};
pub use distributions::{
    lognormal_exceedance, std_normal_cdf, std_normal_ppf, std_normal_sf, BaseDensity,
    UnitTruncated,
};
pub use ecdf::{ks_critical_value, ks_statistic, query_non_parametric_cdf_invs, WeightedEcdf};
