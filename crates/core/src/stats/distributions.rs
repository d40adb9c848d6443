//! Parametric distributions used across the engine
//!
//! Thin wrappers over `statrs` for the standard normal, lognormal exceedance and
//! the unit-interval truncated densities used for hypocentre placement
//! (Mai, Spudich & Boatwright 2005):
//! - along strike: normal(0.5, 0.23) truncated to [0, 1]
//! - down dip, strike-slip: Weibull(shape 3.921, scale 0.626)
//! - down dip, dip-slip: gamma(shape 7.364, scale 0.072)
//! - down dip, all events (oblique): Weibull(shape 3.353, scale 0.612)

use crate::error::{PshaError, Result};
use rand::Rng;
use statrs::distribution::{Continuous, ContinuousCDF, Gamma, Normal, Weibull};

fn standard_normal() -> Normal {
    // Parameters are constants, construction cannot fail
    Normal::standard()
}

/// Standard normal CDF
pub fn std_normal_cdf(z: f64) -> f64 {
    standard_normal().cdf(z)
}

/// Standard normal survival function P[Z > z]
pub fn std_normal_sf(z: f64) -> f64 {
    standard_normal().sf(z)
}

/// Standard normal inverse CDF; returns -inf / +inf at 0 / 1
pub fn std_normal_ppf(p: f64) -> f64 {
    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else {
        standard_normal().inverse_cdf(p)
    }
}

/// P[IM > x] for ln(IM) ~ N(mu, sigma)
pub fn lognormal_exceedance(x: f64, mu: f64, sigma: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if sigma <= 0.0 {
        return if x.ln() < mu { 1.0 } else { 0.0 };
    }
    std_normal_sf((x.ln() - mu) / sigma)
}

/// Base density of a [`UnitTruncated`] distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseDensity {
    /// Normal(mean, std)
    Normal {
        /// Mean
        mean: f64,
        /// Standard deviation
        std: f64,
    },
    /// Weibull(shape, scale)
    Weibull {
        /// Shape (k)
        shape: f64,
        /// Scale (lambda)
        scale: f64,
    },
    /// Gamma(shape, scale)
    Gamma {
        /// Shape (alpha)
        shape: f64,
        /// Scale (theta = 1 / rate)
        scale: f64,
    },
}

enum Inner {
    Normal(Normal),
    Weibull(Weibull),
    Gamma(Gamma),
}

impl Inner {
    fn pdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.pdf(x),
            Self::Weibull(d) => d.pdf(x),
            Self::Gamma(d) => d.pdf(x),
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        match self {
            Self::Normal(d) => d.cdf(x),
            Self::Weibull(d) => d.cdf(x),
            Self::Gamma(d) => d.cdf(x),
        }
    }

    fn inverse_cdf(&self, p: f64) -> f64 {
        match self {
            Self::Normal(d) => d.inverse_cdf(p),
            Self::Weibull(d) => d.inverse_cdf(p),
            Self::Gamma(d) => d.inverse_cdf(p),
        }
    }
}

/// A density truncated to the unit interval [0, 1]
pub struct UnitTruncated {
    inner: Inner,
    cdf_lo: f64,
    cdf_hi: f64,
}

impl UnitTruncated {
    /// Truncate `base` to [0, 1]
    pub fn new(base: BaseDensity) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| PshaError::InvalidParameter(e.to_string());
        let inner = match base {
            BaseDensity::Normal { mean, std } => {
                Inner::Normal(Normal::new(mean, std).map_err(|e| invalid(&e))?)
            }
            BaseDensity::Weibull { shape, scale } => {
                Inner::Weibull(Weibull::new(shape, scale).map_err(|e| invalid(&e))?)
            }
            BaseDensity::Gamma { shape, scale } => {
                Inner::Gamma(Gamma::new(shape, 1.0 / scale).map_err(|e| invalid(&e))?)
            }
        };
        let cdf_lo = inner.cdf(0.0);
        let cdf_hi = inner.cdf(1.0);
        if cdf_hi - cdf_lo <= 0.0 {
            return Err(PshaError::InvalidParameter(
                "distribution has no mass on [0, 1]".to_string(),
            ));
        }
        Ok(Self {
            inner,
            cdf_lo,
            cdf_hi,
        })
    }

    /// Along-strike hypocentre density
    pub fn along_strike() -> Result<Self> {
        Self::new(BaseDensity::Normal {
            mean: 0.5,
            std: 0.23,
        })
    }

    /// Truncated density at `x` (zero outside [0, 1])
    pub fn pdf(&self, x: f64) -> f64 {
        if !(0.0..=1.0).contains(&x) {
            return 0.0;
        }
        self.inner.pdf(x) / (self.cdf_hi - self.cdf_lo)
    }

    /// Truncated inverse CDF for `u` in [0, 1]
    pub fn inverse_cdf(&self, u: f64) -> f64 {
        let p = self.cdf_lo + u.clamp(0.0, 1.0) * (self.cdf_hi - self.cdf_lo);
        self.inner.inverse_cdf(p).clamp(0.0, 1.0)
    }

    /// Draw a value in [0, 1]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.inverse_cdf(rng.random::<f64>())
    }
}
