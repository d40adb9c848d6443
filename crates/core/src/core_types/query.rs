//! Hazard query: either a target exceedance or an explicit IM level

use crate::error::{PshaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target of a disaggregation / GMS / causal-bounds calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum HazardQuery {
    /// Annual exceedance probability; converted to an IM level via the hazard curve
    Exceedance(f64),
    /// Explicit IM level
    ImLevel(f64),
}

impl HazardQuery {
    /// Build from the optional pair used by request-style inputs
    ///
    /// Exactly one of the two has to be set.
    pub fn from_options(exceedance: Option<f64>, im_level: Option<f64>) -> Result<Self> {
        match (exceedance, im_level) {
            (Some(e), None) => Self::exceedance(e),
            (None, Some(v)) => Self::im_level(v),
            (None, None) => Err(PshaError::MissingHazardQuery),
            (Some(_), Some(_)) => Err(PshaError::AmbiguousHazardQuery),
        }
    }

    /// Exceedance query, validated to lie in (0, 1)
    pub fn exceedance(exceedance: f64) -> Result<Self> {
        if exceedance > 0.0 && exceedance < 1.0 {
            Ok(Self::Exceedance(exceedance))
        } else {
            Err(PshaError::InvalidParameter(format!(
                "exceedance must lie in (0, 1), got {exceedance}"
            )))
        }
    }

    /// IM level query, validated to be positive
    pub fn im_level(im_level: f64) -> Result<Self> {
        if im_level > 0.0 && im_level.is_finite() {
            Ok(Self::ImLevel(im_level))
        } else {
            Err(PshaError::InvalidParameter(format!(
                "IM level must be positive, got {im_level}"
            )))
        }
    }

    /// File-name token used by the result store
    pub fn file_token(&self) -> String {
        match self {
            Self::Exceedance(e) => format!("excd_{e:e}"),
            Self::ImLevel(v) => format!("im_{v:e}"),
        }
    }
}

impl fmt::Display for HazardQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exceedance(e) => write!(f, "exceedance {e:e}"),
            Self::ImLevel(v) => write!(f, "IM level {v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options_requires_exactly_one() {
        assert!(matches!(
            HazardQuery::from_options(None, None),
            Err(PshaError::MissingHazardQuery)
        ));
        assert!(matches!(
            HazardQuery::from_options(Some(0.01), Some(0.2)),
            Err(PshaError::AmbiguousHazardQuery)
        ));
        assert_eq!(
            HazardQuery::from_options(Some(0.01), None).unwrap(),
            HazardQuery::Exceedance(0.01)
        );
        assert_eq!(
            HazardQuery::from_options(None, Some(0.3)).unwrap(),
            HazardQuery::ImLevel(0.3)
        );
    }

    #[test]
    fn test_validation() {
        assert!(HazardQuery::exceedance(1.5).is_err());
        assert!(HazardQuery::exceedance(0.0).is_err());
        assert!(HazardQuery::im_level(-0.1).is_err());
    }
}
