//! Intensity measure identity
//!
//! An [`IM`] is an intensity-measure type, an optional spectral period and a
//! horizontal component definition. IMs round-trip through strings of the form
//! `PGA`, `pSA_1.0` or `pSA_0.5_RotD100` and can key hash maps (the period is
//! compared by bit pattern).
//!
//! # Component ratios
//!
//! Conversion between horizontal component definitions uses ratios relative to
//! RotD50, interpolated linearly in log10(period):
//! - RotD100/RotD50 from the empirical table of Shahi & Baker (2014)
//! - Larger/RotD50 from a piecewise-linear period equation (1.10 at 0.01 s rising to
//!   1.16 at 10 s)

use crate::error::{PshaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Period used for PGA when a spectral period is required (correlations, ratios)
pub const PGA_PERIOD: f64 = 0.01;

/// Intensity measure type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImType {
    /// Peak ground acceleration (g)
    PGA,
    /// Peak ground velocity (cm/s)
    PGV,
    /// Pseudo-spectral acceleration (g)
    #[serde(rename = "pSA")]
    PSA,
    /// Cumulative absolute velocity (g.s)
    CAV,
    /// Arias intensity (m/s)
    AI,
    /// 5-75% significant duration (s)
    Ds575,
    /// 5-95% significant duration (s)
    Ds595,
}

impl ImType {
    /// String token used in IM names
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PGA => "PGA",
            Self::PGV => "PGV",
            Self::PSA => "pSA",
            Self::CAV => "CAV",
            Self::AI => "AI",
            Self::Ds575 => "Ds575",
            Self::Ds595 => "Ds595",
        }
    }

    /// IM range spanned by the default hazard IM grid
    pub const fn default_range(self) -> (f64, f64) {
        match self {
            Self::PGA | Self::PSA => (1e-4, 10.0),
            Self::PGV => (1e-2, 1e3),
            Self::CAV => (1e-4, 20.0),
            Self::AI => (1e-4, 100.0),
            Self::Ds575 | Self::Ds595 => (0.1, 200.0),
        }
    }

    /// Exponent relating amplitude scale factor to IM scaling (IM' = sf^alpha * IM)
    pub const fn scaling_exponent(self) -> f64 {
        match self {
            Self::PGA | Self::PGV | Self::PSA | Self::CAV => 1.0,
            Self::AI => 2.0,
            Self::Ds575 | Self::Ds595 => 0.0,
        }
    }
}

impl FromStr for ImType {
    type Err = PshaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PGA" => Ok(Self::PGA),
            "PGV" => Ok(Self::PGV),
            "pSA" | "PSA" => Ok(Self::PSA),
            "CAV" => Ok(Self::CAV),
            "AI" => Ok(Self::AI),
            "Ds575" => Ok(Self::Ds575),
            "Ds595" => Ok(Self::Ds595),
            other => Err(PshaError::UnsupportedIm(other.to_string())),
        }
    }
}

/// Horizontal component definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IMComponent {
    /// Median of rotated spectra
    #[default]
    RotD50,
    /// Maximum of rotated spectra
    RotD100,
    /// Larger of the two as-recorded components
    Larger,
}

impl IMComponent {
    /// String token used in IM names
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RotD50 => "RotD50",
            Self::RotD100 => "RotD100",
            Self::Larger => "Larger",
        }
    }

    /// Ratio of this component to RotD50 at `period`
    pub fn ratio_to_rotd50(self, period: f64) -> f64 {
        match self {
            Self::RotD50 => 1.0,
            Self::RotD100 => interp_log_period(&ROTD100_PERIODS, &ROTD100_RATIOS, period),
            Self::Larger => larger_ratio(period),
        }
    }
}

impl FromStr for IMComponent {
    type Err = PshaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RotD50" => Ok(Self::RotD50),
            "RotD100" => Ok(Self::RotD100),
            "Larger" => Ok(Self::Larger),
            other => Err(PshaError::UnsupportedIm(format!("component {other}"))),
        }
    }
}

// Shahi & Baker (2014), RotD100/RotD50
const ROTD100_PERIODS: [f64; 8] = [0.01, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0];
const ROTD100_RATIOS: [f64; 8] = [1.19, 1.19, 1.21, 1.23, 1.24, 1.24, 1.24, 1.25];

fn larger_ratio(period: f64) -> f64 {
    let x = (period.clamp(0.01, 10.0) / 0.01).log10() / 3.0;
    1.10 + 0.06 * x
}

fn interp_log_period(periods: &[f64], values: &[f64], period: f64) -> f64 {
    let x = period.clamp(periods[0], periods[periods.len() - 1]).log10();
    for i in 1..periods.len() {
        let (x0, x1) = (periods[i - 1].log10(), periods[i].log10());
        if x <= x1 {
            let f = (x - x0) / (x1 - x0);
            return values[i - 1] + f * (values[i] - values[i - 1]);
        }
    }
    values[values.len() - 1]
}

/// Intensity measure: type, optional period and component
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IM {
    /// IM type
    pub im_type: ImType,
    /// Spectral period in seconds (pSA only)
    pub period: Option<f64>,
    /// Horizontal component
    pub component: IMComponent,
}

impl IM {
    /// Non-spectral IM with the default component
    pub const fn new(im_type: ImType) -> Self {
        Self {
            im_type,
            period: None,
            component: IMComponent::RotD50,
        }
    }

    /// Spectral acceleration at `period` seconds
    pub const fn psa(period: f64) -> Self {
        Self {
            im_type: ImType::PSA,
            period: Some(period),
            component: IMComponent::RotD50,
        }
    }

    /// Same IM with a different component
    pub const fn with_component(mut self, component: IMComponent) -> Self {
        self.component = component;
        self
    }

    /// Parse an IM name (`PGA`, `pSA_1.0`, `pSA_1.0_RotD100`)
    pub fn from_str_checked(s: &str) -> Result<Self> {
        s.parse()
    }

    /// Whether this IM is PGA or pSA
    pub fn is_spectral(&self) -> bool {
        matches!(self.im_type, ImType::PGA | ImType::PSA)
    }

    /// Period used for spectral correlation / component ratios
    pub fn spectral_period(&self) -> Option<f64> {
        match self.im_type {
            ImType::PGA => Some(PGA_PERIOD),
            ImType::PSA => self.period,
            _ => None,
        }
    }

    /// Factor converting a value of this IM from component `from` to `self.component`
    pub fn component_conversion(&self, from: IMComponent) -> f64 {
        let period = self.spectral_period().unwrap_or(PGA_PERIOD);
        self.component.ratio_to_rotd50(period) / from.ratio_to_rotd50(period)
    }

    /// Name without the component suffix, e.g. `pSA_1.0`
    pub fn base_name(&self) -> String {
        match self.period {
            Some(period) => format!("{}_{:?}", self.im_type.as_str(), period),
            None => self.im_type.as_str().to_string(),
        }
    }

    /// Default IM range of the IM type
    pub fn default_range(&self) -> (f64, f64) {
        self.im_type.default_range()
    }
}

impl PartialEq for IM {
    fn eq(&self, other: &Self) -> bool {
        self.im_type == other.im_type
            && self.component == other.component
            && self.period.map(f64::to_bits) == other.period.map(f64::to_bits)
    }
}

impl Eq for IM {}

impl Hash for IM {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.im_type.hash(state);
        self.period.map(f64::to_bits).hash(state);
        self.component.hash(state);
    }
}

impl fmt::Display for IM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            IMComponent::RotD50 => write!(f, "{}", self.base_name()),
            other => write!(f, "{}_{}", self.base_name(), other.as_str()),
        }
    }
}

impl FromStr for IM {
    type Err = PshaError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('_');
        let im_type: ImType = parts
            .next()
            .ok_or_else(|| PshaError::UnsupportedIm(s.to_string()))?
            .parse()?;

        let mut period = None;
        let mut component = IMComponent::RotD50;
        if im_type == ImType::PSA {
            let p = parts
                .next()
                .and_then(|p| p.parse::<f64>().ok())
                .filter(|p| *p > 0.0)
                .ok_or_else(|| PshaError::UnsupportedIm(s.to_string()))?;
            period = Some(p);
        }
        if let Some(c) = parts.next() {
            component = c.parse()?;
        }
        if parts.next().is_some() {
            return Err(PshaError::UnsupportedIm(s.to_string()));
        }

        Ok(Self {
            im_type,
            period,
            component,
        })
    }
}

impl From<IM> for String {
    fn from(im: IM) -> String {
        im.to_string()
    }
}

impl TryFrom<String> for IM {
    type Error = PshaError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_im_string_round_trip() {
        for name in ["PGA", "PGV", "pSA_1.0", "pSA_0.5", "pSA_10.0_RotD100", "CAV", "Ds595"] {
            let im: IM = name.parse().unwrap();
            assert_eq!(im.to_string(), name);
        }
    }

    #[test]
    fn test_invalid_im_names() {
        assert!("SA_1.0".parse::<IM>().is_err());
        assert!("pSA".parse::<IM>().is_err());
        assert!("pSA_-1.0".parse::<IM>().is_err());
        assert!("PGA_RotD9".parse::<IM>().is_err());
    }

    #[test]
    fn test_im_as_hash_key() {
        let mut map = FxHashMap::default();
        map.insert(IM::psa(1.0), 1);
        map.insert(IM::new(ImType::PGA), 2);
        assert_eq!(map.get(&"pSA_1.0".parse::<IM>().unwrap()), Some(&1));
        assert_eq!(map.get(&IM::psa(1.0).with_component(IMComponent::RotD100)), None);
    }

    #[test]
    fn test_component_ratios() {
        assert_eq!(IMComponent::RotD50.ratio_to_rotd50(1.0), 1.0);
        assert!((IMComponent::RotD100.ratio_to_rotd50(1.0) - 1.24).abs() < 1e-12);
        // Interpolated between 0.2 s (1.21) and 0.5 s (1.23)
        let mid = IMComponent::RotD100.ratio_to_rotd50(0.3);
        assert!(mid > 1.21 && mid < 1.23);
        // Clamped outside the table
        assert!((IMComponent::RotD100.ratio_to_rotd50(20.0) - 1.25).abs() < 1e-12);

        let im = IM::psa(1.0).with_component(IMComponent::RotD100);
        assert!((im.component_conversion(IMComponent::RotD50) - 1.24).abs() < 1e-12);
        assert!((im.component_conversion(IMComponent::RotD100) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_serde_uses_im_name() {
        let json = serde_json::to_string(&IM::psa(0.5)).unwrap();
        assert_eq!(json, "\"pSA_0.5\"");
        let back: IM = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IM::psa(0.5));
    }
}
