//! Calculation configuration
//!
//! Every tunable group has documented defaults, so a configuration file only needs
//! to list what it changes:
//!
//! ```json
//! { "gms": { "n_gms": 40 }, "hypocentre": { "method": { "kind": "monte_carlo", "n": 200 } } }
//! ```

use crate::directivity::HypocentreConfig;
use crate::disagg::DisaggGridConfig;
use crate::error::{PshaError, Result};
use crate::gms::{CausalParamConfig, GmsConfig};
use crate::hazard::HazardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings of every calculation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationConfig {
    /// Hazard curves and percentiles
    pub hazard: HazardConfig,
    /// Disaggregation grid binning
    pub disagg_grid: DisaggGridConfig,
    /// Ground-motion selection
    pub gms: GmsConfig,
    /// Default causal bounds
    pub causal: CausalParamConfig,
    /// Directivity hypocentre sampling
    pub hypocentre: HypocentreConfig,
}

impl CalculationConfig {
    /// Load from a JSON file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or a value is out of range
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject values no calculation can run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PshaError::InvalidParameter(msg));
        if self.hazard.n_im_values < 2 {
            return invalid(format!(
                "hazard IM grid needs at least 2 values, got {}",
                self.hazard.n_im_values
            ));
        }
        if let Some(p) = self
            .hazard
            .percentiles
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return invalid(format!("percentile {p} is outside [0, 1]"));
        }
        if !(self.disagg_grid.mag_bin_size > 0.0 && self.disagg_grid.rrup_bin_size > 0.0) {
            return invalid("disaggregation bin sizes must be positive".to_string());
        }
        if self.gms.n_gms == 0 || self.gms.n_replica == 0 {
            return invalid("GMS needs at least one ground motion and one replica".to_string());
        }
        if !(self.gms.ks_alpha > 0.0 && self.gms.ks_alpha < 1.0) {
            return invalid(format!("KS alpha {} is outside (0, 1)", self.gms.ks_alpha));
        }
        if self.hypocentre.method.n_hypo() == 0 {
            return invalid("at least one hypocentre has to be sampled".to_string());
        }
        Ok(())
    }
}
