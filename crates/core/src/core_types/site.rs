//! Site description

use serde::{Deserialize, Serialize};

/// Immutable description of a hazard site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Station name, used to look up per-site branch data
    pub station_name: String,
    /// Latitude (degrees)
    pub lat: f64,
    /// Longitude (degrees)
    pub lon: f64,
    /// Vs30 from the site database (m/s)
    pub db_vs30: f64,
    /// User-specified Vs30 overriding the database value (m/s)
    pub user_vs30: Option<f64>,
    /// Depth to Vs = 1.0 km/s (m)
    pub z1p0: Option<f64>,
    /// Depth to Vs = 2.5 km/s (km)
    pub z2p5: Option<f64>,
}

impl SiteInfo {
    /// Create a site with a database Vs30 and no basin depths
    pub fn new(station_name: impl Into<String>, lat: f64, lon: f64, vs30: f64) -> Self {
        Self {
            station_name: station_name.into(),
            lat,
            lon,
            db_vs30: vs30,
            user_vs30: None,
            z1p0: None,
            z2p5: None,
        }
    }

    /// Same site with a user Vs30 override
    pub fn with_user_vs30(mut self, vs30: f64) -> Self {
        self.user_vs30 = Some(vs30);
        self
    }

    /// Vs30 used in calculations (user override wins)
    pub fn effective_vs30(&self) -> f64 {
        self.user_vs30.unwrap_or(self.db_vs30)
    }
}
