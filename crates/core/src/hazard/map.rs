//! Multi-site hazard at a fixed exceedance

use super::{run_ensemble_hazard, HazardConfig};
use crate::core_types::{SiteInfo, IM};
use crate::ensemble::Ensemble;
use crate::error::{PshaError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// IM level per site at one exceedance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardMapResult {
    /// IM
    pub im: IM,
    /// Annual exceedance probability
    pub exceedance: f64,
    /// Station names, in input order
    pub stations: Vec<String>,
    /// IM level per station (NaN where the curve does not reach the exceedance)
    #[serde(with = "crate::float_serde::vec")]
    pub values: Vec<f64>,
}

/// Ensemble hazard inverted at `exceedance` for every site, in parallel
///
/// A site whose curve does not span the exceedance reports NaN; any other failure
/// aborts the whole map.
pub fn hazard_map(
    ensemble: &Ensemble,
    sites: &[SiteInfo],
    im: &IM,
    exceedance: f64,
    config: &HazardConfig,
) -> Result<HazardMapResult> {
    ensemble.check_im(im)?;

    let values = sites
        .par_iter()
        .map(|site| {
            let hazard = run_ensemble_hazard(ensemble, site, im, config, None)?;
            match hazard.exceedance_to_im(exceedance) {
                Ok(value) => Ok(value),
                Err(PshaError::ExceedanceOutOfRange { .. }) => {
                    warn!(
                        "Exceedance {:e} out of range at {}, reporting NaN",
                        exceedance, site.station_name
                    );
                    Ok(f64::NAN)
                }
                Err(e) => Err(e),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Hazard map for {} at exceedance {:e}: {} sites",
        im,
        exceedance,
        sites.len()
    );
    Ok(HazardMapResult {
        im: *im,
        exceedance,
        stations: sites.iter().map(|s| s.station_name.clone()).collect(),
        values,
    })
}
