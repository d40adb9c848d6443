//! Greedy misfit-based ground-motion selection
//!
//! Each realisation is matched, in order, by the remaining candidate with the
//! smallest weighted log misfit
//!
//! ```text
//! misfit = sum_i w_i * (ln t_i - ln(sf^alpha_i * im_i))^2
//! ```
//!
//! where `sf` scales the candidate's conditioning IM onto im_j and `alpha_i` is the
//! IM type's amplitude scaling exponent. Scaled selection needs an amplitude IM as
//! im_j; durations do not change under scaling. A selected candidate leaves the pool, and a
//! candidate whose scale factor falls outside the allowed range is never chosen.

use super::causal::CausalParamBounds;
use super::dataset::GMRecord;
use super::realisations::Realisations;
use crate::core_types::IM;
use crate::error::{PshaError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A selected ground motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedGroundMotion {
    /// Record id
    pub record_id: String,
    /// Amplitude scale factor (1 when unscaled)
    pub scale_factor: f64,
    /// Misfit against the matched realisation
    pub misfit: f64,
    /// Index of the matched realisation
    pub realisation_index: usize,
    /// Magnitude
    pub magnitude: f64,
    /// Rupture distance (km)
    pub rrup: f64,
    /// Vs30 (m/s)
    pub vs30: f64,
    /// Scaled IM values in target-IM order
    pub im_values: Vec<f64>,
}

/// Settings of the selection step
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSettings<'a> {
    /// Target IMs, in realisation column order
    pub ims: &'a [IM],
    /// Conditioning IM
    pub im_j: IM,
    /// Conditioning IM level
    pub im_j_value: f64,
    /// Normalised misfit weight per target IM
    pub im_weights: &'a [f64],
    /// Whether candidates are amplitude scaled onto im_j
    pub scale: bool,
}

struct Candidate<'a> {
    record: &'a GMRecord,
    sf: f64,
    ln_scaled: Vec<f64>,
}

/// Candidates satisfying the causal bounds and carrying every IM needed
pub fn filter_candidates<'a>(
    records: &'a [GMRecord],
    bounds: &CausalParamBounds,
    ims: &[IM],
    im_j: &IM,
    needs_im_j: bool,
) -> Vec<&'a GMRecord> {
    records
        .iter()
        .filter(|r| bounds.contains(r))
        .filter(|r| ims.iter().all(|im| r.im_value(im).is_some_and(|v| v > 0.0)))
        .filter(|r| !needs_im_j || r.im_value(im_j).is_some_and(|v| v > 0.0))
        .collect()
}

/// Match realisations with candidate ground motions
///
/// Returns the selected set ranked by ascending misfit. Fewer than one motion per
/// realisation is returned (with a warning) when the pool runs out.
pub fn select_ground_motions(
    realisations: &Realisations,
    candidates: &[&GMRecord],
    bounds: &CausalParamBounds,
    settings: &SelectionSettings<'_>,
) -> Result<Vec<SelectedGroundMotion>> {
    let alpha_j = settings.im_j.im_type.scaling_exponent();
    if settings.scale && alpha_j == 0.0 {
        return Err(PshaError::InvalidParameter(format!(
            "{} does not scale with amplitude and cannot anchor scaled selection",
            settings.im_j
        )));
    }
    let alphas: Vec<f64> = settings
        .ims
        .iter()
        .map(|im| im.im_type.scaling_exponent())
        .collect();

    let mut pool: Vec<Candidate<'_>> = candidates
        .iter()
        .filter_map(|&record| {
            let sf = if settings.scale {
                (settings.im_j_value / record.im_value(&settings.im_j)?).powf(1.0 / alpha_j)
            } else {
                1.0
            };
            if !(sf.is_finite() && sf > 0.0 && bounds.allows_scale_factor(sf)) {
                return None;
            }
            let ln_scaled = settings
                .ims
                .iter()
                .zip(&alphas)
                .map(|(im, alpha)| record.im_value(im).map(|v| alpha * sf.ln() + v.ln()))
                .collect::<Option<Vec<f64>>>()?;
            Some(Candidate {
                record,
                sf,
                ln_scaled,
            })
        })
        .collect();
    if pool.is_empty() {
        return Err(PshaError::NoCandidates {
            context: "no candidate ground motion satisfies the causal and scale-factor bounds"
                .to_string(),
        });
    }

    let mut selected = Vec::with_capacity(realisations.len());
    for s in 0..realisations.len() {
        let ln_target: Vec<f64> = (0..settings.ims.len())
            .map(|i| realisations.values()[(s, i)].ln())
            .collect();
        let best = pool
            .iter()
            .enumerate()
            .map(|(k, c)| (k, misfit(&ln_target, &c.ln_scaled, settings.im_weights)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((k, misfit)) = best else {
            warn!(
                "Candidate pool exhausted after {} of {} realisations",
                selected.len(),
                realisations.len()
            );
            break;
        };
        let chosen = pool.swap_remove(k);
        selected.push(SelectedGroundMotion {
            record_id: chosen.record.id.clone(),
            scale_factor: chosen.sf,
            misfit,
            realisation_index: s,
            magnitude: chosen.record.magnitude,
            rrup: chosen.record.rrup,
            vs30: chosen.record.vs30,
            im_values: chosen.ln_scaled.iter().map(|v| v.exp()).collect(),
        });
    }

    selected.sort_by(|a, b| a.misfit.total_cmp(&b.misfit));
    Ok(selected)
}

fn misfit(ln_target: &[f64], ln_candidate: &[f64], weights: &[f64]) -> f64 {
    ln_target
        .iter()
        .zip(ln_candidate)
        .zip(weights)
        .map(|((t, c), w)| w * (t - c).powi(2))
        .sum()
}

/// Normalised misfit weights; uniform when none are given
pub fn normalise_im_weights(n_ims: usize, weights: Option<&[f64]>) -> Result<Vec<f64>> {
    let weights = match weights {
        Some(w) if w.len() != n_ims => {
            return Err(PshaError::InvalidParameter(format!(
                "{} IM weights for {} target IMs",
                w.len(),
                n_ims
            )))
        }
        Some(w) => w.to_vec(),
        None => vec![1.0; n_ims],
    };
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || weights.iter().any(|w| *w < 0.0) {
        return Err(PshaError::InvalidWeights {
            context: "GMS IM weights".to_string(),
            sum: total,
        });
    }
    Ok(weights.into_iter().map(|w| w / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::ImType;
    use crate::gms::causal::ParamRange;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use rustc_hash::FxHashMap;

    fn record(id: &str, sa1: f64, sa02: f64) -> GMRecord {
        let mut im_values = FxHashMap::default();
        im_values.insert(IM::psa(1.0), sa1);
        im_values.insert(IM::psa(0.2), sa02);
        GMRecord {
            id: id.to_string(),
            magnitude: 6.5,
            rrup: 20.0,
            vs30: 400.0,
            im_values,
        }
    }

    fn bounds(sf: Option<ParamRange>) -> CausalParamBounds {
        CausalParamBounds {
            magnitude: ParamRange::new(6.0, 7.0),
            rrup: ParamRange::new(0.0, 50.0),
            vs30: ParamRange::new(300.0, 500.0),
            sf,
        }
    }

    #[test]
    fn test_unscaled_selection_picks_closest() {
        let ims = [IM::psa(0.2)];
        let realisations =
            Realisations::new(ims.to_vec(), DMatrix::from_row_slice(2, 1, &[0.5, 1.0]), vec![1.0; 2])
                .unwrap();
        let records = vec![record("a", 0.2, 0.45), record("b", 0.2, 1.1), record("c", 0.2, 3.0)];
        let candidates: Vec<&GMRecord> = records.iter().collect();
        let weights = normalise_im_weights(1, None).unwrap();
        let settings = SelectionSettings {
            ims: &ims,
            im_j: IM::psa(1.0),
            im_j_value: 0.2,
            im_weights: &weights,
            scale: false,
        };
        let selected =
            select_ground_motions(&realisations, &candidates, &bounds(None), &settings).unwrap();
        assert_eq!(selected.len(), 2);
        let ids: Vec<&str> = selected.iter().map(|s| s.record_id.as_str()).collect();
        assert!(ids.contains(&"a") && ids.contains(&"b"));
        assert!(selected[0].misfit <= selected[1].misfit);
    }

    #[test]
    fn test_scale_factor_bounds_respected() {
        let ims = [IM::psa(0.2)];
        let realisations =
            Realisations::new(ims.to_vec(), DMatrix::from_row_slice(1, 1, &[1.0]), vec![1.0])
                .unwrap();
        // "far" would match perfectly after scaling by 10, outside [0.5, 2]
        let records = vec![record("far", 0.04, 0.1), record("near", 0.3, 0.8)];
        let candidates: Vec<&GMRecord> = records.iter().collect();
        let weights = normalise_im_weights(1, None).unwrap();
        let settings = SelectionSettings {
            ims: &ims,
            im_j: IM::psa(1.0),
            im_j_value: 0.4,
            im_weights: &weights,
            scale: true,
        };
        let selected = select_ground_motions(
            &realisations,
            &candidates,
            &bounds(Some(ParamRange::new(0.5, 2.0))),
            &settings,
        )
        .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record_id, "near");
        assert_relative_eq!(selected[0].scale_factor, 0.4 / 0.3, epsilon = 1e-12);
        assert_relative_eq!(selected[0].im_values[0], 0.8 * 0.4 / 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_pool_exhaustion_returns_partial_set() {
        let ims = [IM::psa(0.2)];
        let realisations =
            Realisations::new(ims.to_vec(), DMatrix::from_row_slice(3, 1, &[0.5, 1.0, 2.0]), vec![1.0; 3])
                .unwrap();
        let records = vec![record("a", 0.2, 0.45)];
        let candidates: Vec<&GMRecord> = records.iter().collect();
        let weights = normalise_im_weights(1, None).unwrap();
        let settings = SelectionSettings {
            ims: &ims,
            im_j: IM::psa(1.0),
            im_j_value: 0.2,
            im_weights: &weights,
            scale: false,
        };
        let selected =
            select_ground_motions(&realisations, &candidates, &bounds(None), &settings).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_duration_cannot_anchor_scaling() {
        let ims = [IM::psa(0.2)];
        let realisations =
            Realisations::new(ims.to_vec(), DMatrix::from_row_slice(1, 1, &[1.0]), vec![1.0])
                .unwrap();
        let mut records = vec![record("a", 0.2, 0.45)];
        records[0].im_values.insert(IM::new(ImType::Ds595), 12.0);
        let candidates: Vec<&GMRecord> = records.iter().collect();
        let weights = normalise_im_weights(1, None).unwrap();
        let settings = SelectionSettings {
            ims: &ims,
            im_j: IM::new(ImType::Ds595),
            im_j_value: 20.0,
            im_weights: &weights,
            scale: true,
        };
        let result = select_ground_motions(
            &realisations,
            &candidates,
            &bounds(Some(ParamRange::new(0.1, 10.0))),
            &settings,
        );
        assert!(matches!(result, Err(PshaError::InvalidParameter(_))));

        // Unscaled selection on a duration is fine
        let settings = SelectionSettings {
            scale: false,
            ..settings
        };
        let selected =
            select_ground_motions(&realisations, &candidates, &bounds(None), &settings).unwrap();
        assert_eq!(selected[0].scale_factor, 1.0);
    }

    #[test]
    fn test_arias_intensity_scale_factor_is_square_root() {
        let ims = [IM::psa(0.2)];
        let realisations =
            Realisations::new(ims.to_vec(), DMatrix::from_row_slice(1, 1, &[1.0]), vec![1.0])
                .unwrap();
        let mut records = vec![record("a", 0.2, 0.45)];
        records[0].im_values.insert(IM::new(ImType::AI), 0.5);
        let candidates: Vec<&GMRecord> = records.iter().collect();
        let weights = normalise_im_weights(1, None).unwrap();
        let settings = SelectionSettings {
            ims: &ims,
            im_j: IM::new(ImType::AI),
            im_j_value: 2.0,
            im_weights: &weights,
            scale: true,
        };
        let selected = select_ground_motions(
            &realisations,
            &candidates,
            &bounds(Some(ParamRange::new(0.1, 10.0))),
            &settings,
        )
        .unwrap();
        // AI grows with sf^2, so matching 4x the intensity takes sf = 2
        assert_relative_eq!(selected[0].scale_factor, 2.0, epsilon = 1e-12);
        assert_relative_eq!(selected[0].im_values[0], 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_im_weights() {
        assert_eq!(normalise_im_weights(2, Some(&[1.0, 3.0])).unwrap(), vec![0.25, 0.75]);
        assert!(normalise_im_weights(2, Some(&[1.0])).is_err());
        assert!(normalise_im_weights(1, Some(&[0.0])).is_err());
    }
}
