//! Candidate ground-motion datasets

use super::causal::CausalParamBounds;
use crate::core_types::{SiteInfo, IM};
use crate::error::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Metadata and IM values of one candidate ground motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GMRecord {
    /// Record id
    pub id: String,
    /// Causal magnitude
    pub magnitude: f64,
    /// Rupture distance (km)
    pub rrup: f64,
    /// Recording-site Vs30 (m/s)
    pub vs30: f64,
    /// Unscaled IM values
    pub im_values: FxHashMap<IM, f64>,
}

impl GMRecord {
    /// Unscaled value of an IM, if the record has it
    pub fn im_value(&self, im: &IM) -> Option<f64> {
        self.im_values.get(im).copied()
    }
}

/// Source of candidate ground motions for selection
pub trait GMDataset: Send + Sync {
    /// Dataset name
    fn name(&self) -> &str;

    /// Metadata of the dataset's records as seen from `site`, optionally restricted to `ids`
    fn metadata(&self, site: &SiteInfo, ids: Option<&[String]>) -> Result<Vec<GMRecord>>;

    /// Number of records inside the causal bounds (scale factor not considered)
    fn n_gms_in_bounds(&self, site: &SiteInfo, bounds: &CausalParamBounds) -> Result<usize> {
        Ok(self
            .metadata(site, None)?
            .iter()
            .filter(|r| bounds.contains(r))
            .count())
    }
}

/// Dataset held in memory, loadable from JSON
///
/// Record metadata does not depend on the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryGMDataset {
    name: String,
    records: Vec<GMRecord>,
}

impl InMemoryGMDataset {
    /// Wrap a list of records
    pub fn new(name: impl Into<String>, records: Vec<GMRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Load a dataset from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save the dataset as JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// All records
    pub fn records(&self) -> &[GMRecord] {
        &self.records
    }
}

impl GMDataset for InMemoryGMDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self, _site: &SiteInfo, ids: Option<&[String]>) -> Result<Vec<GMRecord>> {
        Ok(match ids {
            None => self.records.clone(),
            Some(ids) => self
                .records
                .iter()
                .filter(|r| ids.contains(&r.id))
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gms::causal::ParamRange;

    fn record(id: &str, magnitude: f64, rrup: f64) -> GMRecord {
        let mut im_values = FxHashMap::default();
        im_values.insert(IM::psa(1.0), 0.1);
        GMRecord {
            id: id.to_string(),
            magnitude,
            rrup,
            vs30: 400.0,
            im_values,
        }
    }

    #[test]
    fn test_metadata_filters_ids() {
        let ds = InMemoryGMDataset::new("test", vec![record("a", 6.0, 10.0), record("b", 7.0, 50.0)]);
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let ids = vec!["b".to_string()];
        let meta = ds.metadata(&site, Some(&ids)).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].id, "b");
        assert_eq!(meta[0].im_value(&IM::psa(1.0)), Some(0.1));
    }

    #[test]
    fn test_n_gms_in_bounds() {
        let ds = InMemoryGMDataset::new("test", vec![record("a", 6.0, 10.0), record("b", 7.0, 50.0)]);
        let site = SiteInfo::new("SITE", 0.0, 0.0, 400.0);
        let bounds = CausalParamBounds {
            magnitude: ParamRange::new(5.5, 6.5),
            rrup: ParamRange::new(0.0, 100.0),
            vs30: ParamRange::new(300.0, 500.0),
            sf: None,
        };
        assert_eq!(ds.n_gms_in_bounds(&site, &bounds).unwrap(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let ds = InMemoryGMDataset::new("test", vec![record("a", 6.0, 10.0)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        ds.to_json_file(&path).unwrap();
        assert_eq!(InMemoryGMDataset::from_json_file(&path).unwrap(), ds);
    }
}
