//! Rupture identity and per-branch rupture tables

use crate::error::{PshaError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rupture identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuptureId(String);

impl RuptureId {
    /// Wrap a rupture name
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Rupture name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RuptureId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RuptureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Source model a rupture comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Finite fault source
    Fault,
    /// Distributed (background) seismicity
    Distributed,
}

/// Tectonic classification of a rupture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TectonicType {
    /// Active shallow crust
    ActiveShallow,
    /// Subduction interface
    SubductionInterface,
    /// Subduction intraslab
    SubductionSlab,
    /// Volcanic
    Volcanic,
}

/// A single rupture of a branch's rupture table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rupture {
    /// Identity
    pub id: RuptureId,
    /// Annual recurrence probability
    pub annual_rec_prob: f64,
    /// Moment magnitude
    pub magnitude: f64,
    /// Tectonic type
    pub tectonic_type: TectonicType,
    /// Source kind
    pub source: SourceKind,
}

impl Rupture {
    /// Create a rupture
    pub fn new(
        id: impl Into<String>,
        annual_rec_prob: f64,
        magnitude: f64,
        tectonic_type: TectonicType,
        source: SourceKind,
    ) -> Self {
        Self {
            id: RuptureId::new(id),
            annual_rec_prob,
            magnitude,
            tectonic_type,
            source,
        }
    }

    /// Recurrence interval in years
    pub fn recurrence_interval(&self) -> f64 {
        1.0 / self.annual_rec_prob
    }
}

/// Ordered, id-indexed, immutable rupture table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Rupture>", into = "Vec<Rupture>")]
pub struct RuptureSet {
    ruptures: Vec<Rupture>,
    index: FxHashMap<RuptureId, usize>,
}

impl RuptureSet {
    /// Build a rupture table, rejecting duplicate ids and invalid recurrence probabilities
    pub fn new(ruptures: Vec<Rupture>) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (i, rupture) in ruptures.iter().enumerate() {
            if !(rupture.annual_rec_prob >= 0.0 && rupture.annual_rec_prob.is_finite()) {
                return Err(PshaError::InvalidParameter(format!(
                    "rupture {} has invalid annual recurrence probability {}",
                    rupture.id, rupture.annual_rec_prob
                )));
            }
            if index.insert(rupture.id.clone(), i).is_some() {
                return Err(PshaError::InvalidParameter(format!(
                    "duplicate rupture id {}",
                    rupture.id
                )));
            }
        }
        Ok(Self { ruptures, index })
    }

    /// Ruptures in table order
    pub fn iter(&self) -> impl Iterator<Item = &Rupture> {
        self.ruptures.iter()
    }

    /// Number of ruptures
    pub fn len(&self) -> usize {
        self.ruptures.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.ruptures.is_empty()
    }

    /// Look up a rupture by id
    pub fn get(&self, id: &RuptureId) -> Option<&Rupture> {
        self.index.get(id).map(|&i| &self.ruptures[i])
    }

    /// Position of a rupture in table order
    pub fn position(&self, id: &RuptureId) -> Option<usize> {
        self.index.get(id).copied()
    }
}

impl TryFrom<Vec<Rupture>> for RuptureSet {
    type Error = PshaError;

    fn try_from(ruptures: Vec<Rupture>) -> Result<Self> {
        Self::new(ruptures)
    }
}

impl From<RuptureSet> for Vec<Rupture> {
    fn from(set: RuptureSet) -> Self {
        set.ruptures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rupture(id: &str, rate: f64) -> Rupture {
        Rupture::new(id, rate, 6.5, TectonicType::ActiveShallow, SourceKind::Fault)
    }

    #[test]
    fn test_lookup_by_id() {
        let set = RuptureSet::new(vec![rupture("a", 0.01), rupture("b", 0.002)]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&RuptureId::from("b")).unwrap().annual_rec_prob, 0.002);
        assert_eq!(set.position(&RuptureId::from("a")), Some(0));
        assert!(set.get(&RuptureId::from("c")).is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(RuptureSet::new(vec![rupture("a", 0.01), rupture("a", 0.02)]).is_err());
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(RuptureSet::new(vec![rupture("a", -0.01)]).is_err());
    }
}
