//! Directory-based result store
//!
//! Results are written as pretty JSON under
//!
//! ```text
//! {root}/{kind}/{station}/{im}[_{excd|im}_{value}].json
//! ```
//!
//! GMS results are not reproducible from their inputs and are stored under their
//! UUID only (`{root}/gms/{uuid}.json`).

use crate::core_types::{HazardQuery, IM};
use crate::directivity::DirectivityResult;
use crate::disagg::EnsembleDisaggResult;
use crate::error::Result;
use crate::gms::GmsResult;
use crate::hazard::EnsembleHazardResult;
use crate::uhs::UhsResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Result category, one sub-directory each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Ensemble hazard curves
    Hazard,
    /// Ensemble disaggregation
    Disagg,
    /// Uniform hazard spectra
    Uhs,
    /// Ground-motion selection
    Gms,
    /// Directivity grids
    Directivity,
}

impl ResultKind {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Hazard => "hazard",
            Self::Disagg => "disagg",
            Self::Uhs => "uhs",
            Self::Gms => "gms",
            Self::Directivity => "directivity",
        }
    }
}

fn sanitise(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    // A name made only of dots would resolve to the current or a parent directory
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_") + "_"
    } else {
        cleaned
    }
}

/// JSON result store rooted at a directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Store rooted at `root`; directories are created on first write
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a station-keyed result
    pub fn result_path(
        &self,
        kind: ResultKind,
        station: &str,
        name: &str,
        query: Option<&HazardQuery>,
    ) -> PathBuf {
        let file = match query {
            Some(q) => format!("{}_{}.json", sanitise(name), q.file_token()),
            None => format!("{}.json", sanitise(name)),
        };
        self.root
            .join(kind.dir_name())
            .join(sanitise(station))
            .join(file)
    }

    fn write<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        debug!("Saved {}", path.display());
        Ok(path)
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Save an ensemble hazard result
    pub fn save_hazard(&self, result: &EnsembleHazardResult) -> Result<PathBuf> {
        let path = self.result_path(ResultKind::Hazard, &result.station, &result.im.to_string(), None);
        self.write(path, result)
    }

    /// Load an ensemble hazard result, `None` when not stored
    pub fn load_hazard(&self, station: &str, im: &IM) -> Result<Option<EnsembleHazardResult>> {
        self.read(&self.result_path(ResultKind::Hazard, station, &im.to_string(), None))
    }

    /// Save an ensemble disaggregation
    pub fn save_disagg(&self, result: &EnsembleDisaggResult) -> Result<PathBuf> {
        let path = self.result_path(
            ResultKind::Disagg,
            &result.station,
            &result.im.to_string(),
            Some(&result.query),
        );
        self.write(path, result)
    }

    /// Load an ensemble disaggregation, `None` when not stored
    pub fn load_disagg(
        &self,
        station: &str,
        im: &IM,
        query: &HazardQuery,
    ) -> Result<Option<EnsembleDisaggResult>> {
        self.read(&self.result_path(ResultKind::Disagg, station, &im.to_string(), Some(query)))
    }

    /// Save a uniform hazard spectrum
    pub fn save_uhs(&self, result: &UhsResult) -> Result<PathBuf> {
        let query = HazardQuery::Exceedance(result.exceedance);
        let path = self.result_path(ResultKind::Uhs, &result.station, "uhs", Some(&query));
        self.write(path, result)
    }

    /// Load a uniform hazard spectrum, `None` when not stored
    pub fn load_uhs(&self, station: &str, exceedance: f64) -> Result<Option<UhsResult>> {
        let query = HazardQuery::Exceedance(exceedance);
        self.read(&self.result_path(ResultKind::Uhs, station, "uhs", Some(&query)))
    }

    fn gms_path(&self, id: &Uuid) -> PathBuf {
        self.root
            .join(ResultKind::Gms.dir_name())
            .join(format!("{id}.json"))
    }

    /// Save a GMS result under its id
    pub fn save_gms(&self, result: &GmsResult) -> Result<PathBuf> {
        self.write(self.gms_path(&result.id), result)
    }

    /// Load a GMS result by id, `None` when not stored
    pub fn load_gms(&self, id: &Uuid) -> Result<Option<GmsResult>> {
        self.read(&self.gms_path(id))
    }

    /// Save a directivity result for a named source
    pub fn save_directivity(&self, source_name: &str, result: &DirectivityResult) -> Result<PathBuf> {
        let path = self
            .root
            .join(ResultKind::Directivity.dir_name())
            .join(format!("{}.json", sanitise(source_name)));
        self.write(path, result)
    }

    /// Load a directivity result, `None` when not stored
    pub fn load_directivity(&self, source_name: &str) -> Result<Option<DirectivityResult>> {
        let path = self
            .root
            .join(ResultKind::Directivity.dir_name())
            .join(format!("{}.json", sanitise(source_name)));
        self.read(&path)
    }
}
