//! Probabilistic Seismic Hazard Analysis Core Library
//!
//! Combines an ensemble of ground-motion branches (empirical models and physics-based
//! simulations) into site-specific hazard products:
//! - weighted ensemble hazard curves with branch percentiles, and hazard maps
//! - rupture disaggregation with epsilon, summary statistics and M / Rrup / epsilon grids
//! - uniform hazard spectra
//! - GCIM-based ground-motion selection with causal-parameter pre-filtering
//! - scenario spectra for a single rupture
//! - Bayless & Somerville (2020) rupture directivity averaged over sampled hypocentres
//!
//! Independent units of work (branches, sites, IMs, hypocentres) run in parallel with
//! rayon. Ensemble data is immutable once loaded and shared read-only.

// Core types and utilities
pub mod core_types;
pub mod error;
pub mod stats;

// Ensemble data
pub mod ensemble;

// Calculations
pub mod directivity;
pub mod disagg;
pub mod gms;
pub mod hazard;
pub mod scenario;
pub mod uhs;

// Configuration and storage
pub mod config;
pub mod persistence;

mod float_serde;

// Re-export core types
pub use core_types::{HazardQuery, IMComponent, ImType, Rupture, RuptureId, RuptureSet, SiteInfo, IM};
pub use error::{PshaError, Result};

// Re-export ensemble types
pub use ensemble::{Branch, Ensemble, GroundMotionData, IMEnsemble};

// Re-export calculation entry points
pub use directivity::{compute_directivity, run_directivity, DirectivityResult, FaultSource};
pub use disagg::{run_ensemble_disagg, DisaggGridData, EnsembleDisaggResult};
pub use gms::{run_gms, GmsCache, GmsConfig, GmsRequest, GmsResult};
pub use hazard::{hazard_map, run_ensemble_hazard, EnsembleHazardResult, HazardConfig};
pub use scenario::{run_scenario, ScenarioResult};
pub use uhs::{run_uhs, UhsResult};

pub use config::CalculationConfig;
pub use persistence::ResultStore;
