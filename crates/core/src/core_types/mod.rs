//! Core value types shared by every calculation

pub mod im;
pub mod query;
pub mod rupture;
pub mod site;

pub use im::{IMComponent, ImType, IM, PGA_PERIOD};
pub use query::HazardQuery;
pub use rupture::{Rupture, RuptureId, RuptureSet, SourceKind, TectonicType};
pub use site::SiteInfo;
