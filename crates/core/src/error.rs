//! Error taxonomy for hazard, disaggregation, UHS, GMS and directivity calculations
//!
//! Every fallible operation in the crate returns [`Result`]. Numeric guards that are
//! part of a published model's validity range (magnitude clamps, distance floors,
//! scaling caps) are applied silently and never surface here.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the PSHA engine
#[derive(Debug, Error)]
pub enum PshaError {
    /// Requested exceedance lies outside the monotonic range of the hazard curve
    #[error("exceedance {exceedance:e} is outside the hazard curve range [{min:e}, {max:e}]")]
    ExceedanceOutOfRange {
        /// Requested annual exceedance probability
        exceedance: f64,
        /// Smallest positive exceedance on the curve
        min: f64,
        /// Largest exceedance on the curve
        max: f64,
    },

    /// Requested IM level lies outside the IM grid of the hazard curve
    #[error("IM value {im_value} is outside the hazard curve IM range [{min}, {max}]")]
    ImOutOfRange {
        /// Requested IM level
        im_value: f64,
        /// Smallest IM level on the curve
        min: f64,
        /// Largest IM level on the curve
        max: f64,
    },

    /// The ensemble has no branches for the requested IM
    #[error("IM {0} is not supported by this ensemble")]
    UnsupportedIm(String),

    /// Neither an exceedance nor an IM level was supplied
    #[error("either an exceedance or an IM level has to be specified")]
    MissingHazardQuery,

    /// Both an exceedance and an IM level were supplied
    #[error("only one of exceedance or IM level can be specified")]
    AmbiguousHazardQuery,

    /// Weights that must sum to one do not
    #[error("weights of {context} sum to {sum}, expected 1")]
    InvalidWeights {
        /// What the weights belong to
        context: String,
        /// Actual weight sum
        sum: f64,
    },

    /// Ground-motion data and rupture table have different rupture ids
    #[error("rupture keys do not line up for {context}: {missing} unmatched id(s)")]
    MismatchedRuptureKeys {
        /// Branch / IM the join was made for
        context: String,
        /// Number of ids present on one side only
        missing: usize,
    },

    /// A branch has no data for the requested station
    #[error("branch {branch} has no data for station {station}")]
    MissingSiteData {
        /// Branch name
        branch: String,
        /// Station name
        station: String,
    },

    /// A branch has no ground-motion data for the requested IM
    #[error("branch {branch} has no ground-motion data for IM {im}")]
    MissingImData {
        /// Branch name
        branch: String,
        /// IM string
        im: String,
    },

    /// Nothing left to work with after filtering / kernel weighting
    #[error("no candidates available: {context}")]
    NoCandidates {
        /// Where the candidate set ran dry
        context: String,
    },

    /// Correlation matrix could not be repaired to a positive-definite matrix
    #[error("correlation matrix is not positive definite and could not be repaired")]
    CorrelationNotPositiveDefinite,

    /// Parameter outside its valid domain
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// GMS cache has no entry for the key (never stored or already taken)
    #[error("no cached GMS result for key {0}")]
    CacheMiss(Uuid),

    /// File system failure during persistence
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation failure during persistence or loading
    #[error("serialisation failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, PshaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceedance_message_mentions_range() {
        let err = PshaError::ExceedanceOutOfRange {
            exceedance: 1e-9,
            min: 1e-6,
            max: 0.1,
        };
        let msg = err.to_string();
        assert!(msg.contains("1e-9"), "{msg}");
        assert!(msg.contains("outside"), "{msg}");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PshaError = io.into();
        assert!(matches!(err, PshaError::Io(_)));
    }
}
