//! Error types for rule tree operations.

use thiserror::Error;

/// Errors raised while building or importing rule trees.
#[derive(Debug, Error)]
pub enum Error {
    /// A rule document (or section) was expected to be a mapping
    #[error("expected a mapping, found {found}")]
    NotAMapping {
        /// Kind of value actually found
        found: &'static str,
    },

    /// A section of an rq document could not be imported
    #[error("invalid rq section '{key}': {message}")]
    InvalidSection {
        /// Path of the offending key
        key: String,
        /// What was wrong with it
        message: String,
    },
}

/// Result type for rule tree operations.
pub type Result<T> = std::result::Result<T, Error>;
