//! Error types for calcol-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in calcol-core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Text that is neither a `YYYY-MM-DD` date nor an RFC 3339 timestamp
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Unknown declared type name
    #[error("Unknown column type: {0}")]
    UnknownDeclaredType(String),
}
