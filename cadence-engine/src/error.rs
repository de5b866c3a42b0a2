//! Error types for cadence-engine
//!
//! Only setup and boundary operations are fallible. The control loop and the
//! enrichment workers never return errors to their callers; faults there are
//! logged and turned into state transitions.

use thiserror::Error;

/// Main error type for cadence-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared crate (config, JSON, TOML)
    #[error(transparent)]
    Common(#[from] cadence_common::Error),

    /// Session could not be created or driven
    #[error("Session error: {0}")]
    Session(String),

    /// Enrichment step failed (logged, never surfaced past the worker)
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Insertions are refused once shutdown has begun
    #[error("Shutting down: {0}")]
    ShuttingDown(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Entry or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Common(cadence_common::Error::Json(e))
    }
}

/// Convenience Result type using cadence-engine Error
pub type Result<T> = std::result::Result<T, Error>;
