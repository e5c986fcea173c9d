//! Error types for the medsched_core library.

use crate::MedicationId;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medsched_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No active medication carries this id
    #[error("Medication {0} not found")]
    NotFound(MedicationId),

    /// Malformed input, rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store could not complete a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for failures raised by the persistence layer
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_) | Error::Json(_))
    }
}
