//! Site configuration errors.

use std::path::PathBuf;

use crate::common::ErrorSeverity;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file or directory could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for a location
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// Path being parsed
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A field holds a value the server cannot run with
    #[error("Invalid {field} in location {location}: {reason}")]
    Invalid {
        /// Location name
        location: String,
        /// Offending field
        field: String,
        /// Reason
        reason: String,
    },

    /// Two files define the same location name
    #[error("Duplicate location name {0}")]
    DuplicateLocation(String),
}

impl ConfigError {
    /// Get the error severity. The daemon refuses to start on any of these.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }

    /// A read can succeed once the file system settles; a bad file cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConfigError::Io { .. })
    }

    /// Create a validation error.
    pub fn invalid(
        location: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Invalid {
            location: location.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}
