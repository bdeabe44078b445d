//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use tengine_core::CoreError;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment configuration was missing.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },
    /// Reading the descriptor failed.
    #[error("failed to read engine descriptor")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Descriptor path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The descriptor was not valid JSON for the expected shape.
    #[error("failed to parse engine descriptor")]
    Parse {
        /// Descriptor path when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Transform definitions did not form a valid capability index.
    #[error("invalid transformer definitions")]
    Capability {
        /// Underlying registry error.
        source: CoreError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value,
            reason,
        }
    }
}
