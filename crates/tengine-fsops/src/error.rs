//! # Design
//!
//! - Provide structured, constant-message errors for temp-file and store operations.
//! - Messages for caller-attributable failures are safe to surface verbatim.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the file lifecycle manager and the shared store.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The caller-supplied filename had no usable final segment.
    #[error("source filename was not supplied")]
    InvalidFilename {
        /// Raw value as received.
        value: Option<String>,
    },
    /// `create` was invoked on a handle that already owns content.
    #[error("temp file handle created twice")]
    CreateCalledTwice {
        /// Path owned by the handle.
        path: PathBuf,
    },
    /// A store-backed request omitted its source reference.
    #[error("source reference not supplied")]
    MissingReference,
    /// A store reference was malformed.
    #[error("source reference is invalid")]
    InvalidReference {
        /// Offending reference.
        reference: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// A store reference does not name stored content.
    #[error("source reference not found")]
    ReferenceNotFound {
        /// Unknown reference.
        reference: String,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is attributable to the caller's input rather than the engine.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilename { .. }
                | Self::MissingReference
                | Self::InvalidReference { .. }
                | Self::ReferenceNotFound { .. }
        )
    }
}
