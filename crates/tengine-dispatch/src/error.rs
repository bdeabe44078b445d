//! # Design
//!
//! - Errors raised while wiring the dispatch core, never while serving a request.
//! - Request failures are expressed as replies through [`crate::TransformFailure`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for dispatch construction.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while constructing dispatch components.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The probe fixture could not be read.
    #[error("failed to read probe fixture")]
    ProbeFixture {
        /// Fixture path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}
