//! # Design
//!
//! - Keep error messages constant; store transformer, exit code and stderr in fields.
//! - Timeouts are a distinct variant, never folded into a non-zero exit.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for executor operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Failures while running an external transformer.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to start transformer")]
    Spawn {
        /// Transformer being run.
        transformer: String,
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Waiting on the process failed.
    #[error("failed to wait for transformer")]
    Wait {
        /// Transformer being run.
        transformer: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The process outlived its time limit and was killed.
    #[error("transformer exceeded time limit")]
    TimedOut {
        /// Transformer being run.
        transformer: String,
        /// Applied limit in milliseconds.
        timeout_ms: u64,
    },
    /// The process exited with a non-zero code.
    #[error("transformer exit code was not 0")]
    NonZeroExit {
        /// Transformer being run.
        transformer: String,
        /// Reported exit code.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },
    /// The process was terminated by a signal.
    #[error("transformer terminated abnormally")]
    Terminated {
        /// Transformer being run.
        transformer: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The process exited cleanly without producing its target file.
    #[error("transformer produced no target file")]
    MissingTarget {
        /// Transformer being run.
        transformer: String,
        /// Expected target path.
        path: PathBuf,
    },
}

impl ExecError {
    /// Transformer the failure belongs to.
    #[must_use]
    pub fn transformer(&self) -> &str {
        match self {
            Self::Spawn { transformer, .. }
            | Self::Wait { transformer, .. }
            | Self::TimedOut { transformer, .. }
            | Self::NonZeroExit { transformer, .. }
            | Self::Terminated { transformer, .. }
            | Self::MissingTarget { transformer, .. } => transformer,
        }
    }
}
