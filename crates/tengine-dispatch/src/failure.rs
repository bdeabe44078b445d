//! Mapping of every internal failure onto a reply status and one-line reason.
//!
//! Non-zero transformer exits are treated as content problems (400). Only conditions
//! showing the engine itself misbehaved (kill by signal, no output, spawn or IO
//! failure, timeout) map to 500.

use tengine_core::{NoMatch, STATUS_BAD_REQUEST, STATUS_INTERNAL_SERVER_ERROR};
use tengine_exec::ExecError;
use tengine_fsops::FsOpsError;

/// A request failure ready to be turned into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFailure {
    /// Reply status.
    pub status: u16,
    /// One-line reason.
    pub message: String,
}

impl TransformFailure {
    /// Client-attributable failure.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Engine-attributable failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Failure for a required request field that was absent or blank.
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::bad_request(format!("Request parameter '{name}' is missing"))
    }
}

impl From<NoMatch> for TransformFailure {
    fn from(reason: NoMatch) -> Self {
        Self::bad_request(reason.to_string())
    }
}

impl From<FsOpsError> for TransformFailure {
    fn from(err: FsOpsError) -> Self {
        if err.is_caller_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal("Failed to read or write transform files")
        }
    }
}

impl From<ExecError> for TransformFailure {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::NonZeroExit { stderr, .. } => {
                Self::bad_request(format!("Transformer exit code was not 0: \n{stderr}"))
            }
            ExecError::Terminated { stderr, .. } => {
                Self::internal(format!("Transformer terminated abnormally: \n{stderr}"))
            }
            ExecError::MissingTarget { .. } => {
                Self::internal("Transformer failed to create an output file")
            }
            ExecError::Spawn { transformer, .. } => {
                Self::internal(format!("Failed to start transformer {transformer}"))
            }
            ExecError::Wait { transformer, .. } => {
                Self::internal(format!("Failed to wait for transformer {transformer}"))
            }
            ExecError::TimedOut {
                transformer,
                timeout_ms,
            } => Self::internal(format!(
                "Transformer {transformer} exceeded time limit of {timeout_ms}ms"
            )),
        }
    }
}
