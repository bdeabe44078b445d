//! # Design
//!
//! - Report capability-table construction failures with constant messages.
//! - Carry the offending transformer and field so configuration errors are actionable.

use thiserror::Error;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building the capability index from transform definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A definition field failed validation.
    #[error("invalid transform definition")]
    InvalidDefinition {
        /// Transformer whose definition is invalid.
        transformer: String,
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Two definitions share a name.
    #[error("duplicate transformer name")]
    DuplicateTransformer {
        /// Repeated transformer name.
        name: String,
    },
    /// A pipeline step names a transformer that does not exist or is itself a pipeline.
    #[error("unknown pipeline step transformer")]
    UnknownPipelineStep {
        /// Pipeline transformer name.
        transformer: String,
        /// Step transformer that could not be found.
        step: String,
    },
    /// A pipeline step cannot accept the mimetype produced by the previous step.
    #[error("pipeline step mimetypes do not chain")]
    PipelineChainMismatch {
        /// Pipeline transformer name.
        transformer: String,
        /// Zero-based index of the failing step.
        step_index: usize,
        /// Source mimetype the step would receive.
        source_media_type: String,
        /// Target mimetype the step was declared to produce.
        target_media_type: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_messages_are_constant() {
        let err = CoreError::UnknownPipelineStep {
            transformer: "pdf-to-png".into(),
            step: "missing".into(),
        };
        assert_eq!(err.to_string(), "unknown pipeline step transformer");

        let err = CoreError::PipelineChainMismatch {
            transformer: "p".into(),
            step_index: 1,
            source_media_type: "a/b".into(),
            target_media_type: "c/d".into(),
        };
        assert_eq!(err.to_string(), "pipeline step mimetypes do not chain");
    }
}
