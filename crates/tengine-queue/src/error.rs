//! # Design
//!
//! - Transport faults carry the broker's own description as a context field.
//! - Envelope decoding failures keep the `serde_json` source for the reply message.

use thiserror::Error;

/// Result alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by the queue transport.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A message header could not be read.
    #[error("message header unavailable")]
    Header {
        /// Header name.
        name: &'static str,
        /// Broker-supplied reason.
        reason: String,
    },
    /// The message body could not be read.
    #[error("message body unreadable")]
    Body {
        /// Broker-supplied reason.
        reason: String,
    },
    /// The message carried no body.
    #[error("message body is empty")]
    EmptyBody,
    /// The body was not a valid transform request.
    #[error("malformed transform request")]
    Malformed {
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A reply could not be serialised.
    #[error("failed to encode transform reply")]
    Encode {
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A reply could not be handed to the broker.
    #[error("failed to publish transform reply")]
    Publish {
        /// Reply destination.
        destination: String,
        /// Broker-supplied reason.
        reason: String,
    },
}

impl QueueError {
    /// One-line description including the underlying cause.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Header { name, reason } => format!("header {name}: {reason}"),
            Self::Body { reason } => reason.clone(),
            Self::Malformed { source } | Self::Encode { source } => source.to_string(),
            Self::Publish {
                destination,
                reason,
            } => format!("{destination}: {reason}"),
            Self::EmptyBody => self.to_string(),
        }
    }
}
