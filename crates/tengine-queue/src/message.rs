//! Broker seams and the wire encoding of requests and replies.

use async_trait::async_trait;
use tengine_core::{TransformReply, TransformRequest};

use crate::error::{QueueError, QueueResult};

/// One inbound message as exposed by a broker binding.
///
/// Every accessor may fail independently; the transport decides which failures are fatal.
pub trait QueueMessage: Send + Sync {
    /// Correlation identifier used to tag the reply.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Header`] when the broker cannot produce the header.
    fn correlation_id(&self) -> QueueResult<Option<String>>;

    /// Destination the reply must be published to.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Header`] when the broker cannot produce the header.
    fn reply_to(&self) -> QueueResult<Option<String>>;

    /// Raw body; `None` for a message without payload.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Body`] when the payload cannot be read.
    fn body(&self) -> QueueResult<Option<Vec<u8>>>;
}

/// Supplies inbound messages to the worker pool.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Message type produced by this source.
    type Message: QueueMessage + 'static;

    /// Wait for the next message; `None` once the source is closed.
    async fn receive(&self) -> Option<Self::Message>;
}

/// Publishes replies back to callers.
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    /// Publish `reply` to `destination`, tagged with `correlation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the reply cannot be encoded or delivered.
    async fn publish(
        &self,
        destination: &str,
        correlation_id: Option<&str>,
        reply: &TransformReply,
    ) -> QueueResult<()>;
}

/// Decode a request envelope.
///
/// # Errors
///
/// Returns [`QueueError::Malformed`] when the body is not a valid request.
pub fn decode_request(body: &[u8]) -> QueueResult<TransformRequest> {
    serde_json::from_slice(body).map_err(|source| QueueError::Malformed { source })
}

/// Encode a reply envelope.
///
/// # Errors
///
/// Returns [`QueueError::Encode`] when serialisation fails.
pub fn encode_reply(reply: &TransformReply) -> QueueResult<Vec<u8>> {
    serde_json::to_vec(reply).map_err(|source| QueueError::Encode { source })
}
