//! Per-message request/reply protocol.
//!
//! # Design
//!
//! - A message moves through: correlation extracted, reply destination resolved, request
//!   decoded, dispatched, replied.
//! - A missing correlation id degrades to an untagged reply; it never stops processing.
//! - A message without a reply destination is dropped. There is nobody to answer.
//! - Decoding failures still produce a reply: malformed envelopes are 400, transport
//!   faults reading the body are 500.

use std::sync::Arc;

use async_trait::async_trait;
use tengine_core::{
    STATUS_BAD_REQUEST, STATUS_INTERNAL_SERVER_ERROR, TransformReply, TransformRequest,
};
use tengine_dispatch::{TRANSPORT_QUEUE, TransformService};
use tengine_telemetry::{Metrics, with_request_context};
use tracing::{debug, error, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::{QueueMessage, ReplyPublisher, decode_request};

const TRANSPORT: &str = TRANSPORT_QUEUE;

/// Dispatches a decoded request and returns its single reply.
#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    /// Run the request to completion.
    async fn dispatch_request(&self, request: TransformRequest) -> TransformReply;
}

#[async_trait]
impl RequestDispatcher for TransformService {
    async fn dispatch_request(&self, request: TransformRequest) -> TransformReply {
        self.handle(request, None, TRANSPORT).await
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// No reply destination; nothing was published.
    Dropped,
    /// A reply with this status was published.
    Replied {
        /// Status of the published reply.
        status: u16,
    },
    /// The reply could not be published.
    ReplyFailed {
        /// Status of the reply that was lost.
        status: u16,
    },
}

/// Queue-side adapter in front of a [`RequestDispatcher`].
pub struct QueueTransformService {
    dispatcher: Arc<dyn RequestDispatcher>,
    publisher: Arc<dyn ReplyPublisher>,
    metrics: Metrics,
}

impl QueueTransformService {
    /// Wire the adapter.
    #[must_use]
    pub fn new(
        dispatcher: Arc<dyn RequestDispatcher>,
        publisher: Arc<dyn ReplyPublisher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            dispatcher,
            publisher,
            metrics,
        }
    }

    /// Process one message end to end.
    pub async fn process(&self, message: &dyn QueueMessage) -> MessageOutcome {
        let correlation_id = match message.correlation_id() {
            Ok(correlation_id) => correlation_id.filter(|id| !id.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, detail = %err.detail(), "failed to read correlation id");
                None
            }
        };
        let context_id = correlation_id
            .clone()
            .unwrap_or_else(|| "uncorrelated".to_owned());

        self.metrics.add_queue_in_flight(1);
        let outcome = with_request_context(
            context_id,
            TRANSPORT,
            self.process_correlated(message, correlation_id),
        )
        .await;
        self.metrics.add_queue_in_flight(-1);
        outcome
    }

    async fn process_correlated(
        &self,
        message: &dyn QueueMessage,
        correlation_id: Option<String>,
    ) -> MessageOutcome {
        let destination = match message.reply_to() {
            Ok(Some(destination)) if !destination.trim().is_empty() => destination,
            Ok(_) => {
                error!(
                    correlation_id = correlation_id.as_deref().unwrap_or_default(),
                    "message has no reply destination; dropping"
                );
                self.metrics.inc_queue_dropped();
                return MessageOutcome::Dropped;
            }
            Err(err) => {
                error!(
                    correlation_id = correlation_id.as_deref().unwrap_or_default(),
                    error = %err,
                    detail = %err.detail(),
                    "failed to read reply destination; dropping"
                );
                self.metrics.inc_queue_dropped();
                return MessageOutcome::Dropped;
            }
        };

        let reply = match read_request(message) {
            Ok(request) => {
                debug!(request_id = %request.request_id, "dispatching queued request");
                self.dispatcher.dispatch_request(request).await
            }
            Err(err) => {
                let reply = error_reply(&err);
                warn!(
                    status = reply.status,
                    details = reply.error_details.as_deref().unwrap_or_default(),
                    "rejecting undecodable message"
                );
                reply
            }
        };

        let status = reply.status;
        match self
            .publisher
            .publish(&destination, correlation_id.as_deref(), &reply)
            .await
        {
            Ok(()) => MessageOutcome::Replied { status },
            Err(err) => {
                error!(
                    destination = %destination,
                    error = %err,
                    detail = %err.detail(),
                    "failed to publish reply"
                );
                MessageOutcome::ReplyFailed { status }
            }
        }
    }
}

fn read_request(message: &dyn QueueMessage) -> QueueResult<TransformRequest> {
    let body = message.body()?.ok_or(QueueError::EmptyBody)?;
    decode_request(&body)
}

fn error_reply(err: &QueueError) -> TransformReply {
    match err {
        QueueError::Malformed { source } => TransformReply::orphan_failure(
            STATUS_BAD_REQUEST,
            format!("Failed to deserialize transform request: {source}"),
        ),
        other => TransformReply::orphan_failure(
            STATUS_INTERNAL_SERVER_ERROR,
            format!("Transport failure reading transform request: {}", other.detail()),
        ),
    }
}
