//! In-process broker binding over tokio channels.
//!
//! Requests flow through one bounded channel shared by every worker; replies are encoded
//! exactly as a network binding would encode them and collected on a second channel.

use async_trait::async_trait;
use tengine_core::TransformReply;
use tokio::sync::{Mutex, mpsc};

use crate::error::{QueueError, QueueResult};
use crate::message::{MessageSource, QueueMessage, ReplyPublisher, encode_reply};

/// A message travelling through [`MemoryBroker`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMessage {
    /// Correlation header.
    pub correlation_id: Option<String>,
    /// Reply destination header.
    pub reply_to: Option<String>,
    /// Payload.
    pub body: Option<Vec<u8>>,
}

impl MemoryMessage {
    /// Message carrying `body` with both headers set.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        reply_to: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            reply_to: Some(reply_to.into()),
            body: Some(body),
        }
    }
}

impl QueueMessage for MemoryMessage {
    fn correlation_id(&self) -> QueueResult<Option<String>> {
        Ok(self.correlation_id.clone())
    }

    fn reply_to(&self) -> QueueResult<Option<String>> {
        Ok(self.reply_to.clone())
    }

    fn body(&self) -> QueueResult<Option<Vec<u8>>> {
        Ok(self.body.clone())
    }
}

/// A reply captured by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReply {
    /// Destination it was published to.
    pub destination: String,
    /// Correlation header.
    pub correlation_id: Option<String>,
    /// Encoded reply envelope.
    pub body: Vec<u8>,
}

impl PublishedReply {
    /// Decode the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Malformed`] if the body is not a reply.
    pub fn decode(&self) -> QueueResult<TransformReply> {
        serde_json::from_slice(&self.body).map_err(|source| QueueError::Malformed { source })
    }
}

/// In-process request queue and reply sink.
pub struct MemoryBroker {
    requests_tx: Mutex<Option<mpsc::Sender<MemoryMessage>>>,
    requests_rx: Mutex<mpsc::Receiver<MemoryMessage>>,
    replies_tx: mpsc::UnboundedSender<PublishedReply>,
    replies_rx: Mutex<mpsc::UnboundedReceiver<PublishedReply>>,
}

impl MemoryBroker {
    /// Broker buffering up to `capacity` pending requests.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(capacity.max(1));
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            requests_tx: Mutex::new(Some(requests_tx)),
            requests_rx: Mutex::new(requests_rx),
            replies_tx,
            replies_rx: Mutex::new(replies_rx),
        }
    }

    /// Enqueue a request, waiting for buffer space.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Publish`] once the broker is closed.
    pub async fn send(&self, message: MemoryMessage) -> QueueResult<()> {
        let sender = self.requests_tx.lock().await.clone();
        let closed = || QueueError::Publish {
            destination: "requests".into(),
            reason: "broker closed".into(),
        };
        sender
            .ok_or_else(closed)?
            .send(message)
            .await
            .map_err(|_| closed())
    }

    /// Stop accepting requests; workers exit once the backlog drains.
    pub async fn close(&self) {
        self.requests_tx.lock().await.take();
    }

    /// Wait for the next published reply.
    pub async fn next_reply(&self) -> Option<PublishedReply> {
        self.replies_rx.lock().await.recv().await
    }

    /// Take a reply if one has already been published.
    pub async fn try_next_reply(&self) -> Option<PublishedReply> {
        self.replies_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl MessageSource for MemoryBroker {
    type Message = MemoryMessage;

    async fn receive(&self) -> Option<MemoryMessage> {
        self.requests_rx.lock().await.recv().await
    }
}

#[async_trait]
impl ReplyPublisher for MemoryBroker {
    async fn publish(
        &self,
        destination: &str,
        correlation_id: Option<&str>,
        reply: &TransformReply,
    ) -> QueueResult<()> {
        let body = encode_reply(reply)?;
        self.replies_tx
            .send(PublishedReply {
                destination: destination.to_owned(),
                correlation_id: correlation_id.map(str::to_owned),
                body,
            })
            .map_err(|_| QueueError::Publish {
                destination: destination.to_owned(),
                reason: "reply channel closed".into(),
            })
    }
}
