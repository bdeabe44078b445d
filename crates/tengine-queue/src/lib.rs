#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Queue transport: correlated request/reply over a one-way message channel.
//!
//! Broker bindings implement [`MessageSource`], [`QueueMessage`] and [`ReplyPublisher`];
//! [`MemoryBroker`] is the in-process binding used by tests and single-node deployments.

pub mod broker;
pub mod error;
pub mod message;
pub mod service;
pub mod worker;

pub use broker::{MemoryBroker, MemoryMessage, PublishedReply};
pub use error::{QueueError, QueueResult};
pub use message::{MessageSource, QueueMessage, ReplyPublisher, decode_request, encode_reply};
pub use service::{MessageOutcome, QueueTransformService, RequestDispatcher};
pub use worker::{WorkerPool, spawn_workers};
