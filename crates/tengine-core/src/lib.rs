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

//! Core domain types for the transform engine.
//!
//! Layout: `model.rs` (request/reply value types), `registry.rs` (transform
//! definitions and the capability index), `probe.rs` (self-test timing baseline),
//! `status.rs` (reply status codes), `error.rs` (registry construction errors).

pub mod error;
pub mod model;
pub mod probe;
pub mod registry;
pub mod status;

pub use error::{CoreError, CoreResult};
pub use model::{TransformOptions, TransformReply, TransformRequest};
pub use probe::{ProbeBaseline, ProbeTimingModel, UNBOUNDED_MAX_TIME_MS};
pub use registry::{
    CapabilityDescriptor, CapabilityIndex, CommandTemplate, NoMatch, PipelineStep,
    ResolvedStep, ResolvedTransform, SupportedPair, TransformDefinition, TransformQuery,
    TransformerDescriptor,
};
pub use status::{STATUS_BAD_REQUEST, STATUS_CREATED, STATUS_INTERNAL_SERVER_ERROR, is_success};
