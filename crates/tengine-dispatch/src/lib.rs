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

//! Dispatch core: resolve, acquire, execute, deliver, release.
//!
//! Both transports funnel requests through [`TransformService`]; the self-test probe
//! drives the same path through [`ProbeTester`].

pub mod error;
pub mod failure;
pub mod probe;
pub mod request;
mod scope;
pub mod service;

pub use error::{DispatchError, DispatchResult};
pub use failure::TransformFailure;
pub use probe::{ProbeKind, ProbeOutcome, ProbeTester};
pub use request::{
    Artifact, Delivery, DispatchOutcome, DispatchRequest, RESERVED_OPTIONS, ReservedOptions,
    SourceInput, TRANSPORT_HTTP, TRANSPORT_PROBE, TRANSPORT_QUEUE,
};
pub use service::{TransformService, TransformServiceDeps};
