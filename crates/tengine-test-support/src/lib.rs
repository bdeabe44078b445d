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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (fake transformer scripts), definitions.rs (capability builders).

pub mod definitions;
pub mod fixtures;

pub use definitions::{command_definition, pipeline_definition};
pub use fixtures::{FAILURE_STDERR, FakeTransformers};
