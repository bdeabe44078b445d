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

//! Runs one resolved transform step as an external process.
//!
//! Layout: `template.rs` (argument rendering), `process.rs` (executor trait and the
//! `tokio::process` implementation), `error.rs` (execution failures).

pub mod error;
pub mod process;
pub mod template;

pub use error::{ExecError, ExecResult};
pub use process::{ExecutionOutput, Invocation, ProcessExecutor, TransformExecutor};
pub use template::{RenderContext, render_args};
