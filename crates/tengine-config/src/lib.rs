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

//! Engine configuration.
//!
//! Layout: `model.rs` (typed configuration), `loader.rs` (descriptor parsing and
//! environment overrides), `validate.rs` (validation and capability index build),
//! `defaults.rs` (default values), `error.rs` (configuration errors).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, apply_overrides, load_from_env, load_from_path, parse_descriptor};
pub use model::{
    EngineConfig, HttpConfig, LoggingSettings, ProbeConfig, ProbeTestConfig, QueueConfig,
    TransformSettings,
};
pub use validate::validate;
