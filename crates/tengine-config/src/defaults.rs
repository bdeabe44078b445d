//! Default values for engine configuration.
//!
//! # Design
//! - Centralize defaults so descriptor parsing and overrides agree.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default HTTP listener address.
pub const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8090);
/// Default upper bound on multipart upload bodies.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
/// Default per-request transform timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Default queue worker count.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 4;
/// Default inbound request destination.
pub const DEFAULT_REQUEST_QUEUE: &str = "tengine.requests";
/// Default probe tolerance percentage.
pub const DEFAULT_PROBE_TOLERANCE_PERCENT: u32 = 110;
/// Default probe ramp-up sample count.
pub const DEFAULT_PROBE_RAMP_UP: u32 = 5;
/// Default log level directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default directory for per-request temp files.
#[must_use]
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("tengine").join("work")
}

/// Default directory for the shared file store.
#[must_use]
pub fn default_store_dir() -> PathBuf {
    std::env::temp_dir().join("tengine").join("store")
}
