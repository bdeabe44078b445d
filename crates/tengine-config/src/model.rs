//! Typed engine configuration.
//!
//! Every section deserialises with defaults so a descriptor only needs an engine name
//! and its transformers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tengine_core::{TransformDefinition, TransformOptions};

use crate::defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_LOG_LEVEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROBE_RAMP_UP,
    DEFAULT_PROBE_TOLERANCE_PERCENT, DEFAULT_QUEUE_CONCURRENCY, DEFAULT_REQUEST_QUEUE,
    DEFAULT_TIMEOUT_MS, default_store_dir, default_work_dir,
};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine identity reported by `/version` and logs.
    pub engine_name: String,
    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Directory for per-request temp files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Directory backing the shared file store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Transform execution settings.
    #[serde(default)]
    pub transform: TransformSettings,
    /// Queue transport settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Self-test probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Transform definitions.
    #[serde(default)]
    pub transformers: Vec<TransformDefinition>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listener address.
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Transform execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    /// Timeout applied when a request does not set one.
    pub default_timeout_ms: u64,
}

impl TransformSettings {
    /// Default timeout as a duration.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Queue transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Whether queue workers are started.
    pub enabled: bool,
    /// Inbound request destination name.
    pub request_queue: String,
    /// Number of concurrent workers.
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            request_queue: DEFAULT_REQUEST_QUEUE.to_owned(),
            concurrency: DEFAULT_QUEUE_CONCURRENCY,
        }
    }
}

/// Self-test probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Allowed slowdown over the baseline, in percent.
    pub tolerance_percent: u32,
    /// Samples used to establish the baseline.
    pub ramp_up: u32,
    /// Probe transform fixture; probes answer without transforming when absent.
    pub test: Option<ProbeTestConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_PROBE_TOLERANCE_PERCENT,
            ramp_up: DEFAULT_PROBE_RAMP_UP,
            test: None,
        }
    }
}

/// The transform issued by liveness and readiness probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTestConfig {
    /// Fixture file used as the probe source.
    pub source_file: PathBuf,
    /// Fixture mimetype.
    pub source_media_type: String,
    /// Probe target mimetype.
    pub target_media_type: String,
    /// Probe target extension.
    pub target_extension: String,
    /// Options sent with the probe.
    #[serde(default)]
    pub options: TransformOptions,
    /// Expected output length in bytes.
    pub expected_length: u64,
    /// Allowed deviation from `expected_length`.
    #[serde(default)]
    pub plus_or_minus: u64,
    /// Liveness fails once this many transforms have run; 0 disables the check.
    #[serde(default)]
    pub max_transforms: u64,
    /// Hard ceiling on a single probe transform; 0 disables the check.
    #[serde(default)]
    pub max_transform_seconds: u64,
    /// Minimum seconds between liveness transforms.
    #[serde(default)]
    pub liveness_period_seconds: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Env-filter directive.
    pub level: String,
    /// `pretty` or `json`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_owned(),
            format: None,
        }
    }
}
