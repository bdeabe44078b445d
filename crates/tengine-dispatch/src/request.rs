//! Transport-neutral dispatch inputs and outputs.

use std::time::Duration;

use tengine_core::{TransformOptions, TransformReply, TransformRequest};

use crate::failure::TransformFailure;

/// Transport label for HTTP requests; the only transport that honours `testDelay`.
pub const TRANSPORT_HTTP: &str = "http";
/// Transport label for queue messages.
pub const TRANSPORT_QUEUE: &str = "queue";
/// Transport label for self-test transforms.
pub const TRANSPORT_PROBE: &str = "probe";

/// Option names consumed by the engine itself and never forwarded to transformers.
pub const RESERVED_OPTIONS: &[&str] = &[
    "timeout",
    "testDelay",
    "sourceFilename",
    "file",
    "sourceMimetype",
    "targetMimetype",
    "targetExtension",
];

/// Where the source content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// Bytes uploaded with the request.
    Upload {
        /// Caller-supplied filename, untrusted.
        filename: Option<String>,
        /// Uploaded content.
        bytes: Vec<u8>,
    },
    /// Content held in the shared store under `TransformRequest::source_reference`.
    Reference,
}

/// How the produced artifact is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Return the bytes on the outcome.
    Inline,
    /// Persist to the shared store and return its reference on the reply.
    Store,
}

/// One request as seen by the dispatch core.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Parsed request.
    pub request: TransformRequest,
    /// Source content.
    pub source: SourceInput,
    /// Delivery mode.
    pub delivery: Delivery,
    /// Transport-level timeout; the `timeout` option takes precedence.
    pub timeout: Option<Duration>,
    /// Transport label for metrics and logs.
    pub transport: &'static str,
}

impl DispatchRequest {
    /// Upload-backed request delivering bytes inline.
    #[must_use]
    pub const fn upload(
        request: TransformRequest,
        filename: Option<String>,
        bytes: Vec<u8>,
        transport: &'static str,
    ) -> Self {
        Self {
            request,
            source: SourceInput::Upload { filename, bytes },
            delivery: Delivery::Inline,
            timeout: None,
            transport,
        }
    }

    /// Store-backed request delivering a target reference.
    #[must_use]
    pub const fn reference(request: TransformRequest, transport: &'static str) -> Self {
        Self {
            request,
            source: SourceInput::Reference,
            delivery: Delivery::Store,
            timeout: None,
            transport,
        }
    }

    /// Override the transport-level timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Bytes produced for an inline delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Download name derived from the source name and target extension.
    pub filename: String,
    /// Target mimetype.
    pub media_type: String,
    /// Produced content.
    pub bytes: Vec<u8>,
}

/// Result of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The single reply for the request.
    pub reply: TransformReply,
    /// Inline artifact on success.
    pub artifact: Option<Artifact>,
    /// Time spent transforming, excluding any artificial delay.
    pub elapsed: Duration,
}

/// Engine-level settings carried in the option map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservedOptions {
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Artificial delay applied after the transform.
    pub test_delay: Option<Duration>,
    /// Source filename for store-backed requests.
    pub source_filename: Option<String>,
}

impl ReservedOptions {
    /// Split reserved entries out of `options`, returning the transformer options.
    ///
    /// # Errors
    ///
    /// Returns a 400 failure when `timeout` or `testDelay` is not a valid millisecond count.
    pub fn extract(
        options: &TransformOptions,
    ) -> Result<(TransformOptions, Self), TransformFailure> {
        let mut reserved = Self::default();
        let mut forwarded = TransformOptions::new();
        for (name, value) in options {
            match name.as_str() {
                "timeout" => reserved.timeout = Some(parse_millis(name, value, false)?),
                "testDelay" => reserved.test_delay = Some(parse_millis(name, value, true)?),
                "sourceFilename" => reserved.source_filename = Some(value.clone()),
                other if RESERVED_OPTIONS.contains(&other) => {}
                _ => {
                    forwarded.insert(name.clone(), value.clone());
                }
            }
        }
        Ok((forwarded, reserved))
    }
}

fn parse_millis(name: &str, value: &str, allow_zero: bool) -> Result<Duration, TransformFailure> {
    match value.trim().parse::<u64>() {
        Ok(0) if !allow_zero => Err(invalid_option(name, value)),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(invalid_option(name, value)),
    }
}

fn invalid_option(name: &str, value: &str) -> TransformFailure {
    TransformFailure::bad_request(format!("Invalid value for option '{name}': {value}"))
}
