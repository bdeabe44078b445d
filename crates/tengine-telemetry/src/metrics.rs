//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges relevant to transform dispatch and probes.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    transform_requests_total: IntCounterVec,
    transform_duration_ms: IntGauge,
    probe_normal_time_ms: IntGauge,
    probe_max_time_ms: IntGauge,
    queue_messages_dropped_total: IntCounter,
    queue_in_flight: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Duration of the most recent transform (ms).
    pub transform_duration_ms: i64,
    /// Current probe baseline (ms).
    pub probe_normal_time_ms: i64,
    /// Current probe threshold (ms); -1 while unbounded.
    pub probe_max_time_ms: i64,
    /// Queue messages dropped without a reply.
    pub queue_messages_dropped_total: u64,
    /// Queue messages currently being processed.
    pub queue_in_flight: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code", "outcome"],
        )
        .map_err(|source| collector_error("http_requests_total", source))?;
        let transform_requests_total = IntCounterVec::new(
            Opts::new(
                "transform_requests_total",
                "Transform requests completed by transport and reply status",
            ),
            &["transport", "status"],
        )
        .map_err(|source| collector_error("transform_requests_total", source))?;
        let transform_duration_ms = IntGauge::with_opts(Opts::new(
            "transform_duration_ms",
            "Duration of the most recent transform (ms)",
        ))
        .map_err(|source| collector_error("transform_duration_ms", source))?;
        let probe_normal_time_ms = IntGauge::with_opts(Opts::new(
            "probe_normal_time_ms",
            "Probe transform baseline duration (ms)",
        ))
        .map_err(|source| collector_error("probe_normal_time_ms", source))?;
        let probe_max_time_ms = IntGauge::with_opts(Opts::new(
            "probe_max_time_ms",
            "Probe transform duration threshold (ms)",
        ))
        .map_err(|source| collector_error("probe_max_time_ms", source))?;
        let queue_messages_dropped_total = IntCounter::with_opts(Opts::new(
            "queue_messages_dropped_total",
            "Queue messages dropped because no reply destination was resolvable",
        ))
        .map_err(|source| collector_error("queue_messages_dropped_total", source))?;
        let queue_in_flight = IntGauge::with_opts(Opts::new(
            "queue_in_flight",
            "Queue messages currently being processed",
        ))
        .map_err(|source| collector_error("queue_in_flight", source))?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "transform_requests_total", &transform_requests_total)?;
        register(&registry, "transform_duration_ms", &transform_duration_ms)?;
        register(&registry, "probe_normal_time_ms", &probe_normal_time_ms)?;
        register(&registry, "probe_max_time_ms", &probe_max_time_ms)?;
        register(
            &registry,
            "queue_messages_dropped_total",
            &queue_messages_dropped_total,
        )?;
        register(&registry, "queue_in_flight", &queue_in_flight)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                transform_requests_total,
                transform_duration_ms,
                probe_normal_time_ms,
                probe_max_time_ms,
                queue_messages_dropped_total,
                queue_in_flight,
            }),
        })
    }

    /// Increment the HTTP request counter for a route, status code and outcome class.
    pub fn inc_http_request(&self, route: &str, status: u16, outcome: &str) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string(), outcome])
            .inc();
    }

    /// Count of HTTP requests recorded for a route, status code and outcome class.
    #[must_use]
    pub fn http_request_count(&self, route: &str, status: u16, outcome: &str) -> u64 {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string(), outcome])
            .get()
    }

    /// Record a completed transform.
    pub fn observe_transform(&self, transport: &str, status: u16, duration: Duration) {
        self.inner
            .transform_requests_total
            .with_label_values(&[transport, &status.to_string()])
            .inc();
        self.inner
            .transform_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Publish the probe baseline.
    pub fn set_probe_baseline(&self, normal_time_ms: u64, max_time_ms: u64) {
        self.inner
            .probe_normal_time_ms
            .set(i64::try_from(normal_time_ms).unwrap_or(i64::MAX));
        // The unbounded sentinel has no meaningful gauge value.
        self.inner
            .probe_max_time_ms
            .set(i64::try_from(max_time_ms).unwrap_or(-1));
    }

    /// Increment the dropped queue message counter.
    pub fn inc_queue_dropped(&self) {
        self.inner.queue_messages_dropped_total.inc();
    }

    /// Adjust the in-flight queue message gauge.
    pub fn add_queue_in_flight(&self, delta: i64) {
        self.inner.queue_in_flight.add(delta);
    }

    /// Count of transforms recorded for a transport and status.
    #[must_use]
    pub fn transform_count(&self, transport: &str, status: u16) -> u64 {
        self.inner
            .transform_requests_total
            .with_label_values(&[transport, &status.to_string()])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transform_duration_ms: self.inner.transform_duration_ms.get(),
            probe_normal_time_ms: self.inner.probe_normal_time_ms.get(),
            probe_max_time_ms: self.inner.probe_max_time_ms.get(),
            queue_messages_dropped_total: self.inner.queue_messages_dropped_total.get(),
            queue_in_flight: self.inner.queue_in_flight.get(),
        }
    }

    fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn collector_error(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
