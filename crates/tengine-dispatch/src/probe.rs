//! Liveness and readiness self-tests.
//!
//! # Design
//!
//! - Both probes run the configured fixture through the full dispatch path.
//! - Readiness stops transforming after its first success.
//! - Liveness transforms at most once per period; in between it reports success without
//!   work. Any liveness failure is sticky: the engine stays unhealthy until restarted.
//! - Every probe transform feeds the shared timing model; once the baseline is locked,
//!   liveness fails when a transform exceeds the model's threshold.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tengine_config::ProbeTestConfig;
use tengine_core::{ProbeTimingModel, TransformRequest};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::request::{DispatchRequest, TRANSPORT_PROBE};
use crate::service::TransformService;

const NO_TRANSFORM: &str = "Success - No transform";

/// Which probe is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Process health.
    Live,
    /// Ability to serve traffic.
    Ready,
}

impl ProbeKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Ready => "ready",
        }
    }
}

/// Probe verdict with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the probe passed.
    pub healthy: bool,
    /// Message served as the probe body.
    pub message: String,
}

impl ProbeOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

struct Fixture {
    config: ProbeTestConfig,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ProbeState {
    ready: bool,
    dead: Option<String>,
    transforms: u64,
    last_liveness: Option<Instant>,
}

/// Runs probe transforms against a [`TransformService`].
pub struct ProbeTester {
    engine_name: String,
    service: TransformService,
    model: Arc<ProbeTimingModel>,
    fixture: Option<Fixture>,
    state: Mutex<ProbeState>,
}

impl ProbeTester {
    /// Build a tester, loading the fixture bytes up front.
    ///
    /// Without a fixture every probe passes without transforming.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ProbeFixture`] when the fixture cannot be read.
    pub fn new(
        engine_name: impl Into<String>,
        service: TransformService,
        model: Arc<ProbeTimingModel>,
        test: Option<ProbeTestConfig>,
    ) -> DispatchResult<Self> {
        let fixture = test.map(load_fixture).transpose()?;
        Ok(Self {
            engine_name: engine_name.into(),
            service,
            model,
            fixture,
            state: Mutex::new(ProbeState::default()),
        })
    }

    /// Timing model fed by probe transforms.
    #[must_use]
    pub fn model(&self) -> &ProbeTimingModel {
        &self.model
    }

    /// Answer one probe.
    pub async fn check(&self, kind: ProbeKind) -> ProbeOutcome {
        let Some(fixture) = &self.fixture else {
            return ProbeOutcome::pass(NO_TRANSFORM);
        };

        let mut state = self.state.lock().await;
        if let Some(reason) = &state.dead {
            return ProbeOutcome::fail(reason.clone());
        }
        match kind {
            ProbeKind::Ready if state.ready => return ProbeOutcome::pass(NO_TRANSFORM),
            ProbeKind::Live => {
                let limit = fixture.config.max_transforms;
                if limit > 0 && state.transforms >= limit {
                    return die(
                        &mut state,
                        format!(
                            "Transformer requested to die. It has performed more than {limit} transformations"
                        ),
                    );
                }
                let period = Duration::from_secs(fixture.config.liveness_period_seconds);
                if state
                    .last_liveness
                    .is_some_and(|last| last.elapsed() < period)
                {
                    return ProbeOutcome::pass(NO_TRANSFORM);
                }
            }
            ProbeKind::Ready => {}
        }

        let outcome = self.transform(kind, fixture, &mut state).await;
        match kind {
            ProbeKind::Ready if outcome.healthy => state.ready = true,
            ProbeKind::Live => {
                state.last_liveness = Some(Instant::now());
                if !outcome.healthy {
                    return die(&mut state, outcome.message);
                }
            }
            ProbeKind::Ready => {}
        }
        outcome
    }

    async fn transform(
        &self,
        kind: ProbeKind,
        fixture: &Fixture,
        state: &mut ProbeState,
    ) -> ProbeOutcome {
        let config = &fixture.config;
        let mut request = TransformRequest::new(
            format!("probe-{}", kind.label()),
            config.source_media_type.clone(),
            config.target_media_type.clone(),
            config.target_extension.clone(),
        );
        request.options.clone_from(&config.options);

        let outcome = self
            .service
            .dispatch(DispatchRequest::upload(
                request,
                fixture.file_name.clone(),
                fixture.bytes.clone(),
                TRANSPORT_PROBE,
            ))
            .await;
        state.transforms += 1;

        if !outcome.reply.is_success() {
            let details = outcome.reply.error_details.unwrap_or_default();
            warn!(
                probe = kind.label(),
                status = outcome.reply.status,
                details,
                "probe transform failed"
            );
            return ProbeOutcome::fail(format!("Failed - {details}"));
        }

        let length = outcome
            .artifact
            .as_ref()
            .map_or(0, |artifact| u64::try_from(artifact.bytes.len()).unwrap_or(u64::MAX));
        let low = config.expected_length.saturating_sub(config.plus_or_minus);
        let high = config.expected_length.saturating_add(config.plus_or_minus);
        if length < low || length > high {
            return ProbeOutcome::fail(format!(
                "Failed - Target length {length} was outside the expected range {low}..={high}"
            ));
        }

        // Only transforms that produced a plausible target feed the baseline.
        let elapsed_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX);
        let (normal_ms, max_ms) = self.model.record(elapsed_ms);
        self.service.metrics().set_probe_baseline(normal_ms, max_ms);

        if kind == ProbeKind::Live {
            let ceiling_ms = config.max_transform_seconds.saturating_mul(1000);
            if ceiling_ms > 0 && elapsed_ms > ceiling_ms {
                return ProbeOutcome::fail(format!(
                    "Transformer requested to die. A transform took longer than {} seconds",
                    config.max_transform_seconds
                ));
            }
            if self.model.snapshot().warmed_up && !self.model.is_healthy(elapsed_ms) {
                return ProbeOutcome::fail(format!(
                    "Transformer requested to die. A transform took longer than {max_ms}ms"
                ));
            }
        }

        info!(probe = kind.label(), elapsed_ms, normal_ms, "probe transform succeeded");
        ProbeOutcome::pass(format!("Success - {} {elapsed_ms}ms", self.engine_name))
    }
}

fn die(state: &mut ProbeState, reason: String) -> ProbeOutcome {
    warn!(reason = %reason, "liveness failure is permanent until restart");
    state.dead = Some(reason.clone());
    ProbeOutcome::fail(reason)
}

fn load_fixture(config: ProbeTestConfig) -> DispatchResult<Fixture> {
    let bytes = std::fs::read(&config.source_file).map_err(|source| DispatchError::ProbeFixture {
        path: config.source_file.clone(),
        source,
    })?;
    let file_name = Path::new(&config.source_file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(Fixture {
        config,
        file_name,
        bytes,
    })
}
