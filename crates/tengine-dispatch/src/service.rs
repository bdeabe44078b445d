//! The dispatch pipeline shared by every transport.
//!
//! # Design
//!
//! - Validate, resolve, acquire the source, run each step, deliver, release.
//! - Every temp handle acquired along the way is owned by one scope and released before
//!   the reply is returned, whether the dispatch succeeded or not.
//! - Each step only sees the options it declares. Intermediate outputs are released as
//!   soon as the next step has consumed them.
//! - Exactly one reply is produced per request; failures never escape as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tengine_core::{
    CapabilityIndex, ResolvedTransform, TransformOptions, TransformQuery, TransformReply,
    TransformRequest,
};
use tengine_exec::{Invocation, TransformExecutor};
use tengine_fsops::{
    ContentStore, FsOpsError, SanitizedName, TempFileManager, sanitize_filename, target_filename,
};
use tengine_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::failure::TransformFailure;
use crate::request::{
    Artifact, Delivery, DispatchOutcome, DispatchRequest, ReservedOptions, SourceInput,
    TRANSPORT_HTTP,
};
use crate::scope::HandleScope;

/// Collaborators needed to build a [`TransformService`].
pub struct TransformServiceDeps {
    /// Capability index consulted for every request.
    pub index: Arc<CapabilityIndex>,
    /// Temp file manager rooted at the work directory.
    pub temp: TempFileManager,
    /// Shared store for reference-based requests.
    pub store: Arc<dyn ContentStore>,
    /// Process runner.
    pub executor: Arc<dyn TransformExecutor>,
    /// Metrics registry.
    pub metrics: Metrics,
    /// Timeout applied when neither the request nor the transport supplies one.
    pub default_timeout: Duration,
}

/// Transport-neutral dispatcher.
#[derive(Clone)]
pub struct TransformService {
    index: Arc<CapabilityIndex>,
    temp: TempFileManager,
    store: Arc<dyn ContentStore>,
    executor: Arc<dyn TransformExecutor>,
    metrics: Metrics,
    default_timeout: Duration,
}

struct Completed {
    target_reference: Option<String>,
    artifact: Option<Artifact>,
}

impl TransformService {
    /// Assemble the service from its collaborators.
    #[must_use]
    pub fn new(deps: TransformServiceDeps) -> Self {
        Self {
            index: deps.index,
            temp: deps.temp,
            store: deps.store,
            executor: deps.executor,
            metrics: deps.metrics,
            default_timeout: deps.default_timeout,
        }
    }

    /// Capability index backing resolution.
    #[must_use]
    pub fn index(&self) -> &CapabilityIndex {
        &self.index
    }

    /// Metrics registry shared with the transports.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one request to completion and return its single reply.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        let started = Instant::now();
        let DispatchRequest {
            request,
            source,
            delivery,
            timeout,
            transport,
        } = request;

        let mut test_delay = None;
        let mut scope = HandleScope::default();
        let result = match ReservedOptions::extract(&request.options) {
            Ok((options, reserved)) => {
                test_delay = reserved.test_delay;
                self.run(&request, options, reserved, source, delivery, timeout, &mut scope)
                    .await
            }
            Err(failure) => Err(failure),
        };
        scope.release_all().await;
        debug_assert!(scope.all_released());
        let elapsed = started.elapsed();

        let (reply, artifact) = match result {
            Ok(completed) => (
                TransformReply::success(&request, completed.target_reference),
                completed.artifact,
            ),
            Err(failure) => (
                TransformReply::failure(&request, failure.status, failure.message),
                None,
            ),
        };
        self.record(&request, transport, &reply, elapsed);

        // The artificial delay holds back only the HTTP reply, never a worker or a probe.
        if transport == TRANSPORT_HTTP
            && let Some(delay) = test_delay.filter(|delay| !delay.is_zero())
        {
            tokio::time::sleep(delay).await;
        }

        DispatchOutcome {
            reply,
            artifact,
            elapsed,
        }
    }

    /// Store-backed convenience used by the queue transport.
    pub async fn handle(
        &self,
        request: TransformRequest,
        timeout: Option<Duration>,
        transport: &'static str,
    ) -> TransformReply {
        self.dispatch(DispatchRequest::reference(request, transport).with_timeout(timeout))
            .await
            .reply
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        request: &TransformRequest,
        options: TransformOptions,
        reserved: ReservedOptions,
        source: SourceInput,
        delivery: Delivery,
        transport_timeout: Option<Duration>,
        scope: &mut HandleScope,
    ) -> Result<Completed, TransformFailure> {
        require("sourceMediaType", &request.source_media_type)?;
        require("targetMediaType", &request.target_media_type)?;
        require("targetExtension", &request.target_extension)?;

        let source_size = match &source {
            SourceInput::Upload { bytes, .. } => {
                Some(u64::try_from(bytes.len()).unwrap_or(u64::MAX))
            }
            SourceInput::Reference => request.source_size,
        };
        let query = TransformQuery {
            source_media_type: &request.source_media_type,
            target_media_type: &request.target_media_type,
            option_names: options.keys().map(String::as_str).collect(),
            source_size,
        };
        let resolved = self.index.resolve(&query)?;
        debug!(
            transform = %resolved.name,
            steps = resolved.steps.len(),
            "resolved transform"
        );

        let timeout = reserved
            .timeout
            .or(transport_timeout)
            .unwrap_or(self.default_timeout);
        let (source_slot, source_name) = self
            .acquire_source(request, source, reserved.source_filename.as_deref(), scope)
            .await?;
        let target_slot = self
            .execute_steps(&resolved, source_slot, &options, timeout, scope)
            .await?;

        let target = scope.get(target_slot);
        match delivery {
            Delivery::Inline => {
                let bytes = target.read().await?;
                Ok(Completed {
                    target_reference: None,
                    artifact: Some(Artifact {
                        filename: target_filename(source_name.as_ref(), &request.target_extension),
                        media_type: request.target_media_type.clone(),
                        bytes,
                    }),
                })
            }
            Delivery::Store => {
                let reference = self
                    .store
                    .store(target.path(), &request.target_extension)
                    .await?;
                Ok(Completed {
                    target_reference: Some(reference),
                    artifact: None,
                })
            }
        }
    }

    async fn acquire_source(
        &self,
        request: &TransformRequest,
        source: SourceInput,
        source_filename: Option<&str>,
        scope: &mut HandleScope,
    ) -> Result<(usize, Option<SanitizedName>), TransformFailure> {
        match source {
            SourceInput::Upload { filename, bytes } => {
                let acquired = self
                    .temp
                    .acquire_source(filename.as_deref(), &request.source_media_type, &bytes)
                    .await?;
                Ok((scope.adopt(acquired.handle), acquired.name))
            }
            SourceInput::Reference => {
                let reference = request
                    .source_reference
                    .as_deref()
                    .filter(|reference| !reference.trim().is_empty())
                    .ok_or(FsOpsError::MissingReference)?;
                let name = source_filename.map(sanitize_filename).transpose()?;
                let slot = scope.adopt(self.temp.reserve_source(&request.source_media_type));
                self.store.fetch(reference, scope.get_mut(slot)).await?;
                Ok((slot, name))
            }
        }
    }

    async fn execute_steps(
        &self,
        resolved: &ResolvedTransform,
        source_slot: usize,
        options: &TransformOptions,
        timeout: Duration,
        scope: &mut HandleScope,
    ) -> Result<usize, TransformFailure> {
        let mut current = source_slot;
        for (position, step) in resolved.steps.iter().enumerate() {
            let target_slot = scope.adopt(
                self.temp
                    .acquire_target(&step.source_media_type, &step.target_media_type),
            );
            let step_options = options
                .iter()
                .filter(|(name, _)| step.options.contains(name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            let invocation = Invocation {
                transformer: step.transformer.clone(),
                command: step.command.clone(),
                source_path: scope.get(current).path().to_path_buf(),
                target_path: scope.get(target_slot).path().to_path_buf(),
                source_media_type: step.source_media_type.clone(),
                target_media_type: step.target_media_type.clone(),
                options: step_options,
                timeout,
            };
            let output = self.executor.execute(invocation).await?;
            debug!(
                transformer = %step.transformer,
                step = position,
                elapsed_ms = millis(output.elapsed),
                "transform step completed"
            );
            if current != source_slot {
                scope.release(current).await;
            }
            current = target_slot;
        }
        Ok(current)
    }

    fn record(
        &self,
        request: &TransformRequest,
        transport: &'static str,
        reply: &TransformReply,
        elapsed: Duration,
    ) {
        self.metrics.observe_transform(transport, reply.status, elapsed);
        let details = reply.error_details.as_deref().unwrap_or_default();
        let elapsed_ms = millis(elapsed);
        if reply.is_success() {
            info!(
                request_id = %request.request_id,
                transport,
                source_media_type = %request.source_media_type,
                target_media_type = %request.target_media_type,
                elapsed_ms,
                "transform completed"
            );
        } else if reply.status < 500 {
            warn!(
                request_id = %request.request_id,
                transport,
                status = reply.status,
                details,
                elapsed_ms,
                "transform rejected"
            );
        } else {
            error!(
                request_id = %request.request_id,
                transport,
                status = reply.status,
                details,
                elapsed_ms,
                "transform failed"
            );
        }
    }
}

fn require(name: &str, value: &str) -> Result<(), TransformFailure> {
    if value.trim().is_empty() {
        Err(TransformFailure::missing_parameter(name))
    } else {
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
