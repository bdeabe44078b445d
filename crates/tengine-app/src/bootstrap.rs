//! Engine bootstrap: load the descriptor, wire the dispatch core, and start the transports.
//!
//! # Design
//! - Dependencies are resolved up front so every wiring failure surfaces before a listener
//!   is bound.
//! - The HTTP listener drives the process lifetime; queue workers drain and stop after it.

use std::future::Future;
use std::sync::Arc;

use tengine_api::{ApiServer, ApiState};
use tengine_config::{EngineConfig, QueueConfig};
use tengine_core::{CapabilityIndex, ProbeTimingModel};
use tengine_dispatch::{ProbeTester, TransformService, TransformServiceDeps};
use tengine_exec::ProcessExecutor;
use tengine_fsops::{SharedFileStore, TempFileManager};
use tengine_queue::{MemoryBroker, QueueTransformService, WorkerPool, spawn_workers};
use tengine_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Queued requests buffered per worker before senders wait.
const QUEUE_BUFFER_PER_WORKER: usize = 16;

/// Inputs required to boot the engine.
pub(crate) struct BootstrapDependencies {
    config: EngineConfig,
    index: CapabilityIndex,
}

impl BootstrapDependencies {
    /// Load the descriptor named by the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let (config, index) = tengine_config::load_from_env()
            .map_err(|err| AppError::config("config.load_from_env", err))?;
        Ok(Self { config, index })
    }
}

/// Entry point for the engine boot sequence.
///
/// # Errors
///
/// Returns an error if configuration loading, dependency wiring, or the HTTP listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence over injected dependencies; returns once `shutdown` resolves.
pub(crate) async fn run_app_with<F>(
    dependencies: BootstrapDependencies,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let BootstrapDependencies { config, index } = dependencies;
    tengine_telemetry::init_logging(&LoggingConfig {
        level: &config.logging.level,
        format: LogFormat::from_setting(config.logging.format.as_deref()),
        build_sha: build_sha(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(config.engine_name.clone());

    info!(
        engine = %config.engine_name,
        transformers = index.len(),
        "transform engine bootstrap starting"
    );
    log_capabilities(&index);

    let engine = Engine::build(&config, index)?;
    let queue = config
        .queue
        .enabled
        .then(|| engine.start_queue(&config.queue));

    let server = ApiServer::new(
        ApiState::new(
            config.engine_name.clone(),
            engine.service.clone(),
            Arc::clone(&engine.probes),
        ),
        config.http.max_upload_bytes,
    );
    info!(addr = %config.http.bind_addr, "launching HTTP listener");
    let served = server.serve(config.http.bind_addr, shutdown).await;

    if let Some(queue) = queue {
        queue.shutdown().await;
    }
    served.map_err(|err| AppError::api_server("api_server.serve", err))?;

    info!("transform engine shutdown complete");
    Ok(())
}

/// Wired dispatch core shared by every transport.
pub(crate) struct Engine {
    service: TransformService,
    probes: Arc<ProbeTester>,
    metrics: Metrics,
}

impl Engine {
    pub(crate) fn build(config: &EngineConfig, index: CapabilityIndex) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let temp = TempFileManager::new(config.work_dir.clone())
            .map_err(|err| AppError::fsops("temp.new", err))?;
        let store = SharedFileStore::new(config.store_dir.clone())
            .map_err(|err| AppError::fsops("store.new", err))?;

        let service = TransformService::new(TransformServiceDeps {
            index: Arc::new(index),
            temp,
            store: Arc::new(store),
            executor: Arc::new(ProcessExecutor::new()),
            metrics: metrics.clone(),
            default_timeout: config.transform.default_timeout(),
        });
        let model = Arc::new(ProbeTimingModel::new(
            config.probe.tolerance_percent,
            config.probe.ramp_up,
        ));
        let probes = ProbeTester::new(
            config.engine_name.clone(),
            service.clone(),
            model,
            config.probe.test.clone(),
        )
        .map_err(|err| AppError::dispatch("probe.new", err))?;

        Ok(Self {
            service,
            probes: Arc::new(probes),
            metrics,
        })
    }

    pub(crate) fn start_queue(&self, settings: &QueueConfig) -> QueueRuntime {
        let broker = Arc::new(MemoryBroker::new(
            settings.concurrency.max(1) * QUEUE_BUFFER_PER_WORKER,
        ));
        let queue = Arc::new(QueueTransformService::new(
            Arc::new(self.service.clone()),
            Arc::clone(&broker) as Arc<dyn tengine_queue::ReplyPublisher>,
            self.metrics.clone(),
        ));
        let workers = spawn_workers(queue, Arc::clone(&broker), settings.concurrency);
        info!(
            queue = %settings.request_queue,
            workers = workers.len(),
            "queue workers started"
        );
        QueueRuntime { broker, workers }
    }
}

/// Running queue transport.
pub(crate) struct QueueRuntime {
    broker: Arc<MemoryBroker>,
    workers: WorkerPool,
}

impl QueueRuntime {
    /// Stop accepting messages and wait for in-flight work to finish.
    pub(crate) async fn shutdown(self) {
        self.broker.close().await;
        self.workers.join().await;
        info!("queue workers stopped");
    }
}

fn log_capabilities(index: &CapabilityIndex) {
    for definition in index.definitions() {
        let pairs = definition
            .supported
            .iter()
            .map(|pair| format!("{} -> {}", pair.source_media_type, pair.target_media_type))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            transformer = %definition.name,
            pipeline = definition.is_pipeline(),
            pairs = %pairs,
            "registered transformer"
        );
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
