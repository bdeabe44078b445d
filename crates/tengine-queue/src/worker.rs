//! Fixed-size worker pool draining a [`MessageSource`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::message::MessageSource;
use crate::service::{MessageOutcome, QueueTransformService};

/// Handles of the spawned workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit after the source closes.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!(error = %err, "queue worker terminated abnormally");
            }
        }
    }

    /// Stop every worker immediately.
    pub fn abort(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// Spawn `concurrency` workers, each handling one message at a time end to end.
pub fn spawn_workers<S>(
    service: Arc<QueueTransformService>,
    source: Arc<S>,
    concurrency: usize,
) -> WorkerPool
where
    S: MessageSource + 'static,
{
    let workers = (0..concurrency.max(1))
        .map(|worker| {
            let service = Arc::clone(&service);
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                debug!(worker, "queue worker started");
                while let Some(message) = source.receive().await {
                    if let MessageOutcome::ReplyFailed { status } =
                        service.process(&message).await
                    {
                        debug!(worker, status, "reply was not delivered");
                    }
                }
                debug!(worker, "queue worker stopped");
            })
        })
        .collect::<Vec<_>>();
    info!(workers = workers.len(), "queue workers started");
    WorkerPool { workers }
}
