//! Context propagation helpers for request and application spans.
//!
//! # Design
//! - Keeps the active request identifier in task-local storage so log lines deep in
//!   dispatch can be tagged without threading it through every call.
//! - Provides an application-level span guard carrying engine name and build info.

use std::future::Future;
use std::sync::Arc;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(engine: impl Into<String>) -> Self {
        let engine = engine.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", engine = %engine, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Retrieve the active request identifier, if one is set.
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE_REQUEST_CONTEXT
        .try_with(|ctx| ctx.request_id.as_ref().to_string())
        .ok()
}

/// Retrieve the transport serving the active request, if one is set.
#[must_use]
pub fn current_transport() -> Option<&'static str> {
    ACTIVE_REQUEST_CONTEXT.try_with(|ctx| ctx.transport).ok()
}

/// Execute the provided future with the supplied request context available to downstream spans.
pub async fn with_request_context<Fut, T>(
    request_id: impl Into<String>,
    transport: &'static str,
    fut: Fut,
) -> T
where
    Fut: Future<Output = T>,
{
    let context = RequestContext {
        request_id: Arc::from(request_id.into()),
        transport,
    };
    ACTIVE_REQUEST_CONTEXT.scope(context, fut).await
}

#[derive(Clone)]
struct RequestContext {
    request_id: Arc<str>,
    transport: &'static str,
}

tokio::task_local! {
    static ACTIVE_REQUEST_CONTEXT: RequestContext;
}
