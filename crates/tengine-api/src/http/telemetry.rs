//! HTTP metrics middleware: counts every request by route, status and transform outcome.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use crate::http::constants::{HEADER_REQUEST_ID, TRANSPORT_HTTP};
use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use tengine_telemetry::{Metrics, with_request_context};
use tower::{Layer, Service};
use tracing::debug;

/// Routes whose replies carry a transform result.
const TRANSFORM_ROUTES: [&str; 2] = ["/transform", "/test"];
/// Routes answered by the health checks.
const PROBE_ROUTES: [&str; 2] = ["/live", "/ready"];

/// What a reply means to an operator, independent of the exact status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HttpOutcome {
    /// A transform produced a target.
    Transformed,
    /// The request was refused before or by the transformer.
    Rejected,
    /// The engine failed while handling the request.
    Failed,
    /// A health check reported the engine usable.
    Healthy,
    /// A health check reported the engine unusable.
    Unhealthy,
    /// Any other route answered normally.
    Served,
}

impl HttpOutcome {
    /// Classify a reply on `route`.
    pub(crate) fn classify(route: &str, status: StatusCode) -> Self {
        if TRANSFORM_ROUTES.contains(&route) {
            if status.is_success() {
                Self::Transformed
            } else if status.is_client_error() {
                Self::Rejected
            } else {
                Self::Failed
            }
        } else if PROBE_ROUTES.contains(&route) {
            if status.is_success() {
                Self::Healthy
            } else {
                Self::Unhealthy
            }
        } else if status.is_server_error() {
            Self::Failed
        } else if status.is_client_error() {
            Self::Rejected
        } else {
            Self::Served
        }
    }

    /// Metric label value.
    pub(crate) const fn as_label(self) -> &'static str {
        match self {
            Self::Transformed => "transformed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Served => "served",
        }
    }
}

/// Wraps HTTP services to count requests and run them inside the request context.
#[derive(Clone)]
pub(crate) struct HttpMetricsLayer {
    telemetry: Metrics,
}

impl HttpMetricsLayer {
    pub(crate) const fn new(telemetry: Metrics) -> Self {
        Self { telemetry }
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetricsService {
            inner,
            telemetry: self.telemetry.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct HttpMetricsService<S> {
    inner: S,
    telemetry: Metrics,
}

impl<S, B> Service<Request<B>> for HttpMetricsService<S>
where
    S: Service<Request<B>, Response = axum::response::Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // Unmatched paths share one label so stray URLs cannot grow the series.
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| "unmatched".to_string(), |matched| matched.as_str().to_string());
        let request_id = req
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let telemetry = self.telemetry.clone();
        let fut = self.inner.call(req);

        Box::pin(with_request_context(request_id, TRANSPORT_HTTP, async move {
            let response = fut.await?;
            let status = response.status();
            let outcome = HttpOutcome::classify(&route, status);
            telemetry.inc_http_request(&route, status.as_u16(), outcome.as_label());
            debug!(
                route = %route,
                status = status.as_u16(),
                outcome = outcome.as_label(),
                "http request completed"
            );
            Ok(response)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_routes_split_rejections_from_failures() {
        assert_eq!(
            HttpOutcome::classify("/transform", StatusCode::CREATED),
            HttpOutcome::Transformed
        );
        assert_eq!(
            HttpOutcome::classify("/transform", StatusCode::BAD_REQUEST),
            HttpOutcome::Rejected
        );
        assert_eq!(
            HttpOutcome::classify("/test", StatusCode::PAYLOAD_TOO_LARGE),
            HttpOutcome::Rejected
        );
        assert_eq!(
            HttpOutcome::classify("/transform", StatusCode::INTERNAL_SERVER_ERROR),
            HttpOutcome::Failed
        );
    }

    #[test]
    fn health_and_other_routes_have_their_own_outcomes() {
        assert_eq!(HttpOutcome::classify("/ready", StatusCode::OK), HttpOutcome::Healthy);
        assert_eq!(
            HttpOutcome::classify("/live", StatusCode::INTERNAL_SERVER_ERROR),
            HttpOutcome::Unhealthy
        );
        assert_eq!(HttpOutcome::classify("/version", StatusCode::OK), HttpOutcome::Served);
        assert_eq!(
            HttpOutcome::classify("/metrics", StatusCode::INTERNAL_SERVER_ERROR),
            HttpOutcome::Failed
        );
        assert_eq!(HttpOutcome::Unhealthy.as_label(), "unhealthy");
    }
}
