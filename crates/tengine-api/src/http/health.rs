//! Probe, version, capability and metrics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tengine_core::CapabilityDescriptor;
use tengine_dispatch::ProbeKind;
use tracing::{debug, error};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Query accepted by `/transform/config`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigQuery {
    config_version: Option<u32>,
}

pub(crate) async fn live(State(state): State<Arc<ApiState>>) -> Response {
    probe(&state, ProbeKind::Live).await
}

pub(crate) async fn ready(State(state): State<Arc<ApiState>>) -> Response {
    probe(&state, ProbeKind::Ready).await
}

async fn probe(state: &ApiState, kind: ProbeKind) -> Response {
    let outcome = state.probes.check(kind).await;
    let status = if outcome.healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, outcome.message).into_response()
}

pub(crate) async fn version(State(state): State<Arc<ApiState>>) -> String {
    format!(
        "{} {} available",
        state.engine_name,
        env!("CARGO_PKG_VERSION")
    )
}

pub(crate) async fn transform_config(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ConfigQuery>,
) -> Json<CapabilityDescriptor> {
    debug!(config_version = ?query.config_version, "serving capability snapshot");
    Json(state.service.index().descriptor(&state.engine_name))
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.metrics.render() {
        Ok(body) => Ok((
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response()),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
