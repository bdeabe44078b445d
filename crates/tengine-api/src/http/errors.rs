//! Problem-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Structured API error rendered as a JSON problem body.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    title: &'static str,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProblemDetails {
    status: u16,
    title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, title: &'static str) -> Self {
        Self {
            status,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error").with_detail(detail)
    }

    /// Error for a failed transform reply, keeping its status.
    pub(crate) fn from_reply_status(status: u16, detail: impl Into<String>) -> Self {
        match StatusCode::from_u16(status) {
            Ok(code) if code.is_client_error() => Self::bad_request(detail),
            Ok(code) if code.is_server_error() => {
                Self::new(code, "transform failed").with_detail(detail)
            }
            _ => Self::internal(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            status: self.status.as_u16(),
            title: self.title,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}
