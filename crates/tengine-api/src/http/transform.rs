//! Transform endpoints.
//!
//! `POST /transform` accepts either a multipart upload, answered with the produced bytes,
//! or a JSON request referencing the shared store, answered with a JSON reply whose HTTP
//! status mirrors the reply status. `POST /test` is the multipart form used by manual
//! testing, with options supplied as numbered `name`/`value` pairs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tengine_core::{TransformOptions, TransformRequest};
use tengine_dispatch::{Artifact, DispatchRequest};
use tengine_telemetry::current_request_id;
use tracing::debug;

use crate::http::constants::{
    FIELD_FILE, FIELD_SOURCE_MIMETYPE, FIELD_TARGET_EXTENSION, FIELD_TARGET_MIMETYPE,
    FIELD_TEST_SOURCE_MIMETYPE, FIELD_TEST_TARGET_MIMETYPE, TRANSPORT_HTTP,
};
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Query parameters accepted by the JSON variant.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TransformQuery {
    /// Timeout in milliseconds.
    timeout: Option<u64>,
}

/// A parsed multipart upload.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub(crate) file_name: Option<String>,
    pub(crate) bytes: Option<Vec<u8>>,
    pub(crate) fields: BTreeMap<String, String>,
}

pub(crate) async fn transform(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TransformQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?;
        let form = read_form(multipart).await?;
        return transform_upload(&state, form).await;
    }

    let Json(body) = Json::<TransformRequest>::from_request(request, &state)
        .await
        .map_err(|err| {
            ApiError::bad_request(format!(
                "Failed to deserialize transform request: {}",
                err.body_text()
            ))
        })?;
    let timeout = query.timeout.map(Duration::from_millis);
    let outcome = state
        .service
        .dispatch(DispatchRequest::reference(body, TRANSPORT_HTTP).with_timeout(timeout))
        .await;
    let status =
        StatusCode::from_u16(outcome.reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(outcome.reply)).into_response())
}

pub(crate) async fn test_transform(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = read_form(multipart).await?;
    form.fields = remap_test_fields(form.fields);
    transform_upload(&state, form).await
}

async fn transform_upload(state: &ApiState, mut form: UploadForm) -> Result<Response, ApiError> {
    let bytes = form
        .bytes
        .take()
        .ok_or_else(|| ApiError::bad_request("Required request part 'file' is not present"))?;
    let request = upload_request(&mut form.fields);
    debug!(
        source_media_type = %request.source_media_type,
        target_media_type = %request.target_media_type,
        bytes = bytes.len(),
        "received upload"
    );

    let outcome = state
        .service
        .dispatch(DispatchRequest::upload(
            request,
            form.file_name,
            bytes,
            TRANSPORT_HTTP,
        ))
        .await;
    match outcome.artifact {
        Some(artifact) if outcome.reply.is_success() => artifact_response(artifact),
        _ => Err(ApiError::from_reply_status(
            outcome.reply.status,
            outcome.reply.error_details.unwrap_or_default(),
        )),
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if name == FIELD_FILE {
            form.file_name = field.file_name().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(err.body_text()))?;
            form.bytes = Some(bytes.to_vec());
        } else {
            let value = field
                .text()
                .await
                .map_err(|err| ApiError::bad_request(err.body_text()))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Build the request from form fields; everything left over becomes an option.
fn upload_request(fields: &mut BTreeMap<String, String>) -> TransformRequest {
    let mut take = |name: &str| fields.remove(name).unwrap_or_default();
    let source_media_type = take(FIELD_SOURCE_MIMETYPE);
    let target_media_type = take(FIELD_TARGET_MIMETYPE);
    let target_extension = take(FIELD_TARGET_EXTENSION);
    let mut request = TransformRequest::new(
        current_request_id().unwrap_or_default(),
        source_media_type,
        target_media_type,
        target_extension,
    );
    request.options = std::mem::take(fields)
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect::<TransformOptions>();
    request
}

/// Fold `name<i>`/`value<i>` pairs into options and apply `_sourceMimetype` /
/// `_targetMimetype` overrides.
pub(crate) fn remap_test_fields(fields: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    let mut values = BTreeMap::new();
    let mut remapped = BTreeMap::new();
    let mut overrides = Vec::new();

    for (key, value) in fields {
        if let Some(index) = numbered(&key, "name") {
            names.insert(index.to_owned(), value);
        } else if let Some(index) = numbered(&key, "value") {
            values.insert(index.to_owned(), value);
        } else if key == FIELD_TEST_SOURCE_MIMETYPE {
            overrides.push((FIELD_SOURCE_MIMETYPE, value));
        } else if key == FIELD_TEST_TARGET_MIMETYPE {
            overrides.push((FIELD_TARGET_MIMETYPE, value));
        } else if !key.starts_with('_') {
            remapped.insert(key, value);
        }
    }

    for (index, name) in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if let Some(value) = values.remove(&index).filter(|value| !value.is_empty()) {
            remapped.insert(name.to_owned(), value);
        }
    }
    for (field, value) in overrides {
        if !value.trim().is_empty() {
            remapped.insert(field.to_owned(), value);
        }
    }
    remapped
}

fn numbered<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .filter(|index| !index.is_empty() && index.bytes().all(|byte| byte.is_ascii_digit()))
}

fn artifact_response(artifact: Artifact) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&content_disposition(&artifact.filename))
        .map_err(|_| ApiError::internal("Failed to encode target filename"))?;
    let content_type = HeaderValue::from_str(&artifact.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(artifact.bytes))
        .map_err(|_| ApiError::internal("Failed to build transform response"))
}

/// Bytes escaped in an RFC 5987 `ext-value`: everything but `attr-char`.
const ATTR_CHAR_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition with an RFC 5987 encoded filename.
pub(crate) fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(filename, ATTR_CHAR_ESCAPES)
    )
}
