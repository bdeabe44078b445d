//! Request and reply value types shared by every transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::status::{STATUS_CREATED, is_success};

/// Transform options keyed by option name. Ordered so rendering and logging are stable.
pub type TransformOptions = BTreeMap<String, String>;

/// A transform request as received from HTTP or the queue.
///
/// Mimetype and extension fields default to empty strings when absent from the wire
/// payload; the dispatcher rejects empty values with a specific message rather than
/// failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Caller-assigned identifier echoed on the reply.
    #[serde(default)]
    pub request_id: String,
    /// Mimetype of the source artifact.
    #[serde(default)]
    pub source_media_type: String,
    /// Requested mimetype of the produced artifact.
    #[serde(default)]
    pub target_media_type: String,
    /// File extension used when naming the produced artifact.
    #[serde(default)]
    pub target_extension: String,
    /// Transform-specific options.
    #[serde(default, rename = "transformRequestOptions")]
    pub options: TransformOptions,
    /// Opaque caller data echoed on the reply for tracing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_data: Option<String>,
    /// Shared-store reference of the source content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    /// Size of the source content in bytes, when known ahead of the transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_size: Option<u64>,
}

impl TransformRequest {
    /// Construct a request with no options, tags or size hint.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        source_media_type: impl Into<String>,
        target_media_type: impl Into<String>,
        target_extension: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            source_media_type: source_media_type.into(),
            target_media_type: target_media_type.into(),
            target_extension: target_extension.into(),
            options: TransformOptions::new(),
            client_data: None,
            source_reference: None,
            source_size: None,
        }
    }
}

/// The single reply produced for an accepted request.
///
/// There is no `Default`: every construction path sets a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReply {
    /// Identifier of the request this reply answers.
    pub request_id: String,
    /// Numeric outcome code (see [`crate::status`]).
    pub status: u16,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Shared-store reference of the produced artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reference: Option<String>,
    /// Client data echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_data: Option<String>,
}

impl TransformReply {
    /// Successful reply pointing at the produced artifact, if it was stored.
    #[must_use]
    pub fn success(request: &TransformRequest, target_reference: Option<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            status: STATUS_CREATED,
            error_details: None,
            target_reference,
            client_data: request.client_data.clone(),
        }
    }

    /// Failed reply for a request that was parsed far enough to know its identity.
    #[must_use]
    pub fn failure(request: &TransformRequest, status: u16, details: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            status,
            error_details: Some(details.into()),
            target_reference: None,
            client_data: request.client_data.clone(),
        }
    }

    /// Failed reply for a message whose request could not be recovered.
    #[must_use]
    pub fn orphan_failure(status: u16, details: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            status,
            error_details: Some(details.into()),
            target_reference: None,
            client_data: None,
        }
    }

    /// Whether the reply reports a successful transform.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::STATUS_BAD_REQUEST;
    use std::error::Error;

    #[test]
    fn request_deserializes_wire_names_and_tolerates_missing_fields() -> Result<(), Box<dyn Error>>
    {
        let request: TransformRequest = serde_json::from_str(
            r#"{
                "requestId": "r-1",
                "sourceMediaType": "application/pdf",
                "targetMediaType": "text/plain",
                "targetExtension": "txt",
                "transformRequestOptions": {"pageLimit": "2"},
                "clientData": "ACS",
                "sourceReference": "abc.pdf",
                "sourceSize": 32
            }"#,
        )?;
        assert_eq!(request.request_id, "r-1");
        assert_eq!(request.options.get("pageLimit").map(String::as_str), Some("2"));
        assert_eq!(request.source_size, Some(32));

        let sparse: TransformRequest = serde_json::from_str(r#"{"requestId": "r-2"}"#)?;
        assert!(sparse.source_media_type.is_empty());
        assert!(sparse.options.is_empty());
        Ok(())
    }

    #[test]
    fn replies_echo_request_identity() {
        let mut request = TransformRequest::new("r-9", "application/pdf", "text/plain", "txt");
        request.client_data = Some("tag".into());

        let ok = TransformReply::success(&request, Some("out.txt".into()));
        assert!(ok.is_success());
        assert_eq!(ok.request_id, "r-9");
        assert_eq!(ok.client_data.as_deref(), Some("tag"));

        let failed = TransformReply::failure(&request, STATUS_BAD_REQUEST, "nope");
        assert!(!failed.is_success());
        assert_eq!(failed.error_details.as_deref(), Some("nope"));
        assert!(failed.target_reference.is_none());
    }

    #[test]
    fn reply_serializes_without_empty_optionals() -> Result<(), Box<dyn Error>> {
        let reply = TransformReply::orphan_failure(500, "boom");
        let value = serde_json::to_value(&reply)?;
        assert_eq!(value["status"], 500);
        assert_eq!(value["errorDetails"], "boom");
        assert!(value.get("targetReference").is_none());
        Ok(())
    }
}
