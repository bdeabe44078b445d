//! Shared HTTP constants (headers, form field names, limits).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const FIELD_FILE: &str = "file";
pub(crate) const FIELD_SOURCE_MIMETYPE: &str = "sourceMimetype";
pub(crate) const FIELD_TARGET_MIMETYPE: &str = "targetMimetype";
pub(crate) const FIELD_TARGET_EXTENSION: &str = "targetExtension";
pub(crate) const FIELD_TEST_SOURCE_MIMETYPE: &str = "_sourceMimetype";
pub(crate) const FIELD_TEST_TARGET_MIMETYPE: &str = "_targetMimetype";

pub(crate) use tengine_dispatch::TRANSPORT_HTTP;
