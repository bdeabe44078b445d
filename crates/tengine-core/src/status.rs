//! Numeric outcome codes carried on transform replies.
//!
//! Reply statuses reuse HTTP semantics so the JSON endpoint can mirror them directly.

/// Transform completed and the target artifact was produced.
pub const STATUS_CREATED: u16 = 201;
/// The request was rejected as client-attributable (bad input, no capability, bad content).
pub const STATUS_BAD_REQUEST: u16 = 400;
/// The engine or its infrastructure failed while serving the request.
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// Returns `true` when the status denotes a successful transform.
#[must_use]
pub const fn is_success(status: u16) -> bool {
    status >= 200 && status < 300
}
