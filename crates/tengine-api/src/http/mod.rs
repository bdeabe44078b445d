//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names.
pub mod constants;
/// Problem response helpers.
pub mod errors;
/// Probe, version, capability and metrics endpoints.
pub mod health;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
/// Transform endpoints.
pub mod transform;
