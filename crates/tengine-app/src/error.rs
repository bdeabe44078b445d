//! # Design
//!
//! - Centralize application-level errors for bootstrap and transport startup.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tengine_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tengine_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tengine_telemetry::TelemetryError,
    },
    /// Work or store directory preparation failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: tengine_fsops::FsOpsError,
    },
    /// Dispatch wiring failed.
    #[error("dispatch setup failed")]
    Dispatch {
        /// Operation identifier.
        operation: &'static str,
        /// Source dispatch error.
        source: tengine_dispatch::DispatchError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tengine_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tengine_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tengine_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: tengine_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn dispatch(
        operation: &'static str,
        source: tengine_dispatch::DispatchError,
    ) -> Self {
        Self::Dispatch { operation, source }
    }
}
