//! Shared handler state.

use std::sync::Arc;

use tengine_dispatch::{ProbeTester, TransformService};
use tengine_telemetry::Metrics;

/// State shared by every handler.
pub struct ApiState {
    pub(crate) engine_name: String,
    pub(crate) service: TransformService,
    pub(crate) probes: Arc<ProbeTester>,
    pub(crate) metrics: Metrics,
}

impl ApiState {
    /// Bundle the dispatch service and probe tester for the router.
    #[must_use]
    pub fn new(
        engine_name: impl Into<String>,
        service: TransformService,
        probes: Arc<ProbeTester>,
    ) -> Self {
        let metrics = service.metrics().clone();
        Self {
            engine_name: engine_name.into(),
            service,
            probes,
            metrics,
        }
    }
}
