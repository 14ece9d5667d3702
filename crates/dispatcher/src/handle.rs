//! SinkHandle - a named integrator with its own delivery counters

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use contracts::{CallContext, DownlinkReceiver, Event, IntegrationError, Integrator, Vars};

use crate::metrics::SinkMetrics;

/// Handle to one member of a dispatch set
#[derive(Clone)]
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Backend
    integrator: Arc<dyn Integrator>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl SinkHandle {
    pub fn new(name: impl Into<String>, integrator: Arc<dyn Integrator>) -> Self {
        Self {
            name: name.into(),
            integrator,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn integrator(&self) -> &Arc<dyn Integrator> {
        &self.integrator
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn downlink_channel(&self) -> DownlinkReceiver {
        self.integrator.downlink_channel()
    }

    /// Deliver one event and record the result
    pub async fn send(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &Event,
    ) -> Result<(), IntegrationError> {
        let kind = event.kind();
        let started = Instant::now();
        let result = self.integrator.send(ctx, vars, event).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.record(kind, result.is_ok());
        observability::record_event_dispatched(&self.name, kind, result.is_ok());
        observability::record_dispatch_latency_ms(&self.name, latency_ms);

        match &result {
            Ok(()) => debug!(sink = %self.name, kind = %kind, latency_ms, "Event delivered"),
            Err(e) => warn!(sink = %self.name, kind = %kind, error = %e, "Event delivery failed"),
        }

        result
    }

    pub async fn close(&self) -> Result<(), IntegrationError> {
        self.integrator.close().await
    }
}
