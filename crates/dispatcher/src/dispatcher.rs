//! Dispatcher - concurrent fan-out of events to every sink in the set

use arc_swap::ArcSwap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use contracts::{CallContext, DownlinkReceiver, Event, IntegrationError, Integrator, Vars};

use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;

/// Ordered, immutable collection of named sinks
#[derive(Debug, Default, Clone)]
pub struct DispatchSet {
    handles: Vec<SinkHandle>,
}

impl DispatchSet {
    pub fn new(members: Vec<(String, Arc<dyn Integrator>)>) -> Self {
        Self {
            handles: members
                .into_iter()
                .map(|(name, integrator)| SinkHandle::new(name, integrator))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Member names, in set order
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SinkHandle> {
        self.handles.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SinkHandle> {
        self.handles.iter().find(|h| h.name() == name)
    }
}

/// Result of delivering one event to one sink
#[derive(Debug, Clone, PartialEq)]
pub struct SinkOutcome {
    pub sink: String,
    pub result: Result<(), IntegrationError>,
}

impl SinkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// True if every sink succeeded
pub fn all_ok(outcomes: &[SinkOutcome]) -> bool {
    outcomes.iter().all(SinkOutcome::is_ok)
}

/// Sinks that failed, with their errors
pub fn failures(outcomes: &[SinkOutcome]) -> Vec<(&str, &IntegrationError)> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err().map(|e| (o.sink.as_str(), e)))
        .collect()
}

/// Fans events out to the current dispatch set
pub struct Dispatcher {
    set: ArcSwap<DispatchSet>,
}

impl Dispatcher {
    pub fn new(set: DispatchSet) -> Self {
        info!(sinks = set.len(), "Dispatcher created");
        Self {
            set: ArcSwap::from_pointee(set),
        }
    }

    /// Current dispatch set
    pub fn current(&self) -> Arc<DispatchSet> {
        self.set.load_full()
    }

    /// Replace the dispatch set; returns the previous one
    ///
    /// Dispatches already in progress finish against the set they started with.
    /// The caller owns closing the previous members.
    pub fn swap(&self, set: DispatchSet) -> Arc<DispatchSet> {
        info!(sinks = set.len(), "Dispatch set replaced");
        self.set.swap(Arc::new(set))
    }

    /// Deliver `event` to every sink concurrently
    ///
    /// Outcomes are in set order. A failing sink never prevents delivery to
    /// the others.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, ctx, vars, event),
        fields(kind = %event.kind(), application_id = event.application_id())
    )]
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &Event,
    ) -> Vec<SinkOutcome> {
        let set = self.set.load_full();
        let started = Instant::now();

        let outcomes: Vec<SinkOutcome> = join_all(set.iter().map(|handle| async move {
            SinkOutcome {
                sink: handle.name().to_string(),
                result: handle.send(ctx, vars, event).await,
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        if failed > 0 {
            warn!(
                sinks = outcomes.len(),
                failed,
                "Event dispatch completed with failures"
            );
        } else {
            debug!(
                sinks = outcomes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Event dispatched"
            );
        }

        outcomes
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.set
            .load()
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Downlink queue of every sink
    pub fn downlink_channels(&self) -> Vec<(String, DownlinkReceiver)> {
        self.set
            .load()
            .iter()
            .map(|h| (h.name().to_string(), h.downlink_channel()))
            .collect()
    }

    /// Close every sink in the current set
    #[instrument(name = "dispatcher_close_all", skip(self))]
    pub async fn close_all(&self) -> Vec<SinkOutcome> {
        close_set(&self.set.load_full()).await
    }
}

/// Close every member of `set`, in order
pub async fn close_set(set: &DispatchSet) -> Vec<SinkOutcome> {
    let mut outcomes = Vec::with_capacity(set.len());
    for handle in set.iter() {
        let result = handle.close().await;
        if let Err(e) = &result {
            warn!(sink = %handle.name(), error = %e, "Sink close failed");
        }
        outcomes.push(SinkOutcome {
            sink: handle.name().to_string(),
            result,
        });
    }
    info!(sinks = outcomes.len(), "Dispatch set closed");
    outcomes
}
