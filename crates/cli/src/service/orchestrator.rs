//! Service orchestrator - connects integrations and drains their downlink queues.
//!
//! The downlink consumers stand in for the network core: they log every
//! command and count it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DownlinkReceiver, KeyValueStore, MemoryStore, ServiceConfig};
use dispatcher::{build_dispatch_set, failures, Dispatcher};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::ServiceStats;

/// Service run options
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Validated configuration
    pub config: ServiceConfig,

    /// Stop after this long (None = until shutdown signal)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Long-running integration service
pub struct Service {
    options: ServiceOptions,
}

impl Service {
    pub fn new(options: ServiceOptions) -> Self {
        Self { options }
    }

    /// Run until `shutdown` resolves or the timeout elapses
    pub async fn run<F>(self, shutdown: F) -> Result<ServiceStats>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();

        if let Some(port) = self.options.metrics_port {
            observability::init_metrics_only(port)?;
        }

        // downlink lock store, shared by every integration of this process
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let set = build_dispatch_set(&self.options.config.integrations, Some(store))
            .await
            .context("Failed to create integrations")?;
        let dispatcher = Dispatcher::new(set);

        info!(
            integrations = ?dispatcher.current().names(),
            "Integrations connected"
        );

        let consumers: Vec<(String, JoinHandle<u64>)> = dispatcher
            .downlink_channels()
            .into_iter()
            .map(|(name, rx)| {
                let task_name = name.clone();
                (name, tokio::spawn(consume_downlinks(task_name, rx)))
            })
            .collect();

        let timeout = async {
            match self.options.timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown => {
                warn!("Received shutdown signal, closing integrations...");
            }
            _ = timeout => {
                info!("Run timeout reached, closing integrations...");
            }
        }

        let close_outcomes = dispatcher.close_all().await;
        let close_failures = failures(&close_outcomes).len();

        // consumers finish once their queues are closed and drained
        let mut downlinks = BTreeMap::new();
        for (name, handle) in consumers {
            match handle.await {
                Ok(count) => {
                    downlinks.insert(name, count);
                }
                Err(e) => warn!(sink = %name, error = %e, "Downlink consumer failed"),
            }
        }

        Ok(ServiceStats {
            duration: start.elapsed(),
            active_sinks: close_outcomes.len(),
            downlinks,
            sink_metrics: dispatcher.metrics(),
            close_failures,
        })
    }
}

/// Drain one downlink queue until it is closed
async fn consume_downlinks(sink: String, rx: DownlinkReceiver) -> u64 {
    let mut count = 0u64;

    while let Some(command) = rx.recv().await {
        count += 1;
        observability::record_downlink_queue_depth(&sink, rx.len());
        info!(
            sink = %sink,
            application_id = command.application_id,
            dev_eui = %command.dev_eui,
            f_port = command.f_port,
            confirmed = command.confirmed,
            bytes = command.data.len(),
            "Downlink command received"
        );
    }

    count
}
