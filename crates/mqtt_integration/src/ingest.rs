//! Downlink ingestion path
//!
//! Turns a received (topic, payload) pair into a queued `DownlinkCommand`.
//! Every rejection is silent to the publisher: it is logged, counted and
//! reported as a `DropReason`.

use bytes::Bytes;
use codec::Marshaler;
use contracts::{DownlinkCommand, DownlinkSendError, DownlinkSender, KeyValueStore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use topic_template::CompiledTemplate;
use tracing::{debug, warn};

/// Why an inbound message was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DropReason {
    #[error("topic does not match the downlink template")]
    Topic,
    #[error("payload could not be decoded")]
    Decode,
    #[error("fPort must be between 1 and 224")]
    FPort,
    /// Same payload already handled by another instance
    #[error("duplicate downlink")]
    Duplicate,
    #[error("downlink queue full")]
    QueueFull,
    #[error("integration closed")]
    Closed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Topic => "topic",
            DropReason::Decode => "decode",
            DropReason::FPort => "f_port",
            DropReason::Duplicate => "duplicate",
            DropReason::QueueFull => "queue_full",
            DropReason::Closed => "closed",
        }
    }
}

/// Inbound counters
#[derive(Debug, Default)]
pub struct DownlinkMetrics {
    pub received: AtomicU64,
    pub queued: AtomicU64,
    pub dropped_topic: AtomicU64,
    pub dropped_decode: AtomicU64,
    pub dropped_f_port: AtomicU64,
    pub dropped_duplicate: AtomicU64,
    pub dropped_queue_full: AtomicU64,
    pub dropped_closed: AtomicU64,
}

impl DownlinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Topic => &self.dropped_topic,
            DropReason::Decode => &self.dropped_decode,
            DropReason::FPort => &self.dropped_f_port,
            DropReason::Duplicate => &self.dropped_duplicate,
            DropReason::QueueFull => &self.dropped_queue_full,
            DropReason::Closed => &self.dropped_closed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DownlinkMetricsSnapshot {
        DownlinkMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped_topic: self.dropped_topic.load(Ordering::Relaxed),
            dropped_decode: self.dropped_decode.load(Ordering::Relaxed),
            dropped_f_port: self.dropped_f_port.load(Ordering::Relaxed),
            dropped_duplicate: self.dropped_duplicate.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `DownlinkMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownlinkMetricsSnapshot {
    pub received: u64,
    pub queued: u64,
    pub dropped_topic: u64,
    pub dropped_decode: u64,
    pub dropped_f_port: u64,
    pub dropped_duplicate: u64,
    pub dropped_queue_full: u64,
    pub dropped_closed: u64,
}

impl DownlinkMetricsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_topic
            + self.dropped_decode
            + self.dropped_f_port
            + self.dropped_duplicate
            + self.dropped_queue_full
            + self.dropped_closed
    }
}

/// Cross-instance de-duplication of identical payloads
#[derive(Clone)]
pub struct DownlinkLock {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl DownlinkLock {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Store key for a device and payload, shared by every instance on the store
    pub fn key(dev_eui: &contracts::DevEui, payload: &[u8]) -> String {
        format!(
            "lora:as:device:{}:mqtt:lock:{}",
            dev_eui,
            hex::encode(Sha256::digest(payload))
        )
    }
}

impl fmt::Debug for DownlinkLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownlinkLock")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Validates inbound messages and feeds the downlink queue
#[derive(Debug)]
pub struct DownlinkIngest {
    name: String,
    template: CompiledTemplate,
    marshaler: Marshaler,
    sender: DownlinkSender,
    lock: Option<DownlinkLock>,
    metrics: Arc<DownlinkMetrics>,
}

impl DownlinkIngest {
    pub fn new(
        name: impl Into<String>,
        template: CompiledTemplate,
        marshaler: Marshaler,
        sender: DownlinkSender,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            marshaler,
            sender,
            lock: None,
            metrics: Arc::new(DownlinkMetrics::new()),
        }
    }

    /// Enable the de-duplication lock
    pub fn with_lock(mut self, lock: DownlinkLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn metrics(&self) -> Arc<DownlinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle one received message
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Result<(), DropReason> {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);
        observability::record_downlink_received(&self.name);

        match self.ingest(topic, payload).await {
            Ok(()) => {
                self.metrics.queued.fetch_add(1, Ordering::Relaxed);
                observability::record_downlink_queued(&self.name);
                observability::record_downlink_queue_depth(&self.name, self.sender.len());
                Ok(())
            }
            Err(reason) => {
                self.metrics.record_drop(reason);
                observability::record_downlink_dropped(&self.name, reason.as_str());
                Err(reason)
            }
        }
    }

    async fn ingest(&self, topic: &str, payload: &[u8]) -> Result<(), DropReason> {
        let Some(ids) = self.template.match_topic(topic) else {
            warn!(sink = %self.name, topic, "Downlink topic does not match template");
            return Err(DropReason::Topic);
        };

        let mut command = self.marshaler.decode_command(payload).map_err(|e| {
            warn!(sink = %self.name, topic, error = %e, "Failed to decode downlink payload");
            DropReason::Decode
        })?;

        // topic identifiers win over the payload
        command.dev_eui = ids.dev_eui;
        if let Some(application_id) = ids.application_id {
            command.application_id = application_id;
        }

        if !command.has_valid_f_port() {
            warn!(
                sink = %self.name,
                dev_eui = %command.dev_eui,
                f_port = command.f_port,
                "Downlink fPort must be between 1 and 224"
            );
            return Err(DropReason::FPort);
        }

        if let Some(lock) = &self.lock {
            self.acquire(lock, &command, payload).await?;
        }

        self.enqueue(command)
    }

    async fn acquire(
        &self,
        lock: &DownlinkLock,
        command: &DownlinkCommand,
        payload: &[u8],
    ) -> Result<(), DropReason> {
        let key = DownlinkLock::key(&command.dev_eui, payload);
        match lock
            .store
            .set_nx(&key, Bytes::from_static(b"lock"), lock.ttl)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(sink = %self.name, dev_eui = %command.dev_eui, %key, "Downlink already handled");
                Err(DropReason::Duplicate)
            }
            Err(e) => {
                // lock is best-effort: queue anyway
                warn!(sink = %self.name, error = %e, "Downlink lock unavailable");
                Ok(())
            }
        }
    }

    fn enqueue(&self, command: DownlinkCommand) -> Result<(), DropReason> {
        let dev_eui = command.dev_eui;
        let f_port = command.f_port;

        match self.sender.try_send(command) {
            Ok(()) => {
                debug!(sink = %self.name, %dev_eui, f_port, "Downlink command queued");
                Ok(())
            }
            Err(DownlinkSendError::Full(_)) => {
                warn!(sink = %self.name, %dev_eui, "Downlink queue full, command dropped");
                Err(DropReason::QueueFull)
            }
            Err(DownlinkSendError::Closed(_)) => {
                debug!(sink = %self.name, %dev_eui, "Downlink queue closed, command dropped");
                Err(DropReason::Closed)
            }
        }
    }
}
