//! Sink metrics for observability

use contracts::EventKind;
use std::sync::atomic::{AtomicU64, Ordering};

fn kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::Uplink => 0,
        EventKind::Join => 1,
        EventKind::Ack => 2,
        EventKind::Error => 3,
        EventKind::Status => 4,
        EventKind::Location => 5,
        EventKind::TxAck => 6,
    }
}

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful deliveries
    sent_count: AtomicU64,
    /// Total failed deliveries
    failure_count: AtomicU64,
    /// Deliveries attempted per event kind, in `EventKind::ALL` order
    per_kind: [AtomicU64; 7],
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total sent count
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Attempts for one kind
    pub fn kind_count(&self, kind: EventKind) -> u64 {
        self.per_kind[kind_index(kind)].load(Ordering::Relaxed)
    }

    /// Record the result of one delivery
    pub fn record(&self, kind: EventKind, success: bool) {
        self.per_kind[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
        if success {
            self.sent_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut per_kind = [(EventKind::Uplink, 0); 7];
        for (slot, kind) in per_kind.iter_mut().zip(EventKind::ALL) {
            *slot = (kind, self.kind_count(kind));
        }

        MetricsSnapshot {
            sent_count: self.sent_count(),
            failure_count: self.failure_count(),
            per_kind,
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent_count: u64,
    pub failure_count: u64,
    pub per_kind: [(EventKind, u64); 7],
}

impl MetricsSnapshot {
    /// Attempts for one kind
    pub fn kind_count(&self, kind: EventKind) -> u64 {
        self.per_kind[kind_index(kind)].1
    }

    pub fn total(&self) -> u64 {
        self.sent_count + self.failure_count
    }
}
