//! DownlinkCommand - inbound payload from an integration, consumed by the network core
//!
//! Commands flow through a bounded MPMC queue: the integration's receive loop is the
//! only producer and never blocks, consumers may wait or poll.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::DevEui;

/// Lowest frame port an application may use
pub const MIN_F_PORT: u32 = 1;

/// Highest frame port an application may use (225..=255 are reserved)
pub const MAX_F_PORT: u32 = 224;

/// Request to transmit data to a device
#[derive(Debug, Clone, PartialEq)]
pub struct DownlinkCommand {
    /// Application the device belongs to
    pub application_id: u64,

    /// Target device
    pub dev_eui: DevEui,

    /// Request a confirmed downlink
    pub confirmed: bool,

    /// Frame port (1..=224)
    pub f_port: u32,

    /// Raw payload
    pub data: Bytes,

    /// Opaque structured value, carried for inspection only
    pub object: Option<serde_json::Value>,
}

impl DownlinkCommand {
    /// Whether `f_port` is inside the application port range
    #[inline]
    pub fn has_valid_f_port(&self) -> bool {
        (MIN_F_PORT..=MAX_F_PORT).contains(&self.f_port)
    }
}

/// Why a command could not be queued
#[derive(Debug, Error)]
pub enum DownlinkSendError {
    /// Queue at capacity
    #[error("downlink queue full")]
    Full(DownlinkCommand),

    /// Queue closed by its owner
    #[error("downlink queue closed")]
    Closed(DownlinkCommand),
}

/// Why no command was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DownlinkRecvError {
    /// Nothing arrived before the deadline
    #[error("timed out waiting for downlink command")]
    Timeout,

    /// Queue closed and drained
    #[error("downlink queue closed")]
    Closed,
}

/// Create a bounded downlink queue
pub fn downlink_queue(capacity: usize) -> (DownlinkSender, DownlinkReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    (DownlinkSender { tx }, DownlinkReceiver { rx })
}

/// Producer half, owned by the integration
#[derive(Debug, Clone)]
pub struct DownlinkSender {
    tx: async_channel::Sender<DownlinkCommand>,
}

impl DownlinkSender {
    /// Enqueue without waiting
    pub fn try_send(&self, command: DownlinkCommand) -> Result<(), DownlinkSendError> {
        self.tx.try_send(command).map_err(|e| match e {
            async_channel::TrySendError::Full(c) => DownlinkSendError::Full(c),
            async_channel::TrySendError::Closed(c) => DownlinkSendError::Closed(c),
        })
    }

    /// Close the queue; waiting consumers wake up once it is drained
    ///
    /// Returns false if it was already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, handed to the network core
#[derive(Debug, Clone)]
pub struct DownlinkReceiver {
    rx: async_channel::Receiver<DownlinkCommand>,
}

impl DownlinkReceiver {
    /// Wait for the next command; `None` once the queue is closed and empty
    pub async fn recv(&self) -> Option<DownlinkCommand> {
        self.rx.recv().await.ok()
    }

    /// Wait for the next command, at most `timeout`
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<DownlinkCommand, DownlinkRecvError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Ok(command)) => Ok(command),
            Ok(Err(_)) => Err(DownlinkRecvError::Closed),
            Err(_) => Err(DownlinkRecvError::Timeout),
        }
    }

    /// Take a command if one is ready
    pub fn try_recv(&self) -> Option<DownlinkCommand> {
        self.rx.try_recv().ok()
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }
}
