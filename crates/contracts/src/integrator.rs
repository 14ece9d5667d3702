//! Integrator trait - the contract every event sink implements
//!
//! Object-safe so the dispatcher can hold `Arc<dyn Integrator>` regardless of backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    AckEvent, DownlinkReceiver, ErrorEvent, Event, IntegrationError, JoinEvent, LocationEvent,
    StatusEvent, TxAckEvent, UplinkEvent,
};

/// Per-call variables reserved for sink-specific overrides
pub type Vars = HashMap<String, String>;

/// Cancellation and deadline for one outbound call
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// No deadline, not cancellable except through `cancel_token()`
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// Bind to an existing cancellation token
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set the deadline
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the deadline, `None` without one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Drive `fut` until it completes, the token is cancelled, or the deadline passes
    pub async fn run<F, T>(&self, fut: F) -> Result<T, IntegrationError>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(IntegrationError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(IntegrationError::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => {
                    res.map_err(|_| IntegrationError::DeadlineExceeded)
                }
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(IntegrationError::Cancelled),
                value = fut => Ok(value),
            },
        }
    }
}

/// Transport connection state, reported for health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal, after `close()`
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event sink backend
///
/// All implementations must be safe under concurrent `send_*` calls.
#[async_trait]
pub trait Integrator: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    async fn send_uplink(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &UplinkEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_join_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &JoinEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_ack_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &AckEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_error_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &ErrorEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_status_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &StatusEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_location_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &LocationEvent,
    ) -> Result<(), IntegrationError>;

    async fn send_tx_ack_notification(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &TxAckEvent,
    ) -> Result<(), IntegrationError>;

    /// Route an event to the matching `send_*` operation
    async fn send(
        &self,
        ctx: &CallContext,
        vars: Option<&Vars>,
        event: &Event,
    ) -> Result<(), IntegrationError> {
        match event {
            Event::Uplink(e) => self.send_uplink(ctx, vars, e).await,
            Event::Join(e) => self.send_join_notification(ctx, vars, e).await,
            Event::Ack(e) => self.send_ack_notification(ctx, vars, e).await,
            Event::Error(e) => self.send_error_notification(ctx, vars, e).await,
            Event::Status(e) => self.send_status_notification(ctx, vars, e).await,
            Event::Location(e) => self.send_location_notification(ctx, vars, e).await,
            Event::TxAck(e) => self.send_tx_ack_notification(ctx, vars, e).await,
        }
    }

    /// Queue of validated inbound commands
    fn downlink_channel(&self) -> DownlinkReceiver;

    /// Current transport state
    fn connection_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }

    /// Release all resources
    ///
    /// # Errors
    /// `IntegrationError::AlreadyClosed` on the second call
    async fn close(&self) -> Result<(), IntegrationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        assert_eq!(ctx.run(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn test_run_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_millis(10));
        let res = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(res, Err(IntegrationError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let token = CancellationToken::new();
        let ctx = CallContext::with_cancel(token.clone());

        let handle = tokio::spawn(async move {
            ctx.run(tokio::time::sleep(Duration::from_secs(5))).await
        });
        token.cancel();

        assert_eq!(handle.await.unwrap(), Err(IntegrationError::Cancelled));
    }

    #[tokio::test]
    async fn test_run_already_cancelled() {
        let ctx = CallContext::new();
        ctx.cancel_token().cancel();
        assert_eq!(ctx.run(async { 1 }).await, Err(IntegrationError::Cancelled));
    }
}
