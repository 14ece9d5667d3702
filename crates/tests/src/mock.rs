//! Recording integrator for dispatch tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use contracts::{
    downlink_queue, AckEvent, CallContext, DownlinkReceiver, DownlinkSender, ErrorEvent, Event,
    IntegrationError, Integrator, JoinEvent, LocationEvent, StatusEvent, TxAckEvent, UplinkEvent,
    Vars,
};

/// Records every delivered event; optionally slow or always failing
pub struct MockIntegrator {
    name: String,
    fail: bool,
    delay: Option<Duration>,
    received: Mutex<Vec<Event>>,
    downlink_tx: DownlinkSender,
    downlink_rx: DownlinkReceiver,
    closed: AtomicBool,
}

impl MockIntegrator {
    pub fn new(name: &str) -> Self {
        let (downlink_tx, downlink_rx) = downlink_queue(4);
        Self {
            name: name.to_string(),
            fail: false,
            delay: None,
            received: Mutex::new(Vec::new()),
            downlink_tx,
            downlink_rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Every send fails with a delivery error
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().unwrap().clone()
    }

    async fn record(&self, ctx: &CallContext, event: Event) -> Result<(), IntegrationError> {
        if let Some(delay) = self.delay {
            ctx.run(tokio::time::sleep(delay)).await?;
        }
        if self.fail {
            return Err(IntegrationError::delivery(&self.name, "mock failure"));
        }
        self.received.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl Integrator for MockIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_uplink(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &UplinkEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Uplink(event.clone())).await
    }

    async fn send_join_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &JoinEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Join(event.clone())).await
    }

    async fn send_ack_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &AckEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Ack(event.clone())).await
    }

    async fn send_error_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &ErrorEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Error(event.clone())).await
    }

    async fn send_status_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &StatusEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Status(event.clone())).await
    }

    async fn send_location_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &LocationEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::Location(event.clone())).await
    }

    async fn send_tx_ack_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &TxAckEvent,
    ) -> Result<(), IntegrationError> {
        self.record(ctx, Event::TxAck(event.clone())).await
    }

    fn downlink_channel(&self) -> DownlinkReceiver {
        self.downlink_rx.clone()
    }

    async fn close(&self) -> Result<(), IntegrationError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(IntegrationError::AlreadyClosed {
                sink: self.name.clone(),
            });
        }
        self.downlink_tx.close();
        Ok(())
    }
}
