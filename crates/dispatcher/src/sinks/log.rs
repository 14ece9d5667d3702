//! LogIntegrator - logs event summaries via tracing

use async_trait::async_trait;
use contracts::{
    downlink_queue, AckEvent, CallContext, DownlinkReceiver, DownlinkSender, ErrorEvent,
    EventMessage, IntegrationError, Integrator, JoinEvent, LocationEvent, StatusEvent, TxAckEvent,
    UplinkEvent, Vars,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument};

/// Sink that logs event summaries for debugging
pub struct LogIntegrator {
    name: String,
    downlink_tx: DownlinkSender,
    downlink_rx: DownlinkReceiver,
    closed: AtomicBool,
}

impl LogIntegrator {
    /// Create a new LogIntegrator with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let (downlink_tx, downlink_rx) = downlink_queue(1);
        Self {
            name: name.into(),
            downlink_tx,
            downlink_rx,
            closed: AtomicBool::new(false),
        }
    }

    fn write<M: EventMessage>(&self, vars: Option<&Vars>, event: &M) -> Result<(), IntegrationError> {
        let kind = M::KIND;
        let dev_eui = hex::encode(event.dev_eui_bytes());

        info!(
            sink = %self.name,
            kind = %kind,
            application_id = event.application_id(),
            dev_eui = %dev_eui,
            vars = vars.map_or(0, |v| v.len()),
            "Event received"
        );
        Ok(())
    }
}

#[async_trait]
impl Integrator for LogIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_uplink(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &UplinkEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_join_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &JoinEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_ack_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &AckEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_error_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &ErrorEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_status_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &StatusEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_location_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &LocationEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    async fn send_tx_ack_notification(
        &self,
        _ctx: &CallContext,
        vars: Option<&Vars>,
        event: &TxAckEvent,
    ) -> Result<(), IntegrationError> {
        self.write(vars, event)
    }

    /// Never receives anything
    fn downlink_channel(&self) -> DownlinkReceiver {
        self.downlink_rx.clone()
    }

    #[instrument(name = "log_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&self) -> Result<(), IntegrationError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(IntegrationError::AlreadyClosed {
                sink: self.name.clone(),
            });
        }
        self.downlink_tx.close();
        info!(sink = %self.name, "LogIntegrator closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Event;
    use std::time::Duration;

    fn uplink() -> UplinkEvent {
        UplinkEvent {
            application_id: 1,
            dev_eui: vec![1, 2, 3, 4, 5, 6, 7, 8],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_log_sink_send() {
        let sink = LogIntegrator::new("test_log");
        let result = sink.send_uplink(&CallContext::new(), None, &uplink()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_short_dev_eui() {
        let sink = LogIntegrator::new("test_log");
        let event = Event::Status(StatusEvent {
            dev_eui: vec![1, 2],
            ..Default::default()
        });
        assert!(sink.send(&CallContext::new(), None, &event).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogIntegrator::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }

    #[tokio::test]
    async fn test_close_unblocks_downlink_consumer() {
        let sink = LogIntegrator::new("log");
        let rx = sink.downlink_channel();
        assert!(rx.try_recv().is_none());

        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        sink.close().await.unwrap();
        assert_eq!(waiter.await.unwrap(), None);
        assert!(matches!(
            sink.close().await,
            Err(IntegrationError::AlreadyClosed { .. })
        ));
    }
}
