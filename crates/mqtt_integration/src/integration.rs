//! MqttIntegration - publish events to, and receive commands from, an MQTT broker

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use codec::Marshaler;
use contracts::{
    downlink_queue, AckEvent, CallContext, ConnectionState, DownlinkReceiver, DownlinkSender,
    ErrorEvent, EventMessage, IntegrationError, Integrator, JoinEvent, KeyValueStore,
    LocationEvent, MqttIntegrationConfig, StatusEvent, TxAckEvent, UplinkEvent, Vars,
};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, SubscribeReasonCode};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::ingest::{DownlinkIngest, DownlinkLock, DownlinkMetrics, DownlinkMetricsSnapshot};
use crate::options::{build_mqtt_options, qos_from_level, REQUEST_CHANNEL_CAPACITY};
use crate::outbound::Outbound;
use crate::supervisor::{SharedConnection, Subscription, Supervisor};
use crate::topics::CompiledTopics;

/// How long `close()` waits for the supervisor to exit
const SUPERVISOR_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// MQTT-bound integrator
pub struct MqttIntegration {
    name: String,
    client: AsyncClient,
    outbound: Outbound,
    subscription: Subscription,
    shared: Arc<SharedConnection>,
    downlink_tx: DownlinkSender,
    downlink_rx: DownlinkReceiver,
    downlink_metrics: Arc<DownlinkMetrics>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl MqttIntegration {
    /// Validate config, connect, subscribe and start the supervisor
    ///
    /// # Errors
    /// - `Config` for invalid templates, server address or limits
    /// - `Connection` when the broker cannot be reached within `connect_timeout_ms`
    #[instrument(name = "mqtt_integration_connect", skip(name, config, store), fields(sink = %name))]
    pub async fn connect(
        name: &str,
        config: &MqttIntegrationConfig,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Result<Self, IntegrationError> {
        let topics = CompiledTopics::compile(&config.topics)
            .map_err(|(field, e)| IntegrationError::config(name, format!("{}: {}", field, e)))?;
        let qos = qos_from_level(config.qos).map_err(|e| IntegrationError::config(name, e))?;
        if config.downlink_queue_size == 0 {
            return Err(IntegrationError::config(
                name,
                "downlink_queue_size must be greater than 0",
            ));
        }
        let options = build_mqtt_options(name, config)?;
        let marshaler = Marshaler::from(config.marshaler);

        let (downlink_tx, downlink_rx) = downlink_queue(config.downlink_queue_size);
        let mut ingest = DownlinkIngest::new(
            name,
            topics.downlink().clone(),
            marshaler,
            downlink_tx.clone(),
        );
        if let Some(store) = store.filter(|_| config.downlink_lock_ttl_ms > 0) {
            ingest = ingest.with_lock(DownlinkLock::new(
                store,
                Duration::from_millis(config.downlink_lock_ttl_ms),
            ));
        }
        let ingest = Arc::new(ingest);

        let subscription = Subscription {
            pattern: topics.downlink().subscription_pattern(),
            qos,
        };

        let shared = Arc::new(SharedConnection::new(name));
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        tokio::time::timeout(
            connect_timeout,
            handshake(&client, &mut event_loop, &subscription, &ingest),
        )
        .await
        .map_err(|_| {
            IntegrationError::connection(
                name,
                format!("no connection to {} within {:?}", config.server, connect_timeout),
            )
        })?
        .map_err(|e| IntegrationError::connection(name, e))?;

        shared.set_state(ConnectionState::Connected);
        info!(
            sink = %name,
            server = %config.server,
            subscription = %subscription.pattern,
            marshaler = %marshaler,
            "MQTT integration connected"
        );

        let cancel = CancellationToken::new();
        let supervisor = Supervisor {
            name: name.to_string(),
            client: client.clone(),
            event_loop,
            subscription: subscription.clone(),
            ingest: Arc::clone(&ingest),
            shared: Arc::clone(&shared),
            backoff: reconnect_backoff(config),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(supervisor.run());

        Ok(Self {
            name: name.to_string(),
            client,
            outbound: Outbound::new(name, topics, marshaler, qos, config.retain),
            subscription,
            shared,
            downlink_tx,
            downlink_rx,
            downlink_metrics: ingest.metrics(),
            cancel,
            supervisor: Mutex::new(Some(handle)),
        })
    }

    /// Inbound subscription pattern
    pub fn subscription_pattern(&self) -> &str {
        &self.subscription.pattern
    }

    /// Watch connection state changes
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.subscribe()
    }

    pub fn downlink_metrics(&self) -> DownlinkMetricsSnapshot {
        self.downlink_metrics.snapshot()
    }

    async fn publish<M>(&self, ctx: &CallContext, event: &M) -> Result<(), IntegrationError>
    where
        M: EventMessage + prost::Message + Serialize,
    {
        if self.shared.is_closed() {
            return Err(IntegrationError::Closed {
                sink: self.name.clone(),
            });
        }
        if !self.shared.is_healthy() {
            return Err(IntegrationError::NotConnected {
                sink: self.name.clone(),
            });
        }

        let message = self.outbound.prepare(event)?;
        debug!(
            sink = %self.name,
            topic = %message.topic,
            qos = ?self.outbound.qos(),
            kind = %message.kind,
            "Publishing event"
        );

        ctx.run(self.client.publish(
            message.topic,
            self.outbound.qos(),
            self.outbound.retain(),
            message.payload,
        ))
        .await?
        .map_err(|e| IntegrationError::delivery(&self.name, e.to_string()))
    }
}

/// Drive the event loop until CONNACK, then subscribe and wait for SUBACK
async fn handshake(
    client: &AsyncClient,
    event_loop: &mut EventLoop,
    subscription: &Subscription,
    ingest: &DownlinkIngest,
) -> Result<(), String> {
    loop {
        match event_loop.poll().await.map_err(|e| e.to_string())? {
            Event::Incoming(Packet::ConnAck(_)) => break,
            other => debug!(event = ?other, "MQTT event before CONNACK"),
        }
    }

    client
        .subscribe(subscription.pattern.clone(), subscription.qos)
        .await
        .map_err(|e| format!("subscribe to '{}': {}", subscription.pattern, e))?;

    loop {
        match event_loop.poll().await.map_err(|e| e.to_string())? {
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|c| matches!(c, SubscribeReasonCode::Failure))
                {
                    return Err(format!(
                        "subscription to '{}' rejected by broker",
                        subscription.pattern
                    ));
                }
                return Ok(());
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if let Err(reason) = ingest.handle(&publish.topic, &publish.payload).await {
                    debug!(
                        topic = %publish.topic,
                        reason = reason.as_str(),
                        "Downlink message dropped during handshake"
                    );
                }
            }
            _ => {}
        }
    }
}

fn reconnect_backoff(config: &MqttIntegrationConfig) -> ExponentialBackoff {
    use backoff::backoff::Backoff;

    let initial = Duration::from_millis(config.reconnect_initial_interval_ms.max(1));
    let mut backoff = ExponentialBackoff {
        initial_interval: initial,
        max_interval: Duration::from_millis(config.reconnect_max_interval_ms).max(initial),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    };
    backoff.reset();
    backoff
}

#[async_trait]
impl Integrator for MqttIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "mqtt_send_uplink", skip_all, fields(sink = %self.name))]
    async fn send_uplink(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &UplinkEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_join", skip_all, fields(sink = %self.name))]
    async fn send_join_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &JoinEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_ack", skip_all, fields(sink = %self.name))]
    async fn send_ack_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &AckEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_error", skip_all, fields(sink = %self.name))]
    async fn send_error_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &ErrorEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_status", skip_all, fields(sink = %self.name))]
    async fn send_status_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &StatusEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_location", skip_all, fields(sink = %self.name))]
    async fn send_location_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &LocationEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    #[instrument(name = "mqtt_send_tx_ack", skip_all, fields(sink = %self.name))]
    async fn send_tx_ack_notification(
        &self,
        ctx: &CallContext,
        _vars: Option<&Vars>,
        event: &TxAckEvent,
    ) -> Result<(), IntegrationError> {
        self.publish(ctx, event).await
    }

    fn downlink_channel(&self) -> DownlinkReceiver {
        self.downlink_rx.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    #[instrument(name = "mqtt_integration_close", skip(self), fields(sink = %self.name))]
    async fn close(&self) -> Result<(), IntegrationError> {
        if !self.shared.mark_closed() {
            return Err(IntegrationError::AlreadyClosed {
                sink: self.name.clone(),
            });
        }

        // supervisor unsubscribes and disconnects on its way out
        self.cancel.cancel();
        self.downlink_tx.close();

        let handle = self.supervisor.lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SUPERVISOR_JOIN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                warn!(sink = %self.name, "MQTT supervisor did not stop in time, aborting");
                handle.abort();
            }
        }

        self.shared.set_state(ConnectionState::Closed);
        info!(sink = %self.name, "MQTT integration closed");
        Ok(())
    }
}

impl Drop for MqttIntegration {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
