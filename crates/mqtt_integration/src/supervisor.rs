//! Connection supervisor
//!
//! Owns the rumqttc `EventLoop` for the lifetime of the integration:
//! - drives the connection, reconnecting with exponential backoff
//! - resubscribes when the broker reports no session
//! - forwards publishes to the downlink ingestion path inline

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use contracts::ConnectionState;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Outgoing, Packet, QoS, SubscribeReasonCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::DownlinkIngest;

/// Upper bound on the graceful disconnect after cancellation
const DISCONNECT_DRAIN: Duration = Duration::from_secs(1);

/// Connection flags shared between the supervisor and callers
#[derive(Debug)]
pub(crate) struct SharedConnection {
    name: String,
    healthy: AtomicBool,
    closed: AtomicBool,
    state_tx: watch::Sender<ConnectionState>,
}

impl SharedConnection {
    pub fn new(name: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            name: name.into(),
            healthy: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state_tx,
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.healthy
            .store(state == ConnectionState::Connected, Ordering::Release);
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            observability::record_connection_state(&self.name, state);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed; returns false if it already was
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Inbound subscription
#[derive(Debug, Clone)]
pub(crate) struct Subscription {
    pub pattern: String,
    pub qos: QoS,
}

pub(crate) struct Supervisor {
    pub name: String,
    pub client: AsyncClient,
    pub event_loop: EventLoop,
    pub subscription: Subscription,
    pub ingest: Arc<DownlinkIngest>,
    pub shared: Arc<SharedConnection>,
    pub backoff: ExponentialBackoff,
    pub cancel: CancellationToken,
}

impl Supervisor {
    /// Drive the event loop until cancelled
    pub async fn run(mut self) {
        info!(sink = %self.name, "MQTT supervisor started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.event_loop.poll() => match result {
                    Ok(event) => self.on_event(event).await,
                    Err(e) => {
                        if !self.on_error(e).await {
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        info!(sink = %self.name, "MQTT supervisor stopped");
    }

    async fn on_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                info!(
                    sink = %self.name,
                    session_present = ack.session_present,
                    "MQTT connection established"
                );
                self.backoff.reset();
                self.shared.set_state(ConnectionState::Connected);

                if !ack.session_present {
                    // request channel is drained by this loop, so never await here
                    if let Err(e) = self
                        .client
                        .try_subscribe(self.subscription.pattern.clone(), self.subscription.qos)
                    {
                        warn!(sink = %self.name, error = %e, "Failed to queue resubscribe");
                    } else {
                        debug!(sink = %self.name, topic = %self.subscription.pattern, "Resubscribing");
                    }
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                debug!(
                    sink = %self.name,
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "Downlink message received"
                );
                if let Err(reason) = self.ingest.handle(&publish.topic, &publish.payload).await {
                    debug!(
                        sink = %self.name,
                        topic = %publish.topic,
                        reason = reason.as_str(),
                        "Downlink message dropped"
                    );
                }
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|c| matches!(c, SubscribeReasonCode::Failure))
                {
                    warn!(sink = %self.name, topic = %self.subscription.pattern, "Subscription rejected by broker");
                } else {
                    debug!(sink = %self.name, topic = %self.subscription.pattern, "Subscribed");
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                info!(sink = %self.name, "MQTT server sent disconnect");
                self.shared.set_state(ConnectionState::Disconnected);
            }
            Event::Incoming(Packet::PingResp) => {}
            other => {
                debug!(sink = %self.name, event = ?other, "MQTT event");
            }
        }
    }

    /// Returns false when cancelled during the backoff
    async fn on_error(&mut self, error: ConnectionError) -> bool {
        self.shared.set_state(ConnectionState::Disconnected);

        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.backoff.max_interval);
        warn!(
            sink = %self.name,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "MQTT connection error, reconnecting"
        );

        tokio::select! {
            _ = self.cancel.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }

        self.shared.set_state(ConnectionState::Connecting);
        true
    }

    /// Best-effort unsubscribe + disconnect, bounded by `DISCONNECT_DRAIN`
    async fn shutdown(&mut self) {
        if !self.shared.is_healthy() {
            return;
        }

        let _ = self.client.try_unsubscribe(self.subscription.pattern.clone());
        if self.client.try_disconnect().is_err() {
            return;
        }

        let drain = async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };

        if tokio::time::timeout(DISCONNECT_DRAIN, drain).await.is_err() {
            debug!(sink = %self.name, "MQTT disconnect did not complete in time");
        }
    }
}
