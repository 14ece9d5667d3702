//! # MQTT Integration
//!
//! Transport-bound `Integrator` over an MQTT broker (rumqttc).
//!
//! Outbound: each event is encoded with the configured marshaler and published
//! to the topic rendered from its kind's template. No retry, no buffering.
//!
//! Inbound: the downlink template is subscribed with wildcarded identifiers;
//! matching messages are decoded, validated and queued for the network core.
//!
//! ```text
//! Integrator::send_* ─► Outbound::prepare ─► AsyncClient::publish
//! EventLoop::poll ─► Supervisor ─► DownlinkIngest::handle ─► DownlinkReceiver
//! ```

mod ingest;
mod integration;
mod options;
mod outbound;
mod supervisor;
mod topics;

pub use ingest::{DownlinkIngest, DownlinkLock, DownlinkMetrics, DownlinkMetricsSnapshot, DropReason};
pub use integration::MqttIntegration;
pub use options::{build_mqtt_options, generate_client_id, parse_server, qos_from_level, BrokerAddress};
pub use outbound::{Outbound, OutboundMessage};
pub use topics::{field_name, CompiledTopics};
