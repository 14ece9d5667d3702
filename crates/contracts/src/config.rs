//! ServiceConfig - Config Loader output
//!
//! Describes the observability settings and the set of configured integrations.

use serde::{Deserialize, Serialize};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Logging / metrics settings
    #[serde(default)]
    pub observability: ObservabilitySettings,

    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Configured integrations, in dispatch order
    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatSetting {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Logging / metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log format
    #[serde(default)]
    pub log_format: LogFormatSetting,

    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus exporter port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormatSetting::default(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Deadline applied to each dispatch call
    #[serde(default = "default_dispatch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

fn default_dispatch_timeout_ms() -> u64 {
    5_000
}

/// One configured integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Integration name (unique)
    pub name: String,

    /// Backend type
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,

    /// MQTT settings (required for `type = "mqtt"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttIntegrationConfig>,
}

/// Integration backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// MQTT publish/subscribe
    Mqtt,
    /// Log output
    Log,
}

/// Payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarshalerKind {
    /// Textual JSON form
    #[default]
    Json,
    /// Compact protobuf form
    Protobuf,
}

/// MQTT integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttIntegrationConfig {
    /// Broker address, `tcp://host:port`
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Client ID (random when unset)
    #[serde(default)]
    pub client_id: Option<String>,

    /// QoS for publish and subscribe (0, 1, 2)
    #[serde(default)]
    pub qos: u8,

    /// Publish with the retain flag
    #[serde(default)]
    pub retain: bool,

    /// Start each connection without broker-side session state
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Startup connection timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Payload encoding, both directions
    #[serde(default)]
    pub marshaler: MarshalerKind,

    /// Downlink queue capacity
    #[serde(default = "default_downlink_queue_size")]
    pub downlink_queue_size: usize,

    #[serde(default = "default_reconnect_initial_interval_ms")]
    pub reconnect_initial_interval_ms: u64,

    #[serde(default = "default_reconnect_max_interval_ms")]
    pub reconnect_max_interval_ms: u64,

    /// TTL of the downlink de-duplication lock (0 = disabled)
    #[serde(default = "default_downlink_lock_ttl_ms")]
    pub downlink_lock_ttl_ms: u64,

    /// Topic templates
    #[serde(default)]
    pub topics: TopicTemplates,
}

impl Default for MqttIntegrationConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            username: None,
            password: None,
            client_id: None,
            qos: 0,
            retain: false,
            clean_session: default_clean_session(),
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            marshaler: MarshalerKind::default(),
            downlink_queue_size: default_downlink_queue_size(),
            reconnect_initial_interval_ms: default_reconnect_initial_interval_ms(),
            reconnect_max_interval_ms: default_reconnect_max_interval_ms(),
            downlink_lock_ttl_ms: default_downlink_lock_ttl_ms(),
            topics: TopicTemplates::default(),
        }
    }
}

fn default_server() -> String {
    "tcp://127.0.0.1:1883".to_string()
}

fn default_clean_session() -> bool {
    true
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_downlink_queue_size() -> usize {
    100
}

fn default_reconnect_initial_interval_ms() -> u64 {
    1_000
}

fn default_reconnect_max_interval_ms() -> u64 {
    60_000
}

fn default_downlink_lock_ttl_ms() -> u64 {
    100
}

/// Topic template per event kind, plus the inbound command topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTemplates {
    #[serde(default = "TopicTemplates::default_uplink")]
    pub uplink: String,
    #[serde(default = "TopicTemplates::default_join")]
    pub join: String,
    #[serde(default = "TopicTemplates::default_ack")]
    pub ack: String,
    #[serde(default = "TopicTemplates::default_error")]
    pub error: String,
    #[serde(default = "TopicTemplates::default_status")]
    pub status: String,
    #[serde(default = "TopicTemplates::default_location")]
    pub location: String,
    #[serde(default = "TopicTemplates::default_tx_ack")]
    pub tx_ack: String,
    /// Inbound command topic; identifiers are wildcarded for the subscription
    #[serde(default = "TopicTemplates::default_downlink")]
    pub downlink: String,
}

const TOPIC_PREFIX: &str = "application/{{ .ApplicationID }}/device/{{ .DevEUI }}";

impl TopicTemplates {
    fn default_uplink() -> String {
        format!("{TOPIC_PREFIX}/rx")
    }

    fn default_join() -> String {
        format!("{TOPIC_PREFIX}/join")
    }

    fn default_ack() -> String {
        format!("{TOPIC_PREFIX}/ack")
    }

    fn default_error() -> String {
        format!("{TOPIC_PREFIX}/error")
    }

    fn default_status() -> String {
        format!("{TOPIC_PREFIX}/status")
    }

    fn default_location() -> String {
        format!("{TOPIC_PREFIX}/location")
    }

    fn default_tx_ack() -> String {
        format!("{TOPIC_PREFIX}/txack")
    }

    fn default_downlink() -> String {
        format!("{TOPIC_PREFIX}/tx")
    }

    /// Template for an outbound event kind
    pub fn for_kind(&self, kind: crate::EventKind) -> &str {
        use crate::EventKind;
        match kind {
            EventKind::Uplink => &self.uplink,
            EventKind::Join => &self.join,
            EventKind::Ack => &self.ack,
            EventKind::Error => &self.error,
            EventKind::Status => &self.status,
            EventKind::Location => &self.location,
            EventKind::TxAck => &self.tx_ack,
        }
    }
}

impl Default for TopicTemplates {
    fn default() -> Self {
        Self {
            uplink: Self::default_uplink(),
            join: Self::default_join(),
            ack: Self::default_ack(),
            error: Self::default_error(),
            status: Self::default_status(),
            location: Self::default_location(),
            tx_ack: Self::default_tx_ack(),
            downlink: Self::default_downlink(),
        }
    }
}
