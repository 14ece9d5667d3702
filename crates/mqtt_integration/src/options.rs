//! Broker connection options

use contracts::{IntegrationError, MqttIntegrationConfig};
use rumqttc::{MqttOptions, QoS, Transport};
use std::time::Duration;
use url::{Host, Url};
use uuid::Uuid;

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// rumqttc rejects keep-alive intervals below this
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Request channel capacity between `AsyncClient` and `EventLoop`
pub(crate) const REQUEST_CHANNEL_CAPACITY: usize = 100;

/// Broker host and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    /// `ssl://`, `tls://` or `mqtts://`
    pub tls: bool,
}

/// Parse `tcp://host:port`, `mqtt://`, `ssl://`, `tls://`, `mqtts://` or a bare `host[:port]`
///
/// Credentials, paths, queries and fragments are rejected. IPv6 hosts need brackets.
pub fn parse_server(server: &str) -> Result<BrokerAddress, String> {
    let server = server.trim();
    if server.is_empty() {
        return Err("missing host".to_string());
    }

    let url = if server.contains("://") {
        Url::parse(server)
    } else {
        Url::parse(&format!("tcp://{server}"))
    }
    .map_err(|e| format!("invalid address '{server}': {e}"))?;

    // scheme is lowercased by the parser
    let (tls, default_port) = match url.scheme() {
        "tcp" | "mqtt" => (false, DEFAULT_PORT),
        "ssl" | "tls" | "mqtts" => (true, DEFAULT_TLS_PORT),
        other => return Err(format!("unsupported scheme '{other}'")),
    };

    if !url.username().is_empty() || url.password().is_some() {
        return Err("credentials must be set through username/password".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() || !matches!(url.path(), "" | "/") {
        return Err(format!("unexpected path, query or fragment in '{server}'"));
    }

    let host = match url.host() {
        Some(Host::Ipv6(addr)) => addr.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        _ => return Err("missing host".to_string()),
    };

    Ok(BrokerAddress {
        host,
        port: url.port().unwrap_or(default_port),
        tls,
    })
}

/// Map a configured QoS level
pub fn qos_from_level(level: u8) -> Result<QoS, String> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(format!("qos must be 0, 1 or 2, got {}", other)),
    }
}

/// Random client id, short 8-hex suffix
pub fn generate_client_id() -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!("lora-as-{}", &short[..8])
}

/// Build rumqttc options from config
pub fn build_mqtt_options(
    name: &str,
    config: &MqttIntegrationConfig,
) -> Result<MqttOptions, IntegrationError> {
    let address = parse_server(&config.server)
        .map_err(|e| IntegrationError::config(name, format!("server: {}", e)))?;

    let client_id = match config.client_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => generate_client_id(),
    };

    let mut options = MqttOptions::new(client_id, address.host, address.port);
    if address.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    match (config.username.as_deref(), config.password.as_deref()) {
        (Some(username), password) if !username.is_empty() => {
            options.set_credentials(username, password.unwrap_or_default());
        }
        _ => {}
    }

    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs).max(MIN_KEEP_ALIVE));
    options.set_clean_session(config.clean_session);

    Ok(options)
}
