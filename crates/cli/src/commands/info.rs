//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DevEui, EventKind, IntegrationType, MqttIntegrationConfig, ServiceConfig};
use mqtt_integration::{field_name, CompiledTopics};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatch_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
    integrations: Vec<IntegrationInfo>,
}

#[derive(Serialize)]
struct IntegrationInfo {
    name: String,
    integration_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt: Option<MqttInfo>,
}

#[derive(Serialize)]
struct MqttInfo {
    server: String,
    marshaler: String,
    qos: u8,
    retain: bool,
    /// Example topic per event kind
    topics: Vec<TopicInfo>,
    /// Inbound subscription pattern
    downlink_subscription: String,
    /// Example inbound topic
    downlink_example: String,
}

#[derive(Serialize)]
struct TopicInfo {
    kind: &'static str,
    field: &'static str,
    topic: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let dev_eui: DevEui = args
        .dev_eui
        .parse()
        .map_err(|e: contracts::DevEuiError| CliError::invalid_argument("dev-eui", e.to_string()))?;

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args.application_id, &dev_eui)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(
    config: &ServiceConfig,
    application_id: u64,
    dev_eui: &DevEui,
) -> Result<ConfigInfo> {
    let mut integrations = Vec::with_capacity(config.integrations.len());

    for integration in &config.integrations {
        let mqtt = match (&integration.integration_type, &integration.mqtt) {
            (IntegrationType::Mqtt, Some(mqtt)) => {
                Some(build_mqtt_info(mqtt, application_id, dev_eui).with_context(|| {
                    format!("Invalid topics for integration '{}'", integration.name)
                })?)
            }
            _ => None,
        };

        integrations.push(IntegrationInfo {
            name: integration.name.clone(),
            integration_type: format!("{:?}", integration.integration_type).to_lowercase(),
            mqtt,
        });
    }

    Ok(ConfigInfo {
        version: format!("{:?}", config.version),
        dispatch_timeout_ms: config.dispatch.timeout_ms,
        metrics_port: config.observability.metrics_port,
        integrations,
    })
}

fn build_mqtt_info(
    mqtt: &MqttIntegrationConfig,
    application_id: u64,
    dev_eui: &DevEui,
) -> Result<MqttInfo> {
    let topics = CompiledTopics::compile(&mqtt.topics)
        .map_err(|(field, e)| anyhow::anyhow!("{}: {}", field, e))?;

    Ok(MqttInfo {
        server: mqtt.server.clone(),
        marshaler: format!("{:?}", mqtt.marshaler).to_lowercase(),
        qos: mqtt.qos,
        retain: mqtt.retain,
        topics: EventKind::ALL
            .iter()
            .map(|kind| TopicInfo {
                kind: kind.as_str(),
                field: field_name(*kind),
                topic: topics.for_kind(*kind).render(application_id, dev_eui),
            })
            .collect(),
        downlink_subscription: topics.downlink().subscription_pattern(),
        downlink_example: topics.downlink().render(application_id, dev_eui),
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               LoRa Integrator Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Service");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Dispatch timeout: {} ms", info.dispatch_timeout_ms);
    match info.metrics_port {
        Some(port) => println!("   └─ Metrics port: {}", port),
        None => println!("   └─ Metrics port: (disabled)"),
    }

    println!("\n📤 Integrations ({})", info.integrations.len());
    for (i, integration) in info.integrations.iter().enumerate() {
        let is_last = i == info.integrations.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({})",
            prefix, integration.name, integration.integration_type
        );

        if let Some(ref mqtt) = integration.mqtt {
            println!(
                "   {}  ├─ {} [{}, qos {}{}]",
                child_prefix,
                mqtt.server,
                mqtt.marshaler,
                mqtt.qos,
                if mqtt.retain { ", retain" } else { "" }
            );
            for topic in &mqtt.topics {
                println!("   {}  ├─ {:<9} {}", child_prefix, topic.kind, topic.topic);
            }
            println!(
                "   {}  └─ {:<9} {} (subscribed as {})",
                child_prefix, "downlink", mqtt.downlink_example, mqtt.downlink_subscription
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{IntegrationConfig, TopicTemplates};

    #[test]
    fn test_rendered_topics() {
        let config = ServiceConfig {
            integrations: vec![IntegrationConfig {
                name: "broker".into(),
                integration_type: IntegrationType::Mqtt,
                mqtt: Some(MqttIntegrationConfig {
                    topics: TopicTemplates {
                        uplink: "app/{appID}/device/{devEUI}/rx".into(),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
            }],
            ..Default::default()
        };
        let dev_eui = DevEui::new([1, 2, 3, 4, 5, 6, 7, 8]);

        let info = build_config_info(&config, 123, &dev_eui).unwrap();
        let mqtt = info.integrations[0].mqtt.as_ref().unwrap();

        assert_eq!(mqtt.topics[0].kind, "up");
        assert_eq!(mqtt.topics[0].topic, "app/123/device/0102030405060708/rx");
        assert_eq!(mqtt.topics.len(), 7);
        assert_eq!(
            mqtt.downlink_subscription,
            "application/+/device/+/tx"
        );
        assert_eq!(
            mqtt.downlink_example,
            "application/123/device/0102030405060708/tx"
        );
    }

    #[test]
    fn test_log_integration_has_no_topics() {
        let config = ServiceConfig {
            integrations: vec![IntegrationConfig {
                name: "debug".into(),
                integration_type: IntegrationType::Log,
                mqtt: None,
            }],
            ..Default::default()
        };
        let info = build_config_info(&config, 1, &DevEui::default()).unwrap();
        assert_eq!(info.integrations[0].integration_type, "log");
        assert!(info.integrations[0].mqtt.is_none());
    }
}
