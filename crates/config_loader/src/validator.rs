//! 配置校验模块
//!
//! 校验规则：
//! - 至少配置一个 integration
//! - integration 名称非空且唯一
//! - mqtt 类型必须带 mqtt 配置段
//! - qos <= 2, downlink_queue_size > 0, server 非空
//! - 重连间隔 initial <= max
//! - 所有主题模板可编译且符合发布/订阅规则

use std::collections::HashSet;

use contracts::{
    ContractError, IntegrationType, MqttIntegrationConfig, ServiceConfig, TopicTemplates,
};
use topic_template::CompiledTemplate;

/// 校验 ServiceConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_dispatch(config)?;
    validate_integration_names(config)?;
    validate_integrations(config)?;
    Ok(())
}

/// 校验分发设置
fn validate_dispatch(config: &ServiceConfig) -> Result<(), ContractError> {
    if config.dispatch.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatch.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验 integration 名称非空且唯一
fn validate_integration_names(config: &ServiceConfig) -> Result<(), ContractError> {
    if config.integrations.is_empty() {
        return Err(ContractError::config_validation(
            "integrations",
            "at least one integration is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, integration) in config.integrations.iter().enumerate() {
        if integration.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("integrations[{}].name", idx),
                "integration name cannot be empty",
            ));
        }
        if !seen.insert(integration.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("integrations[name={}]", integration.name),
                "duplicate integration name",
            ));
        }
    }
    Ok(())
}

/// 校验各 integration 的类型专属配置
fn validate_integrations(config: &ServiceConfig) -> Result<(), ContractError> {
    for integration in &config.integrations {
        match integration.integration_type {
            IntegrationType::Log => {}
            IntegrationType::Mqtt => {
                let prefix = format!("integrations[{}].mqtt", integration.name);
                let mqtt = integration.mqtt.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        &prefix,
                        "mqtt section is required for type = \"mqtt\"",
                    )
                })?;
                validate_mqtt(&prefix, mqtt)?;
            }
        }
    }
    Ok(())
}

/// 校验 MQTT 配置
fn validate_mqtt(prefix: &str, mqtt: &MqttIntegrationConfig) -> Result<(), ContractError> {
    if mqtt.server.trim().is_empty() {
        return Err(ContractError::config_validation(
            format!("{prefix}.server"),
            "server cannot be empty",
        ));
    }

    if mqtt.qos > 2 {
        return Err(ContractError::config_validation(
            format!("{prefix}.qos"),
            format!("qos must be 0, 1 or 2, got {}", mqtt.qos),
        ));
    }

    if mqtt.downlink_queue_size == 0 {
        return Err(ContractError::config_validation(
            format!("{prefix}.downlink_queue_size"),
            "downlink_queue_size must be > 0",
        ));
    }

    if mqtt.reconnect_initial_interval_ms > mqtt.reconnect_max_interval_ms {
        return Err(ContractError::config_validation(
            format!("{prefix}.reconnect_initial_interval_ms / {prefix}.reconnect_max_interval_ms"),
            format!(
                "reconnect_initial_interval_ms ({}) must be <= reconnect_max_interval_ms ({})",
                mqtt.reconnect_initial_interval_ms, mqtt.reconnect_max_interval_ms
            ),
        ));
    }

    validate_topics(prefix, &mqtt.topics)
}

/// 校验主题模板
fn validate_topics(prefix: &str, topics: &TopicTemplates) -> Result<(), ContractError> {
    let publish = [
        ("uplink", &topics.uplink),
        ("join", &topics.join),
        ("ack", &topics.ack),
        ("error", &topics.error),
        ("status", &topics.status),
        ("location", &topics.location),
        ("tx_ack", &topics.tx_ack),
    ];

    for (field, template) in publish {
        CompiledTemplate::compile(template)
            .and_then(|t| t.validate_publish())
            .map_err(|e| {
                ContractError::config_validation(format!("{prefix}.topics.{field}"), e.to_string())
            })?;
    }

    CompiledTemplate::compile(&topics.downlink)
        .and_then(|t| t.validate_subscription())
        .map_err(|e| {
            ContractError::config_validation(format!("{prefix}.topics.downlink"), e.to_string())
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::IntegrationConfig;

    fn minimal_config() -> ServiceConfig {
        ServiceConfig {
            integrations: vec![
                IntegrationConfig {
                    name: "broker".into(),
                    integration_type: IntegrationType::Mqtt,
                    mqtt: Some(MqttIntegrationConfig::default()),
                },
                IntegrationConfig {
                    name: "debug".into(),
                    integration_type: IntegrationType::Log,
                    mqtt: None,
                },
            ],
            ..Default::default()
        }
    }

    fn mqtt_mut(config: &mut ServiceConfig) -> &mut MqttIntegrationConfig {
        config.integrations[0].mqtt.as_mut().unwrap()
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected ConfigValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn test_no_integrations() {
        let config = ServiceConfig::default();
        assert_eq!(field_of(validate(&config).unwrap_err()), "integrations");
    }

    #[test]
    fn test_duplicate_name() {
        let mut config = minimal_config();
        config.integrations[1].name = "broker".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_name() {
        let mut config = minimal_config();
        config.integrations[1].name = "  ".into();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[1].name"
        );
    }

    #[test]
    fn test_mqtt_section_required() {
        let mut config = minimal_config();
        config.integrations[0].mqtt = None;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt"
        );
    }

    #[test]
    fn test_qos_out_of_range() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).qos = 3;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt.qos"
        );
    }

    #[test]
    fn test_zero_queue() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).downlink_queue_size = 0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt.downlink_queue_size"
        );
    }

    #[test]
    fn test_empty_server() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).server = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_reconnect_interval_order() {
        let mut config = minimal_config();
        let mqtt = mqtt_mut(&mut config);
        mqtt.reconnect_initial_interval_ms = 10_000;
        mqtt.reconnect_max_interval_ms = 1_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_publish_template() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).topics.status = "app/{unknown}/status".into();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt.topics.status"
        );
    }

    #[test]
    fn test_wildcard_in_publish_template() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).topics.uplink = "app/+/rx".into();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt.topics.uplink"
        );
    }

    #[test]
    fn test_bad_downlink_template() {
        let mut config = minimal_config();
        mqtt_mut(&mut config).topics.downlink = "app/{{ .ApplicationID".into();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "integrations[broker].mqtt.topics.downlink"
        );
    }

    #[test]
    fn test_zero_dispatch_timeout() {
        let mut config = minimal_config();
        config.dispatch.timeout_ms = 0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "dispatch.timeout_ms"
        );
    }
}
