//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{IntegrationType, ServiceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    integration_count: usize,
    mqtt_count: usize,
    log_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let count = |kind: IntegrationType| {
                config
                    .integrations
                    .iter()
                    .filter(|i| i.integration_type == kind)
                    .count()
            };

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    integration_count: config.integrations.len(),
                    mqtt_count: count(IntegrationType::Mqtt),
                    log_count: count(IntegrationType::Log),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let has_mqtt = config
        .integrations
        .iter()
        .any(|i| i.integration_type == IntegrationType::Mqtt);
    if !has_mqtt {
        warnings.push("No MQTT integration configured - downlink commands will never arrive".to_string());
    }

    for integration in &config.integrations {
        let Some(mqtt) = integration.mqtt.as_ref() else {
            continue;
        };

        if integration.integration_type != IntegrationType::Mqtt {
            warnings.push(format!(
                "Integration '{}' has an mqtt section but type {:?} - it is ignored",
                integration.name, integration.integration_type
            ));
            continue;
        }

        if !mqtt.clean_session && mqtt.client_id.is_none() {
            warnings.push(format!(
                "Integration '{}' sets clean_session = false without a client_id - sessions are not resumed across restarts",
                integration.name
            ));
        }

        if mqtt.retain {
            warnings.push(format!(
                "Integration '{}' publishes retained messages - late subscribers receive the last event per topic",
                integration.name
            ));
        }

        if mqtt.username.is_some() != mqtt.password.is_some() {
            warnings.push(format!(
                "Integration '{}' sets only one of username/password",
                integration.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Integrations: {}", summary.integration_count);
            println!("  MQTT: {}", summary.mqtt_count);
            println!("  Log: {}", summary.log_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
