//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{IntegrationType, ServiceConfig};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::service::{Service, ServiceOptions};

/// Execute the `run` command
pub async fn run_service(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref server) = args.mqtt_server {
        info!(server = %server, "Overriding MQTT server from CLI");
        for mqtt in config.integrations.iter_mut().filter_map(|i| i.mqtt.as_mut()) {
            mqtt.server = server.clone();
        }
    }

    info!(
        integrations = config.integrations.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let metrics_port = match args.metrics_port {
        Some(0) => None,
        Some(port) => Some(port),
        None => config.observability.metrics_port,
    };

    let service = Service::new(ServiceOptions {
        config,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port,
    });

    info!("Starting integrations...");

    let stats = service
        .run(shutdown_signal())
        .await
        .context("Service execution failed")?;

    info!(
        downlinks = stats.total_downlinks(),
        duration_secs = stats.duration.as_secs_f64(),
        "Service stopped"
    );
    stats.print_summary();

    info!("LoRa Integrator finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed, that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &ServiceConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Integrations ({}):", config.integrations.len());
    for integration in &config.integrations {
        match (&integration.integration_type, &integration.mqtt) {
            (IntegrationType::Mqtt, Some(mqtt)) => println!(
                "  - {} (mqtt) - {} [{:?}, qos {}]",
                integration.name, mqtt.server, mqtt.marshaler, mqtt.qos
            ),
            (kind, _) => println!("  - {} ({:?})", integration.name, kind),
        }
    }

    println!("\nDispatch timeout: {} ms", config.dispatch.timeout_ms);
    if let Some(port) = config.observability.metrics_port {
        println!("Metrics port: {}", port);
    }

    println!();
}
