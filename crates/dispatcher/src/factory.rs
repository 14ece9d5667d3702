//! Sink factory - instantiate a dispatch set from parsed configuration

use std::sync::Arc;
use tracing::{info, instrument, warn};

use contracts::{IntegrationConfig, IntegrationType, Integrator, KeyValueStore};
use mqtt_integration::MqttIntegration;

use crate::dispatcher::{close_set, DispatchSet};
use crate::error::DispatcherError;
use crate::sinks::LogIntegrator;

/// Create every configured sink, in configuration order
///
/// On failure, sinks already created are closed before returning.
#[instrument(
    name = "dispatcher_build_dispatch_set",
    skip(configs, store),
    fields(sink_count = configs.len())
)]
pub async fn build_dispatch_set(
    configs: &[IntegrationConfig],
    store: Option<Arc<dyn KeyValueStore>>,
) -> Result<DispatchSet, DispatcherError> {
    let mut members: Vec<(String, Arc<dyn Integrator>)> = Vec::with_capacity(configs.len());

    for config in configs {
        match create_sink(config, store.clone()).await {
            Ok(sink) => members.push((config.name.clone(), sink)),
            Err(e) => {
                warn!(sink = %config.name, error = %e, "Sink creation failed, closing created sinks");
                close_set(&DispatchSet::new(members)).await;
                return Err(e);
            }
        }
    }

    info!(sinks = members.len(), "Dispatch set built");
    Ok(DispatchSet::new(members))
}

/// Create one sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config, store),
    fields(sink = %config.name, sink_type = ?config.integration_type)
)]
async fn create_sink(
    config: &IntegrationConfig,
    store: Option<Arc<dyn KeyValueStore>>,
) -> Result<Arc<dyn Integrator>, DispatcherError> {
    match config.integration_type {
        IntegrationType::Log => Ok(Arc::new(LogIntegrator::new(&config.name))),
        IntegrationType::Mqtt => {
            let mqtt = config.mqtt.as_ref().ok_or_else(|| {
                DispatcherError::sink_creation(&config.name, "missing [mqtt] section")
            })?;
            let integration = MqttIntegration::connect(&config.name, mqtt, store)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(Arc::new(integration))
        }
    }
}
