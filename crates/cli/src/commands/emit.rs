//! `emit` command implementation.

use anyhow::{Context, Result};
use contracts::{
    AckEvent, CallContext, DevEui, ErrorEvent, ErrorType, Event, EventKind, JoinEvent,
    LocationEvent, StatusEvent, TxAckEvent, UplinkEvent,
};
use dispatcher::{all_ok, build_dispatch_set, Dispatcher, SinkOutcome};
use observability::DispatchStatsAggregator;
use std::time::{Duration, Instant};
use tracing::info;

use crate::cli::EmitArgs;
use crate::error::CliError;

/// Execute the `emit` command
pub async fn run_emit(args: &EmitArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let dev_eui: DevEui = args
        .dev_eui
        .parse()
        .map_err(|e: contracts::DevEuiError| CliError::invalid_argument("dev-eui", e.to_string()))?;
    let data = hex::decode(&args.data_hex)
        .map_err(|e| CliError::invalid_argument("data-hex", e.to_string()))?;

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let event = build_event(args.kind.into(), args.application_id, &dev_eui, args.f_port, data);
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(config.dispatch.timeout_ms));

    let set = build_dispatch_set(&config.integrations, None)
        .await
        .context("Failed to create integrations")?;
    let dispatcher = Dispatcher::new(set);

    info!(
        kind = %event.kind(),
        application_id = args.application_id,
        dev_eui = %dev_eui,
        count = args.count,
        "Emitting event"
    );

    let mut stats = DispatchStatsAggregator::new();
    let count = args.count.max(1) as usize;
    let mut failed_dispatches = 0usize;

    for i in 0..count {
        let ctx = CallContext::with_timeout(timeout);
        let started = Instant::now();
        let outcomes = dispatcher.dispatch(&ctx, None, &event).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        stats.update(
            event.kind(),
            latency_ms,
            outcomes.iter().map(|o| (o.sink.as_str(), o.is_ok())),
        );

        if i == 0 {
            print_outcomes(&outcomes);
        }

        if !all_ok(&outcomes) {
            failed_dispatches += 1;
        }
    }

    // publishes are queued in the client; closing drains them to the broker
    dispatcher.close_all().await;

    println!("{}", stats.summary());

    if failed_dispatches > 0 {
        return Err(CliError::DispatchFailed {
            failed: failed_dispatches,
            total: count,
        }
        .into());
    }

    Ok(())
}

/// Synthetic event of `kind` for one device
fn build_event(
    kind: EventKind,
    application_id: u64,
    dev_eui: &DevEui,
    f_port: u32,
    data: Vec<u8>,
) -> Event {
    let dev_eui = dev_eui.to_vec();

    match kind {
        EventKind::Uplink => Event::Uplink(UplinkEvent {
            application_id,
            dev_eui,
            f_port,
            data,
            ..Default::default()
        }),
        EventKind::Join => Event::Join(JoinEvent {
            application_id,
            dev_eui,
            ..Default::default()
        }),
        EventKind::Ack => Event::Ack(AckEvent {
            application_id,
            dev_eui,
            acknowledged: true,
            ..Default::default()
        }),
        EventKind::Error => Event::Error(ErrorEvent {
            application_id,
            dev_eui,
            error_type: ErrorType::Unknown as i32,
            error: "emitted from cli".to_string(),
            ..Default::default()
        }),
        EventKind::Status => Event::Status(StatusEvent {
            application_id,
            dev_eui,
            battery_level_unavailable: true,
            ..Default::default()
        }),
        EventKind::Location => Event::Location(LocationEvent {
            application_id,
            dev_eui,
            ..Default::default()
        }),
        EventKind::TxAck => Event::TxAck(TxAckEvent {
            application_id,
            dev_eui,
            ..Default::default()
        }),
    }
}

fn print_outcomes(outcomes: &[SinkOutcome]) {
    println!("\nDispatch outcomes:");
    for outcome in outcomes {
        match &outcome.result {
            Ok(()) => println!("  ✓ {}", outcome.sink),
            Err(e) => println!("  ✗ {}: {}", outcome.sink, e),
        }
    }
    println!();
}
