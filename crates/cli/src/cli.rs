//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::EventKind;
use std::path::{Path, PathBuf};

/// LoRa Integrator - event dispatch and downlink ingestion for LoRaWAN applications
#[derive(Parser, Debug)]
#[command(
    name = "lora-integrator",
    author,
    version,
    about = "LoRaWAN application-server integration dispatcher",
    long_about = "Fans device events out to configured integrations (MQTT, log) and \n\
                  ingests downlink commands published back by applications.\n\n\
                  Integrations are described in a TOML or JSON configuration file."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LORA_INTEGRATOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (defaults to the config file's observability.log_format)
    #[arg(long, value_enum, global = true, env = "LORA_INTEGRATOR_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect all integrations and serve downlink commands until interrupted
    Run(RunArgs),

    /// Validate configuration file without connecting
    Validate(ValidateArgs),

    /// Display configured integrations and their topics
    Info(InfoArgs),

    /// Dispatch a single synthetic event to every integration
    Emit(EmitArgs),
}

impl Commands {
    /// Configuration file used by the command
    pub fn config_path(&self) -> &Path {
        match self {
            Commands::Run(args) => &args.config,
            Commands::Validate(args) => &args.config,
            Commands::Info(args) => &args.config,
            Commands::Emit(args) => &args.config,
        }
    }
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "integrations.toml",
        env = "LORA_INTEGRATOR_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the MQTT server of every mqtt integration
    #[arg(long, env = "LORA_INTEGRATOR_MQTT_SERVER")]
    pub mqtt_server: Option<String>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "LORA_INTEGRATOR_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled, unset = from configuration)
    #[arg(long, env = "LORA_INTEGRATOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "integrations.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "integrations.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Application ID used to render example topics
    #[arg(long, default_value = "1")]
    pub application_id: u64,

    /// Device EUI (hex) used to render example topics
    #[arg(long, default_value = "0102030405060708")]
    pub dev_eui: String,
}

/// Arguments for the `emit` command
#[derive(Parser, Debug)]
pub struct EmitArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "integrations.toml")]
    pub config: PathBuf,

    /// Event kind
    #[arg(long, value_enum, default_value = "up")]
    pub kind: EmitKind,

    /// Application ID
    #[arg(long)]
    pub application_id: u64,

    /// Device EUI (16 hex chars)
    #[arg(long)]
    pub dev_eui: String,

    /// Frame port (uplink only)
    #[arg(long, default_value = "1")]
    pub f_port: u32,

    /// Payload as hex (uplink only)
    #[arg(long, default_value = "")]
    pub data_hex: String,

    /// Number of times to dispatch the event
    #[arg(long, default_value = "1")]
    pub count: u32,

    /// Per-dispatch deadline in milliseconds (unset = from configuration)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Event kind accepted by `emit`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitKind {
    Up,
    Join,
    Ack,
    Error,
    Status,
    Location,
    Txack,
}

impl From<EmitKind> for EventKind {
    fn from(kind: EmitKind) -> Self {
        match kind {
            EmitKind::Up => EventKind::Uplink,
            EmitKind::Join => EventKind::Join,
            EmitKind::Ack => EventKind::Ack,
            EmitKind::Error => EventKind::Error,
            EmitKind::Status => EventKind::Status,
            EmitKind::Location => EventKind::Location,
            EmitKind::Txack => EventKind::TxAck,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
