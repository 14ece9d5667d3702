//! # LoRa Integrator CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 集成生命周期管理 (连接、下行消费、关闭)
//! - 单次事件分发调试
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod service;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_emit, run_info, run_service, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "LoRa Integrator CLI starting"
    );

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Emit(args) => run_emit(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from the config file's observability section, overridden by CLI options
///
/// The Prometheus exporter is started by `run` only.
fn init_logging(cli: &Cli) -> Result<()> {
    let settings = config_loader::ConfigLoader::load_from_path(cli.command.config_path())
        .map(|config| config.observability)
        .unwrap_or_default();

    let mut config = ObservabilityConfig::from(&settings);
    config.metrics_port = None;

    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }

    if cli.quiet {
        config.default_log_level = "warn".to_string();
    } else if cli.verbose > 0 {
        config.default_log_level = match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
        .to_string();
    }

    observability::init_with_config(config)
}
