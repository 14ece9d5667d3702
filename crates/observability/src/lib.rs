//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标，服务于 LoRaWAN 集成分发层。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 分发 / 下行指标记录与统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init, metrics};
//!
//! // 初始化
//! observability::init()?;
//!
//! // 记录分发结果
//! metrics::record_event_dispatched("mqtt", EventKind::Uplink, true);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use contracts::{LogFormatSetting, ObservabilitySettings};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_connection_state, record_dispatch_latency_ms, record_downlink_dropped,
    record_downlink_queue_depth, record_downlink_queued, record_downlink_received,
    record_event_dispatched, DispatchStatsAggregator, DispatchSummary, RunningStats, SinkTally,
    StatsSummary,
};
/// 初始化可观测性（Tracing + Prometheus）
///
/// - Tracing: JSON 格式，支持 RUST_LOG 环境变量
/// - Prometheus: 监听 0.0.0.0:9100
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// 默认日志级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9100),
            default_log_level: "info".to_string(),
        }
    }
}

impl From<&ObservabilitySettings> for ObservabilityConfig {
    fn from(settings: &ObservabilitySettings) -> Self {
        Self {
            log_format: settings.log_format.into(),
            metrics_port: settings.metrics_port,
            default_log_level: settings.log_level.clone(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

impl From<LogFormatSetting> for LogFormat {
    fn from(setting: LogFormatSetting) -> Self {
        match setting {
            LogFormatSetting::Json => LogFormat::Json,
            LogFormatSetting::Pretty => LogFormat::Pretty,
            LogFormatSetting::Compact => LogFormat::Compact,
        }
    }
}

/// 使用自定义配置初始化
///
/// RUST_LOG 优先于 `default_log_level`。重复调用返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    // 三种格式共用同一个 registry
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Prometheus 导出器 (tracing 已由调用方初始化)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
