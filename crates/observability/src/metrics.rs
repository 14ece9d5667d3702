//! 集成层指标收集模块
//!
//! Prometheus 计数器 / 仪表 / 直方图记录函数，以及供 CLI 输出摘要的内存聚合器。

use contracts::{ConnectionState, EventKind};
use metrics::{counter, gauge, histogram};
use std::collections::BTreeMap;

/// 记录一次事件分发结果
pub fn record_event_dispatched(sink_name: &str, kind: EventKind, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "lora_integration_events_dispatched_total",
        "sink" => sink_name.to_string(),
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
}

/// 记录单个 sink 的分发耗时
pub fn record_dispatch_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "lora_integration_dispatch_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// 记录收到的下行消息 (校验前)
pub fn record_downlink_received(sink_name: &str) {
    counter!(
        "lora_integration_downlink_received_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录成功入队的下行命令
pub fn record_downlink_queued(sink_name: &str) {
    counter!(
        "lora_integration_downlink_queued_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录被丢弃的下行消息
pub fn record_downlink_dropped(sink_name: &str, reason: &'static str) {
    counter!(
        "lora_integration_downlink_dropped_total",
        "sink" => sink_name.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录下行队列深度
pub fn record_downlink_queue_depth(sink_name: &str, depth: usize) {
    gauge!(
        "lora_integration_downlink_queue_depth",
        "sink" => sink_name.to_string()
    )
    .set(depth as f64);
}

/// 记录连接状态变化
pub fn record_connection_state(sink_name: &str, state: ConnectionState) {
    let connected = if state == ConnectionState::Connected {
        1.0
    } else {
        0.0
    };
    gauge!(
        "lora_integration_connected",
        "sink" => sink_name.to_string()
    )
    .set(connected);

    counter!(
        "lora_integration_connection_transitions_total",
        "sink" => sink_name.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

/// 单个 sink 的分发计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkTally {
    pub sent: u64,
    pub failed: u64,
}

/// 分发指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchStatsAggregator {
    /// 分发调用次数
    pub total_dispatches: u64,

    /// 至少一个 sink 失败的分发次数
    pub dispatches_with_failures: u64,

    /// 各 sink 计数
    pub per_sink: BTreeMap<String, SinkTally>,

    /// 各事件类型计数
    pub per_kind: BTreeMap<&'static str, u64>,

    /// 分发耗时统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl DispatchStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次分发 (每个 sink 的结果)
    pub fn update<'a, I>(&mut self, kind: EventKind, latency_ms: f64, results: I)
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        self.total_dispatches += 1;
        *self.per_kind.entry(kind.as_str()).or_insert(0) += 1;
        self.latency_stats.push(latency_ms);

        let mut any_failed = false;
        for (sink, success) in results {
            let tally = self.per_sink.entry(sink.to_string()).or_default();
            if success {
                tally.sent += 1;
            } else {
                tally.failed += 1;
                any_failed = true;
            }
        }

        if any_failed {
            self.dispatches_with_failures += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            total_dispatches: self.total_dispatches,
            dispatches_with_failures: self.dispatches_with_failures,
            failure_rate: if self.total_dispatches > 0 {
                self.dispatches_with_failures as f64 / self.total_dispatches as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            per_sink: self.per_sink.clone(),
            per_kind: self.per_kind.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub total_dispatches: u64,
    pub dispatches_with_failures: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub per_sink: BTreeMap<String, SinkTally>,
    pub per_kind: BTreeMap<&'static str, u64>,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Total dispatches: {}", self.total_dispatches)?;
        writeln!(
            f,
            "Dispatches with failures: {} ({:.2}%)",
            self.dispatches_with_failures, self.failure_rate
        )?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        if !self.per_kind.is_empty() {
            writeln!(f, "Events by kind:")?;
            for (kind, count) in &self.per_kind {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        if !self.per_sink.is_empty() {
            writeln!(f, "Sinks:")?;
            for (sink, tally) in &self.per_sink {
                writeln!(f, "  {}: sent={}, failed={}", sink, tally.sent, tally.failed)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
