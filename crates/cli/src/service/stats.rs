//! Service statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use dispatcher::MetricsSnapshot;

/// Statistics from a service run
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Number of integrations that were connected
    pub active_sinks: usize,

    /// Downlink commands consumed, per integration
    pub downlinks: BTreeMap<String, u64>,

    /// Delivery counters, per integration
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Integrations whose close failed
    pub close_failures: usize,
}

impl ServiceStats {
    pub fn total_downlinks(&self) -> u64 {
        self.downlinks.values().sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Service Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Integrations: {}", self.active_sinks);
        println!("   ├─ Downlink commands: {}", self.total_downlinks());
        println!("   └─ Close failures: {}", self.close_failures);

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Integrations");
            for (i, (name, metrics)) in self.sink_metrics.iter().enumerate() {
                let is_last = i == self.sink_metrics.len() - 1;
                let prefix = if is_last { "└─" } else { "├─" };
                println!(
                    "   {} {}: sent={}, failed={}, downlinks={}",
                    prefix,
                    name,
                    metrics.sent_count,
                    metrics.failure_count,
                    self.downlinks.get(name).copied().unwrap_or(0)
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_downlinks() {
        let mut stats = ServiceStats::default();
        stats.downlinks.insert("a".into(), 3);
        stats.downlinks.insert("b".into(), 4);
        assert_eq!(stats.total_downlinks(), 7);
    }
}
