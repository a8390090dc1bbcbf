//! Named wall-clock timers with running aggregates.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use crate::event::GpuEventMetrics;

/// Running aggregate for one named operation.
///
/// Accumulates across repeated start/stop cycles rather than overwriting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingMetric {
    pub name: String,
    /// Sum of all recorded durations.
    pub time_ms: f64,
    pub call_count: u64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub avg_time_ms: f64,
}

/// Wall-clock timer stack plus ingestion of GPU event durations.
#[derive(Debug, Default)]
pub struct ProfilingEngine {
    start_times: HashMap<String, Instant>,
    metrics: BTreeMap<String, TimingMetric>,
    enabled: bool,
}

impl ProfilingEngine {
    pub fn new() -> Self {
        Self { start_times: HashMap::new(), metrics: BTreeMap::new(), enabled: true }
    }

    /// Enable or disable recording; disabled calls are no-ops.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Begin timing `name`. A second start before stop restarts the timer.
    pub fn start_timer(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        self.start_times.insert(name.to_string(), Instant::now());
    }

    /// Stop timing `name` and fold the elapsed time into its aggregate.
    ///
    /// Stopping a timer that was never started logs a warning and does
    /// nothing.
    pub fn stop_timer(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        match self.start_times.remove(name) {
            Some(start) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
                self.record(name, elapsed_ms);
            }
            None => warn!(timer = name, "stop_timer called for a timer that was never started"),
        }
    }

    /// Record a GPU event duration (milliseconds) under its name.
    pub fn record_gpu_event(&mut self, name: &str, time_ms: f64) {
        if !self.enabled {
            return;
        }
        self.record(name, time_ms);
    }

    /// Record all four derived durations of a GPU event as separate metrics.
    pub fn record_gpu_event_metrics(&mut self, event: &GpuEventMetrics) {
        if !self.enabled {
            return;
        }
        self.record(&format!("{}/queue", event.event_name), event.queue_ms());
        self.record(&format!("{}/dispatch", event.event_name), event.dispatch_ms());
        self.record(&format!("{}/exec", event.event_name), event.execution_ms());
        self.record(&format!("{}/total", event.event_name), event.total_ms());
    }

    /// The aggregate for `name`, if anything was recorded under it.
    pub fn metric(&self, name: &str) -> Option<&TimingMetric> {
        self.metrics.get(name)
    }

    /// All aggregates, ordered by name.
    pub fn metrics(&self) -> impl Iterator<Item = &TimingMetric> {
        self.metrics.values()
    }

    /// Sum of every aggregate's total time.
    pub fn total_time_ms(&self) -> f64 {
        self.metrics.values().map(|m| m.time_ms).sum()
    }

    /// Drop all aggregates and any running timers.
    pub fn reset(&mut self) {
        self.start_times.clear();
        self.metrics.clear();
    }

    fn record(&mut self, name: &str, time_ms: f64) {
        let metric = self.metrics.entry(name.to_string()).or_default();
        if metric.name.is_empty() {
            metric.name = name.to_string();
        }
        metric.time_ms += time_ms;
        metric.call_count += 1;
        if metric.call_count == 1 {
            metric.min_time_ms = time_ms;
            metric.max_time_ms = time_ms;
        } else {
            metric.min_time_ms = metric.min_time_ms.min(time_ms);
            metric.max_time_ms = metric.max_time_ms.max(time_ms);
        }
        metric.avg_time_ms = metric.time_ms / metric.call_count as f64;
    }
}

impl std::fmt::Display for ProfilingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<32} {:>12} {:>8} {:>12} {:>12} {:>12}",
            "Operation", "Total (ms)", "Calls", "Min (ms)", "Max (ms)", "Avg (ms)"
        )?;
        writeln!(f, "{}", "-".repeat(92))?;
        for m in self.metrics.values() {
            writeln!(
                f,
                "{:<32} {:>12.3} {:>8} {:>12.3} {:>12.3} {:>12.3}",
                m.name, m.time_ms, m.call_count, m.min_time_ms, m.max_time_ms, m.avg_time_ms
            )?;
        }
        writeln!(f, "{}", "-".repeat(92))?;
        writeln!(f, "{:<32} {:>12.3}", "Total", self.total_time_ms())
    }
}
