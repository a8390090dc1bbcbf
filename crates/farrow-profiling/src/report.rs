//! JSON and Markdown rendering of collected metrics.
//!
//! The report schema is the contract the processing core supplies data for:
//! per-event name plus four derived millisecond durations, CPU timer
//! aggregates, device/system information and the signal parameters of the
//! run.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::engine::{ProfilingEngine, TimingMetric};
use crate::event::GpuEventMetrics;
use crate::Result;

/// Device and host information captured once per run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemInfo {
    pub device_name: String,
    pub device_vendor: String,
    pub device_version: String,
    pub driver_version: String,
    pub platform_name: String,
    pub platform_version: String,
    pub device_memory_mb: u64,
    pub max_work_group_size: usize,
    pub compute_units: u32,
    pub os_name: String,
}

impl SystemInfo {
    /// Fill the OS field from the running host.
    pub fn with_host_os(mut self) -> Self {
        self.os_name = std::env::consts::OS.to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct SerializedEvent {
    event_name: String,
    queue_time_ms: f64,
    wait_time_ms: f64,
    execution_time_ms: f64,
    total_time_ms: f64,
}

/// A complete profiling report for one processing run.
#[derive(Debug, Default, Serialize)]
pub struct ProfilingReport {
    pub system_info: SystemInfo,
    /// Signal parameters of the run, as display strings.
    pub signal_parameters: BTreeMap<String, String>,
    #[serde(serialize_with = "serialize_events")]
    pub gpu_events: Vec<GpuEventMetrics>,
    pub cpu_metrics: Vec<TimingMetric>,
    pub total_gpu_time_ms: f64,
}

fn serialize_events<S: serde::Serializer>(
    events: &[GpuEventMetrics],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let rows: Vec<SerializedEvent> = events
        .iter()
        .map(|e| SerializedEvent {
            event_name: e.event_name.clone(),
            queue_time_ms: e.queue_ms(),
            wait_time_ms: e.dispatch_ms(),
            execution_time_ms: e.execution_ms(),
            total_time_ms: e.total_ms(),
        })
        .collect();
    serde::Serialize::serialize(&rows, serializer)
}

impl ProfilingReport {
    pub fn new(system_info: SystemInfo) -> Self {
        Self { system_info, ..Default::default() }
    }

    /// Record a GPU event and fold its total into the run total.
    pub fn push_event(&mut self, event: GpuEventMetrics) {
        self.total_gpu_time_ms += event.total_ms();
        self.gpu_events.push(event);
    }

    /// Snapshot the CPU timer aggregates of an engine.
    pub fn set_cpu_metrics(&mut self, engine: &ProfilingEngine) {
        self.cpu_metrics = engine.metrics().cloned().collect();
    }

    pub fn add_signal_parameter(&mut self, key: &str, value: impl ToString) {
        self.signal_parameters.insert(key.to_string(), value.to_string());
    }

    /// Machine-readable JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Human-readable Markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# GPU Fractional Delay Profiling Report\n");

        let _ = writeln!(md, "## System\n");
        let si = &self.system_info;
        let _ = writeln!(md, "- **Device:** {}", si.device_name);
        let _ = writeln!(md, "- **Vendor:** {}", si.device_vendor);
        let _ = writeln!(md, "- **Device version:** {}", si.device_version);
        let _ = writeln!(md, "- **Driver version:** {}", si.driver_version);
        let _ = writeln!(md, "- **Platform:** {} ({})", si.platform_name, si.platform_version);
        let _ = writeln!(md, "- **Device memory:** {} MB", si.device_memory_mb);
        let _ = writeln!(md, "- **Max work-group size:** {}", si.max_work_group_size);
        let _ = writeln!(md, "- **Compute units:** {}", si.compute_units);
        let _ = writeln!(md, "- **OS:** {}\n", si.os_name);

        if !self.signal_parameters.is_empty() {
            let _ = writeln!(md, "## Signal parameters\n");
            for (k, v) in &self.signal_parameters {
                let _ = writeln!(md, "- **{k}:** {v}");
            }
            let _ = writeln!(md);
        }

        if !self.gpu_events.is_empty() {
            let _ = writeln!(md, "## GPU events\n");
            let _ = writeln!(md, "| Event | Queue (ms) | Dispatch (ms) | Execution (ms) | Total (ms) |");
            let _ = writeln!(md, "|---|---|---|---|---|");
            for e in &self.gpu_events {
                let _ = writeln!(
                    md,
                    "| {} | {:.3} | {:.3} | {:.3} | {:.3} |",
                    e.event_name,
                    e.queue_ms(),
                    e.dispatch_ms(),
                    e.execution_ms(),
                    e.total_ms()
                );
            }
            let _ = writeln!(md, "\n**Total GPU time:** {:.3} ms\n", self.total_gpu_time_ms);
        }

        if !self.cpu_metrics.is_empty() {
            let _ = writeln!(md, "## CPU timers\n");
            let _ = writeln!(md, "| Operation | Total (ms) | Calls | Min (ms) | Max (ms) | Avg (ms) |");
            let _ = writeln!(md, "|---|---|---|---|---|---|");
            for m in &self.cpu_metrics {
                let _ = writeln!(
                    md,
                    "| {} | {:.3} | {} | {:.3} | {:.3} | {:.3} |",
                    m.name, m.time_ms, m.call_count, m.min_time_ms, m.max_time_ms, m.avg_time_ms
                );
            }
        }

        md
    }

    pub fn save_markdown(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_markdown())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTimestamps;

    fn sample_report() -> ProfilingReport {
        let mut report = ProfilingReport::new(SystemInfo {
            device_name: "Test GPU".into(),
            device_vendor: "ACME".into(),
            device_memory_mb: 8192,
            ..Default::default()
        });
        report.push_event(GpuEventMetrics::from_timestamps(
            "h2d_transfer",
            EventTimestamps { queued: 0, submitted: 100_000, started: 200_000, ended: 1_200_000 },
        ));
        report.push_event(GpuEventMetrics::from_timestamps(
            "fractional_delay_kernel",
            EventTimestamps { queued: 0, submitted: 0, started: 0, ended: 3_000_000 },
        ));
        report.add_signal_parameter("beams", 8);
        report
    }

    #[test]
    fn json_contains_event_schema_fields() {
        let json = sample_report().to_json().unwrap();
        assert!(json.contains("\"event_name\""));
        assert!(json.contains("\"queue_time_ms\""));
        assert!(json.contains("\"wait_time_ms\""));
        assert!(json.contains("\"execution_time_ms\""));
        assert!(json.contains("\"total_time_ms\""));
        assert!(json.contains("fractional_delay_kernel"));

        // Must parse back as JSON.
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["gpu_events"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn totals_accumulate_per_event() {
        let report = sample_report();
        assert!((report.total_gpu_time_ms - (1.2 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn markdown_has_system_and_event_tables() {
        let md = sample_report().to_markdown();
        assert!(md.contains("## System"));
        assert!(md.contains("Test GPU"));
        assert!(md.contains("| h2d_transfer |"));
        assert!(md.contains("**Total GPU time:**"));
        assert!(md.contains("**beams:** 8"));
    }

    #[test]
    fn report_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();
        let json_path = dir.path().join("report.json");
        let md_path = dir.path().join("report.md");
        report.save_json(&json_path).unwrap();
        report.save_markdown(&md_path).unwrap();
        assert!(std::fs::read_to_string(json_path).unwrap().contains("h2d_transfer"));
        assert!(std::fs::read_to_string(md_path).unwrap().contains("# GPU Fractional Delay"));
    }
}
