//! GPU event timing derived from device profiling counters.

use serde::Serialize;

/// The four raw nanosecond timestamps a profiled device operation exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTimestamps {
    pub queued: u64,
    pub submitted: u64,
    pub started: u64,
    pub ended: u64,
}

/// Derived timing breakdown for one named device operation.
#[derive(Debug, Clone, Serialize)]
pub struct GpuEventMetrics {
    /// Human-readable operation name.
    pub event_name: String,
    /// Time spent queued before submission to the device (ns).
    pub queue_ns: u64,
    /// Time between submission and execution start (ns).
    pub dispatch_ns: u64,
    /// Actual execution time on the device (ns).
    pub execution_ns: u64,
    /// Queue-to-completion wall time (ns).
    pub total_ns: u64,
}

impl GpuEventMetrics {
    /// Derive metrics from raw timestamps.
    ///
    /// Differences saturate at zero: device counters are monotonic per
    /// operation, but a driver may report equal adjacent timestamps.
    pub fn from_timestamps(name: impl Into<String>, ts: EventTimestamps) -> Self {
        Self {
            event_name: name.into(),
            queue_ns: ts.submitted.saturating_sub(ts.queued),
            dispatch_ns: ts.started.saturating_sub(ts.submitted),
            execution_ns: ts.ended.saturating_sub(ts.started),
            total_ns: ts.ended.saturating_sub(ts.queued),
        }
    }

    pub fn queue_ms(&self) -> f64 {
        self.queue_ns as f64 / 1e6
    }

    pub fn dispatch_ms(&self) -> f64 {
        self.dispatch_ns as f64 / 1e6
    }

    pub fn execution_ms(&self) -> f64 {
        self.execution_ns as f64 / 1e6
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ns as f64 / 1e6
    }
}

impl std::fmt::Display for GpuEventMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<28} queue={:>9.3}ms  dispatch={:>9.3}ms  exec={:>9.3}ms  total={:>9.3}ms",
            self.event_name,
            self.queue_ms(),
            self.dispatch_ms(),
            self.execution_ms(),
            self.total_ms(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_from_timestamps() {
        let m = GpuEventMetrics::from_timestamps(
            "kernel",
            EventTimestamps { queued: 100, submitted: 250, started: 400, ended: 900 },
        );
        assert_eq!(m.queue_ns, 150);
        assert_eq!(m.dispatch_ns, 150);
        assert_eq!(m.execution_ns, 500);
        assert_eq!(m.total_ns, 800);
    }

    #[test]
    fn millisecond_conversion() {
        let m = GpuEventMetrics::from_timestamps(
            "h2d",
            EventTimestamps { queued: 0, submitted: 0, started: 0, ended: 2_500_000 },
        );
        assert!((m.execution_ms() - 2.5).abs() < 1e-9);
        assert!((m.total_ms() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn equal_timestamps_saturate_to_zero() {
        let m = GpuEventMetrics::from_timestamps(
            "noop",
            EventTimestamps { queued: 7, submitted: 7, started: 7, ended: 7 },
        );
        assert_eq!(m.queue_ns, 0);
        assert_eq!(m.total_ns, 0);
    }

    #[test]
    fn display_contains_all_durations() {
        let m = GpuEventMetrics::from_timestamps(
            "d2h",
            EventTimestamps { queued: 0, submitted: 1, started: 2, ended: 3 },
        );
        let s = m.to_string();
        assert!(s.contains("d2h"));
        assert!(s.contains("queue="));
        assert!(s.contains("total="));
    }
}
