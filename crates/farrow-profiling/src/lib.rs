//! Timing instrumentation for the farrow processing chain.
//!
//! [`ProfilingEngine`] keeps named wall-clock timers with running aggregates;
//! [`GpuEventMetrics`] derives queue-wait / dispatch-wait / execution / total
//! durations from the four raw device timestamps (queued, submitted, started,
//! ended). Reports render the combined picture as JSON or Markdown.

pub mod engine;
pub mod event;
pub mod report;

pub use engine::{ProfilingEngine, TimingMetric};
pub use event::{EventTimestamps, GpuEventMetrics};
pub use report::{ProfilingReport, SystemInfo};

use thiserror::Error;

/// Errors from report serialization.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ReportError>;
