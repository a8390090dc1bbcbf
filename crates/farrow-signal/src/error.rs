//! Error types for the signal data model.

use thiserror::Error;

/// Errors arising from buffer construction, coefficient loading and file I/O.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid buffer dimensions: {num_beams} beams x {num_samples} samples")]
    InvalidDimensions { num_beams: usize, num_samples: usize },

    #[error("beam index {beam} out of range (buffer has {num_beams} beams)")]
    BeamOutOfRange { beam: usize, num_beams: usize },

    #[error("coefficient table shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    TableShapeMismatch { expected_rows: usize, expected_cols: usize, rows: usize, cols: usize },

    #[error("invalid chirp parameters: {0}")]
    InvalidChirpParameters(String),

    #[error("truncated buffer file: {0}")]
    TruncatedFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, SignalError>;
