//! Errors from the OpenCL execution path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no OpenCL platform available")]
    NoPlatform,

    #[error("no suitable OpenCL device found")]
    NoDevice,

    #[error("failed to create OpenCL context: {0}")]
    Context(String),

    #[error("failed to create command queue: {0}")]
    Queue(String),

    #[error("program build failed:\n{log}")]
    BuildFailed { log: String },

    #[error("failed to create kernel '{name}': {reason}")]
    KernelCreate { name: String, reason: String },

    #[error("device buffer allocation failed ({size_bytes} bytes): {reason}")]
    Allocation { size_bytes: usize, reason: String },

    #[error("host/device transfer failed: {0}")]
    Transfer(String),

    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("coefficient table has not been uploaded to the device")]
    TableNotUploaded,

    #[error("backend is not initialized")]
    NotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, GpuError>;
