//! Fractional-delay interpolation for multi-beam signal buffers.
//!
//! Shifts each beam by a real number of samples using 5-point Lagrange
//! interpolation against the 48-row coefficient table. The CPU path here is
//! the reference implementation; the GPU kernel in `farrow-gpu` executes the
//! same arithmetic, tap for tap, including the two-step boundary policy
//! (reflect, then re-check bounds), so outputs are comparable within float
//! tolerance.

pub mod cpu;
pub mod params;

pub use cpu::{apply_fractional_delay, tap_index};
pub use params::DelayParams;

use thiserror::Error;

/// Errors from the fractional-delay processing path.
#[derive(Debug, Error)]
pub enum DelayError {
    #[error("delay coefficient count {got} does not match beam count {expected}")]
    CoefficientCountMismatch { expected: usize, got: usize },

    #[error("buffer is structurally invalid: {num_beams} beams x {num_samples} samples")]
    InvalidBuffer { num_beams: usize, num_samples: usize },
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, DelayError>;
