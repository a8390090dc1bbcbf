//! Multi-beam complex signal data model for the farrow processing chain.
//!
//! Provides [`SignalBuffer`] (beams × samples of interleaved `Complex32`),
//! the 48×5 Lagrange [`CoefficientTable`] used for fractional-delay
//! interpolation, lossless binary buffer files, and LFM chirp synthesis.

pub mod buffer;
pub mod chirp;
pub mod coefficients;
pub mod error;

pub use buffer::{SignalBuffer, MAX_BEAMS, MAX_SAMPLES, MIN_SAMPLES};
pub use chirp::{ChirpGenerator, ChirpParameters, ChirpVariant};
pub use coefficients::{CoefficientTable, LAGRANGE_ROWS, LAGRANGE_TAPS};
pub use error::{Result, SignalError};

/// Complex sample type shared by every component in the workspace.
pub type Sample = num_complex::Complex32;
