//! LFM (linear frequency modulated) chirp synthesis.
//!
//! Instantaneous phase is `2π (f_start·t + ½·k·t²)` with chirp rate
//! `k = (f_stop − f_start) / duration`. Five per-beam variants mirror the
//! common array test scenarios: identical beams, phase steering, integer
//! sample delay, beamforming phase shift, and Hamming windowing.

use num_complex::Complex32;
use tracing::debug;

use crate::buffer::SignalBuffer;
use crate::error::{Result, SignalError};

const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

/// How each beam of a generated buffer differs from the reference chirp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChirpVariant {
    /// Same signal on every beam.
    Basic,
    /// Constant phase offset per beam (radians per beam index).
    PhaseOffset(f32),
    /// Integer sample delay per beam (samples per beam index); samples
    /// before the onset are zero.
    Delay(f32),
    /// Beamforming phase shift derived from the steering angle.
    Beamforming,
    /// Reference chirp under a Hamming window.
    Windowed,
}

/// Chirp generation parameters, validated eagerly at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChirpParameters {
    pub f_start: f32,
    pub f_stop: f32,
    pub sample_rate: f32,
    pub duration: f32,
    pub num_beams: usize,
    /// Steering angle in degrees, used by [`ChirpVariant::Beamforming`].
    pub steering_angle: f32,
}

impl ChirpParameters {
    pub fn validate(&self) -> Result<()> {
        if self.f_start <= 0.0 || self.f_stop <= self.f_start {
            return Err(SignalError::InvalidChirpParameters(format!(
                "frequency range must satisfy 0 < f_start < f_stop, got {}..{}",
                self.f_start, self.f_stop
            )));
        }
        if self.sample_rate <= 2.0 * self.f_stop {
            return Err(SignalError::InvalidChirpParameters(format!(
                "sample rate {} violates Nyquist for f_stop {}",
                self.sample_rate, self.f_stop
            )));
        }
        if self.duration <= 0.0 {
            return Err(SignalError::InvalidChirpParameters(format!(
                "duration must be positive, got {}",
                self.duration
            )));
        }
        if self.num_beams == 0 {
            return Err(SignalError::InvalidChirpParameters("zero beams".into()));
        }
        Ok(())
    }

    /// Sweep rate in Hz per second.
    pub fn chirp_rate(&self) -> f32 {
        (self.f_stop - self.f_start) / self.duration
    }

    /// Samples per beam implied by duration and sample rate.
    pub fn num_samples(&self) -> usize {
        (self.duration * self.sample_rate) as usize
    }
}

/// Generates multi-beam LFM chirp buffers.
#[derive(Debug)]
pub struct ChirpGenerator {
    params: ChirpParameters,
}

impl ChirpGenerator {
    /// Create a generator; fails on invalid parameters.
    pub fn new(params: ChirpParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ChirpParameters {
        &self.params
    }

    /// Generate a fresh buffer with the given per-beam variant.
    pub fn generate(&self, variant: ChirpVariant) -> Result<SignalBuffer> {
        let num_samples = self.params.num_samples();
        let mut buffer = SignalBuffer::new(self.params.num_beams, num_samples)?;
        self.generate_into(&mut buffer, variant)?;
        Ok(buffer)
    }

    /// Fill an existing buffer with the given per-beam variant.
    pub fn generate_into(&self, buffer: &mut SignalBuffer, variant: ChirpVariant) -> Result<()> {
        let num_samples = buffer.num_samples();
        debug!(?variant, beams = buffer.num_beams(), samples = num_samples, "generating chirp");

        for beam in 0..buffer.num_beams() {
            let data = buffer.beam_mut(beam)?;
            match variant {
                ChirpVariant::Basic => self.fill_basic(data, 0.0),
                ChirpVariant::PhaseOffset(step) => self.fill_basic(data, step * beam as f32),
                ChirpVariant::Delay(step) => self.fill_delayed(data, step * beam as f32),
                ChirpVariant::Beamforming => {
                    let shift = TWO_PI
                        * beam as f32
                        * self.params.steering_angle.to_radians().sin()
                        / self.params.num_beams as f32;
                    self.fill_basic(data, shift)
                }
                ChirpVariant::Windowed => self.fill_windowed(data),
            }
        }
        Ok(())
    }

    fn phase_at(&self, t: f32, offset: f32) -> f32 {
        TWO_PI * (self.params.f_start * t + 0.5 * self.params.chirp_rate() * t * t) + offset
    }

    fn fill_basic(&self, data: &mut [Complex32], phase_offset: f32) {
        let inv_fs = 1.0 / self.params.sample_rate;
        for (n, s) in data.iter_mut().enumerate() {
            let phase = self.phase_at(n as f32 * inv_fs, phase_offset);
            *s = Complex32::new(phase.cos(), phase.sin());
        }
    }

    fn fill_delayed(&self, data: &mut [Complex32], delay_samples: f32) {
        let delay_int = delay_samples as i64;
        let inv_fs = 1.0 / self.params.sample_rate;
        for (n, s) in data.iter_mut().enumerate() {
            let delayed = n as i64 - delay_int;
            if delayed < 0 {
                *s = Complex32::new(0.0, 0.0);
            } else {
                let phase = self.phase_at(delayed as f32 * inv_fs, 0.0);
                *s = Complex32::new(phase.cos(), phase.sin());
            }
        }
    }

    fn fill_windowed(&self, data: &mut [Complex32]) {
        let inv_fs = 1.0 / self.params.sample_rate;
        let inv_duration = 1.0 / self.params.duration;
        for (n, s) in data.iter_mut().enumerate() {
            let t = n as f32 * inv_fs;
            let window = 0.54 - 0.46 * (TWO_PI * t * inv_duration).cos();
            let phase = self.phase_at(t, 0.0);
            *s = Complex32::new(phase.cos(), phase.sin()) * window;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> ChirpParameters {
        ChirpParameters {
            f_start: 100.0,
            f_stop: 500.0,
            sample_rate: 8000.0,
            duration: 0.125,
            num_beams: 4,
            steering_angle: 30.0,
        }
    }

    #[test]
    fn parameters_are_validated() {
        let mut p = test_params();
        p.f_start = -1.0;
        assert!(ChirpGenerator::new(p).is_err());

        let mut p = test_params();
        p.f_stop = 50.0;
        assert!(ChirpGenerator::new(p).is_err());

        let mut p = test_params();
        p.sample_rate = 900.0; // below 2 * f_stop
        assert!(ChirpGenerator::new(p).is_err());

        let mut p = test_params();
        p.duration = 0.0;
        assert!(ChirpGenerator::new(p).is_err());

        let mut p = test_params();
        p.num_beams = 0;
        assert!(ChirpGenerator::new(p).is_err());

        assert!(ChirpGenerator::new(test_params()).is_ok());
    }

    #[test]
    fn basic_variant_is_unit_magnitude_and_identical_across_beams() {
        let gen = ChirpGenerator::new(test_params()).unwrap();
        let buf = gen.generate(ChirpVariant::Basic).unwrap();
        for s in buf.as_slice() {
            assert!((s.norm() - 1.0).abs() < 1e-5);
        }
        assert_eq!(buf.beam(0).unwrap(), buf.beam(3).unwrap());
    }

    #[test]
    fn delay_variant_zero_fills_before_onset() {
        let gen = ChirpGenerator::new(test_params()).unwrap();
        let buf = gen.generate(ChirpVariant::Delay(3.0)).unwrap();
        // Beam 2 is delayed by 6 samples.
        let beam2 = buf.beam(2).unwrap();
        for s in &beam2[..6] {
            assert_eq!(*s, Complex32::new(0.0, 0.0));
        }
        assert!(beam2[6].norm() > 0.5);
        // The delayed beam reproduces the start of beam 0.
        let beam0 = buf.beam(0).unwrap();
        assert_eq!(beam2[6], beam0[0]);
    }

    #[test]
    fn windowed_variant_tapers_edges() {
        let gen = ChirpGenerator::new(test_params()).unwrap();
        let buf = gen.generate(ChirpVariant::Windowed).unwrap();
        let beam = buf.beam(0).unwrap();
        // Hamming endpoints are 0.08 of peak.
        assert!(beam[0].norm() < 0.1);
        assert!(beam[beam.len() / 2].norm() > 0.5);
    }
}
