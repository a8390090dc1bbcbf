//! Multi-beam complex sample storage.
//!
//! A [`SignalBuffer`] is logically `num_beams` independent sample streams of
//! identical length, stored as one contiguous beam-major `Complex32` vector.
//! The physical length always equals `num_beams * num_samples`; there are no
//! jagged beams.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use num_complex::Complex32;
use tracing::debug;

use crate::error::{Result, SignalError};
use crate::Sample;

/// Maximum number of beams a buffer may hold.
pub const MAX_BEAMS: usize = 256;
/// Minimum number of samples per beam.
pub const MIN_SAMPLES: usize = 100;
/// Maximum number of samples per beam.
pub const MAX_SAMPLES: usize = 1_300_000;

/// Owned 2D-logical, 1D-physical array of complex samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    num_beams: usize,
    num_samples: usize,
    samples: Vec<Sample>,
}

impl SignalBuffer {
    /// Create a zero-filled buffer with the given dimensions.
    pub fn new(num_beams: usize, num_samples: usize) -> Result<Self> {
        validate_dimensions(num_beams, num_samples)?;
        Ok(Self {
            num_beams,
            num_samples,
            samples: vec![Complex32::new(0.0, 0.0); num_beams * num_samples],
        })
    }

    /// Create an empty buffer to be resized or loaded later.
    pub fn empty() -> Self {
        Self { num_beams: 0, num_samples: 0, samples: Vec::new() }
    }

    /// Resize the buffer, zero-filling all samples.
    pub fn resize(&mut self, num_beams: usize, num_samples: usize) -> Result<()> {
        validate_dimensions(num_beams, num_samples)?;
        self.num_beams = num_beams;
        self.num_samples = num_samples;
        self.samples.clear();
        self.samples.resize(num_beams * num_samples, Complex32::new(0.0, 0.0));
        Ok(())
    }

    pub fn num_beams(&self) -> usize {
        self.num_beams
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Total number of complex samples across all beams.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether dimensions are in range and storage matches them.
    pub fn is_valid(&self) -> bool {
        validate_dimensions(self.num_beams, self.num_samples).is_ok()
            && self.samples.len() == self.num_beams * self.num_samples
    }

    /// Samples of one beam.
    pub fn beam(&self, beam: usize) -> Result<&[Sample]> {
        self.check_beam(beam)?;
        let start = beam * self.num_samples;
        Ok(&self.samples[start..start + self.num_samples])
    }

    /// Mutable samples of one beam.
    pub fn beam_mut(&mut self, beam: usize) -> Result<&mut [Sample]> {
        self.check_beam(beam)?;
        let start = beam * self.num_samples;
        let end = start + self.num_samples;
        Ok(&mut self.samples[start..end])
    }

    /// The whole beam-major sample store.
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Zero-fill every sample, keeping dimensions.
    pub fn clear(&mut self) {
        self.samples.fill(Complex32::new(0.0, 0.0));
    }

    /// Conjugate every sample in place.
    pub fn conjugate_in_place(&mut self) {
        for s in &mut self.samples {
            s.im = -s.im;
        }
    }

    /// Mix every beam down by `freq_hz` in place.
    ///
    /// Multiplies sample `n` of each beam by `exp(-i 2π f n / fs)`.
    pub fn heterodyne_in_place(&mut self, freq_hz: f32, sample_rate: f32) {
        let step = -2.0 * std::f32::consts::PI * freq_hz / sample_rate;
        for beam in 0..self.num_beams {
            let base = beam * self.num_samples;
            for n in 0..self.num_samples {
                let phase = step * n as f32;
                let lo = Complex32::new(phase.cos(), phase.sin());
                self.samples[base + n] *= lo;
            }
        }
    }

    /// Load a buffer from its binary file form.
    ///
    /// Layout: `u32 num_beams`, `u32 num_samples` (little-endian), then
    /// `num_beams * num_samples` little-endian `(f32 real, f32 imag)` pairs
    /// in beam-major order.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let num_beams = read_u32(&mut reader)? as usize;
        let num_samples = read_u32(&mut reader)? as usize;
        validate_dimensions(num_beams, num_samples)?;

        let total = num_beams * num_samples;
        let mut raw = vec![0u8; total * 8];
        reader.read_exact(&mut raw).map_err(|_| {
            SignalError::TruncatedFile(format!(
                "{}: expected {} samples",
                path.display(),
                total
            ))
        })?;

        let mut samples = Vec::with_capacity(total);
        for chunk in raw.chunks_exact(8) {
            let re = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let im = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            samples.push(Complex32::new(re, im));
        }

        debug!(beams = num_beams, samples = num_samples, path = %path.display(), "loaded signal buffer");
        Ok(Self { num_beams, num_samples, samples })
    }

    /// Save the buffer in its binary file form. See [`Self::load_from_file`].
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.is_valid() {
            return Err(SignalError::InvalidDimensions {
                num_beams: self.num_beams,
                num_samples: self.num_samples,
            });
        }

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&(self.num_beams as u32).to_le_bytes())?;
        writer.write_all(&(self.num_samples as u32).to_le_bytes())?;
        for s in &self.samples {
            writer.write_all(&s.re.to_le_bytes())?;
            writer.write_all(&s.im.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn check_beam(&self, beam: usize) -> Result<()> {
        if beam >= self.num_beams {
            return Err(SignalError::BeamOutOfRange { beam, num_beams: self.num_beams });
        }
        Ok(())
    }
}

fn validate_dimensions(num_beams: usize, num_samples: usize) -> Result<()> {
    if num_beams == 0
        || num_beams > MAX_BEAMS
        || num_samples < MIN_SAMPLES
        || num_samples > MAX_SAMPLES
    {
        return Err(SignalError::InvalidDimensions { num_beams, num_samples });
    }
    Ok(())
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut b = [0u8; 4];
    reader
        .read_exact(&mut b)
        .map_err(|_| SignalError::TruncatedFile("header".into()))?;
    Ok(u32::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_are_validated() {
        assert!(SignalBuffer::new(0, 1024).is_err());
        assert!(SignalBuffer::new(257, 1024).is_err());
        assert!(SignalBuffer::new(8, 99).is_err());
        assert!(SignalBuffer::new(8, 1_300_001).is_err());
        assert!(SignalBuffer::new(256, 100).is_ok());
    }

    #[test]
    fn storage_length_matches_dimensions() {
        let buf = SignalBuffer::new(4, 256).unwrap();
        assert_eq!(buf.len(), 4 * 256);
        assert!(buf.is_valid());
    }

    #[test]
    fn beam_slices_are_disjoint_and_sized() {
        let mut buf = SignalBuffer::new(3, 128).unwrap();
        buf.beam_mut(1).unwrap()[0] = Complex32::new(1.0, -1.0);
        assert_eq!(buf.beam(0).unwrap()[0], Complex32::new(0.0, 0.0));
        assert_eq!(buf.beam(1).unwrap()[0], Complex32::new(1.0, -1.0));
        assert_eq!(buf.beam(2).unwrap().len(), 128);
        assert!(buf.beam(3).is_err());
    }

    #[test]
    fn conjugate_flips_imaginary_part() {
        let mut buf = SignalBuffer::new(1, 100).unwrap();
        buf.beam_mut(0).unwrap()[7] = Complex32::new(0.5, 0.25);
        buf.conjugate_in_place();
        assert_eq!(buf.beam(0).unwrap()[7], Complex32::new(0.5, -0.25));
    }

    #[test]
    fn heterodyne_preserves_magnitude() {
        let mut buf = SignalBuffer::new(1, 100).unwrap();
        for s in buf.as_mut_slice() {
            *s = Complex32::new(1.0, 0.0);
        }
        buf.heterodyne_in_place(100.0, 8000.0);
        for s in buf.as_slice() {
            assert!((s.norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn file_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beams.bin");

        let mut buf = SignalBuffer::new(3, 200).unwrap();
        for (i, s) in buf.as_mut_slice().iter_mut().enumerate() {
            *s = Complex32::new(i as f32 * 0.25, -(i as f32) * 0.5);
        }
        buf.save_to_file(&path).unwrap();

        let loaded = SignalBuffer::load_from_file(&path).unwrap();
        assert_eq!(loaded.num_beams(), 3);
        assert_eq!(loaded.num_samples(), 200);
        assert_eq!(loaded.as_slice(), buf.as_slice());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");

        let mut f = File::create(&path).unwrap();
        f.write_all(&2u32.to_le_bytes()).unwrap();
        f.write_all(&100u32.to_le_bytes()).unwrap();
        f.write_all(&[0u8; 64]).unwrap();
        drop(f);

        assert!(matches!(
            SignalBuffer::load_from_file(&path),
            Err(SignalError::TruncatedFile(_))
        ));
    }

    #[test]
    fn bad_header_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");

        let mut f = File::create(&path).unwrap();
        f.write_all(&999u32.to_le_bytes()).unwrap();
        f.write_all(&100u32.to_le_bytes()).unwrap();
        drop(f);

        assert!(SignalBuffer::load_from_file(&path).is_err());
    }
}
