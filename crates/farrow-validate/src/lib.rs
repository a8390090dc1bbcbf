//! Element-wise comparison of two processed signal buffers.
//!
//! Used to validate that the device path reproduces the host reference
//! path within a tolerance. Shape and validity checks run before any
//! element access so a mismatch reports as an error, not a huge diff.

use serde::Serialize;
use thiserror::Error;

use farrow_signal::SignalBuffer;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("buffer shapes differ: reference {ref_beams}x{ref_samples}, candidate {cand_beams}x{cand_samples}")]
    ShapeMismatch {
        ref_beams: usize,
        ref_samples: usize,
        cand_beams: usize,
        cand_samples: usize,
    },

    #[error("buffer dimensions out of range: {num_beams} beams x {num_samples} samples")]
    InvalidBuffer { num_beams: usize, num_samples: usize },
}

pub type Result<T> = std::result::Result<T, CompareError>;

/// Aggregate difference statistics between a reference and a candidate buffer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonMetrics {
    pub max_diff_real: f32,
    pub max_diff_imag: f32,
    pub max_diff_magnitude: f32,
    pub avg_diff_magnitude: f64,
    /// Largest |diff| / |reference|, skipping reference values near zero.
    pub max_relative_error: f32,
    /// Count of points whose magnitude difference exceeds the tolerance.
    pub errors_above_tolerance: usize,
    pub total_points: usize,
    pub tolerance: f32,
}

impl ComparisonMetrics {
    /// True when every point is within tolerance.
    pub fn passed(&self) -> bool {
        self.errors_above_tolerance == 0
    }
}

impl std::fmt::Display for ComparisonMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Comparison over {} points (tolerance {:.1e}):", self.total_points, self.tolerance)?;
        writeln!(f, "  max diff real:      {:.3e}", self.max_diff_real)?;
        writeln!(f, "  max diff imag:      {:.3e}", self.max_diff_imag)?;
        writeln!(f, "  max diff magnitude: {:.3e}", self.max_diff_magnitude)?;
        writeln!(f, "  avg diff magnitude: {:.3e}", self.avg_diff_magnitude)?;
        writeln!(f, "  max relative error: {:.3e}", self.max_relative_error)?;
        writeln!(f, "  above tolerance:    {}", self.errors_above_tolerance)?;
        write!(f, "  result:             {}", if self.passed() { "PASS" } else { "FAIL" })
    }
}

/// Reference magnitudes below this are excluded from relative error.
const RELATIVE_ERROR_FLOOR: f32 = 1e-10;

/// Compare `candidate` against `reference` element by element.
pub fn compare_buffers(
    reference: &SignalBuffer,
    candidate: &SignalBuffer,
    tolerance: f32,
) -> Result<ComparisonMetrics> {
    if !reference.is_valid() {
        return Err(CompareError::InvalidBuffer {
            num_beams: reference.num_beams(),
            num_samples: reference.num_samples(),
        });
    }
    if reference.num_beams() != candidate.num_beams()
        || reference.num_samples() != candidate.num_samples()
    {
        return Err(CompareError::ShapeMismatch {
            ref_beams: reference.num_beams(),
            ref_samples: reference.num_samples(),
            cand_beams: candidate.num_beams(),
            cand_samples: candidate.num_samples(),
        });
    }

    let mut metrics = ComparisonMetrics {
        total_points: reference.as_slice().len(),
        tolerance,
        ..Default::default()
    };

    let mut magnitude_sum = 0.0f64;
    for (r, c) in reference.as_slice().iter().zip(candidate.as_slice()) {
        let diff = c - r;
        let diff_magnitude = diff.norm();

        metrics.max_diff_real = metrics.max_diff_real.max(diff.re.abs());
        metrics.max_diff_imag = metrics.max_diff_imag.max(diff.im.abs());
        metrics.max_diff_magnitude = metrics.max_diff_magnitude.max(diff_magnitude);
        magnitude_sum += diff_magnitude as f64;

        let ref_magnitude = r.norm();
        if ref_magnitude > RELATIVE_ERROR_FLOOR {
            metrics.max_relative_error =
                metrics.max_relative_error.max(diff_magnitude / ref_magnitude);
        }

        if diff_magnitude > tolerance {
            metrics.errors_above_tolerance += 1;
        }
    }

    if metrics.total_points > 0 {
        metrics.avg_diff_magnitude = magnitude_sum / metrics.total_points as f64;
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use farrow_signal::Sample;

    fn buffer_with(num_beams: usize, num_samples: usize, f: impl Fn(usize) -> Sample) -> SignalBuffer {
        let mut buf = SignalBuffer::new(num_beams, num_samples).unwrap();
        for (i, s) in buf.as_mut_slice().iter_mut().enumerate() {
            *s = f(i);
        }
        buf
    }

    #[test]
    fn identical_buffers_pass_with_zero_diffs() {
        let a = buffer_with(2, 128, |i| Sample::new(i as f32, -(i as f32)));
        let b = a.clone();
        let m = compare_buffers(&a, &b, 1e-6).unwrap();
        assert!(m.passed());
        assert_eq!(m.max_diff_magnitude, 0.0);
        assert_eq!(m.avg_diff_magnitude, 0.0);
        assert_eq!(m.total_points, 256);
    }

    #[test]
    fn single_perturbed_point_is_counted() {
        let a = buffer_with(1, 128, |_| Sample::new(1.0, 0.0));
        let mut b = a.clone();
        b.as_mut_slice()[17] = Sample::new(1.0 + 1e-3, 0.0);
        let m = compare_buffers(&a, &b, 1e-5).unwrap();
        assert!(!m.passed());
        assert_eq!(m.errors_above_tolerance, 1);
        assert!((m.max_diff_real - 1e-3).abs() < 1e-7);
        assert!((m.max_relative_error - 1e-3).abs() < 1e-6);
    }

    #[test]
    fn relative_error_skips_near_zero_reference() {
        let a = buffer_with(1, 128, |_| Sample::new(0.0, 0.0));
        let mut b = a.clone();
        b.as_mut_slice()[0] = Sample::new(0.5, 0.0);
        let m = compare_buffers(&a, &b, 1e-5).unwrap();
        // Absolute diff is seen, relative error is not.
        assert!((m.max_diff_magnitude - 0.5).abs() < 1e-7);
        assert_eq!(m.max_relative_error, 0.0);
    }

    #[test]
    fn imaginary_diffs_tracked_separately() {
        let a = buffer_with(1, 128, |_| Sample::new(1.0, 1.0));
        let mut b = a.clone();
        b.as_mut_slice()[3] = Sample::new(1.0, 1.0 + 2e-3);
        let m = compare_buffers(&a, &b, 1e-2).unwrap();
        assert!(m.passed());
        assert_eq!(m.max_diff_real, 0.0);
        assert!((m.max_diff_imag - 2e-3).abs() < 1e-7);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = buffer_with(2, 128, |_| Sample::new(0.0, 0.0));
        let b = buffer_with(2, 256, |_| Sample::new(0.0, 0.0));
        match compare_buffers(&a, &b, 1e-5) {
            Err(CompareError::ShapeMismatch { ref_samples: 128, cand_samples: 256, .. }) => {}
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn display_reports_pass_fail() {
        let a = buffer_with(1, 128, |_| Sample::new(1.0, 0.0));
        let m = compare_buffers(&a, &a.clone(), 1e-6).unwrap();
        assert!(m.to_string().contains("PASS"));
    }
}
