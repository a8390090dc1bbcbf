//! CPU reference implementation of the fractional-delay algorithm.

use num_complex::Complex32;
use tracing::debug;

use farrow_signal::{CoefficientTable, SignalBuffer};

use crate::params::DelayParams;
use crate::{DelayError, Result};

/// Resolve one interpolation tap index under the boundary policy.
///
/// Reflection first (`idx < 0` maps to `-idx`, `idx >= n` maps to
/// `2n - idx - 2`), then a bounds re-check: a tap that is still out of range
/// after reflection contributes nothing. The GPU kernel applies the same two
/// steps in the same order; do not collapse them into a single clamp.
pub fn tap_index(idx: i64, num_samples: usize) -> Option<usize> {
    let n = num_samples as i64;
    let mut idx = idx;
    if idx < 0 {
        idx = -idx;
    }
    if idx >= n {
        idx = 2 * n - idx - 2;
    }
    if (0..n).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}

/// Apply per-beam fractional delays in place.
///
/// Output sample `n` approximates input sample `n - delay` via the 5-tap
/// window at `n - delay_integer - 2 + i`. Results are written through a
/// temporary so in-place processing reads only pristine input.
pub fn apply_fractional_delay(
    buffer: &mut SignalBuffer,
    delays: &[f32],
    table: &CoefficientTable,
) -> Result<()> {
    if !buffer.is_valid() {
        return Err(DelayError::InvalidBuffer {
            num_beams: buffer.num_beams(),
            num_samples: buffer.num_samples(),
        });
    }
    if delays.len() != buffer.num_beams() {
        return Err(DelayError::CoefficientCountMismatch {
            expected: buffer.num_beams(),
            got: delays.len(),
        });
    }

    let num_beams = buffer.num_beams();
    let num_samples = buffer.num_samples();
    let params = DelayParams::from_delays(delays);
    debug!(beams = num_beams, samples = num_samples, "applying fractional delay on CPU");

    let mut output = vec![Complex32::new(0.0, 0.0); num_samples];
    for beam in 0..num_beams {
        let p = params[beam];
        let base = beam * num_samples;
        {
            let input = &buffer.as_slice()[base..base + num_samples];
            for (n, out) in output.iter_mut().enumerate() {
                *out = interpolate(input, n, p, table);
            }
        }
        buffer.as_mut_slice()[base..base + num_samples].copy_from_slice(&output);
    }
    Ok(())
}

fn interpolate(
    input: &[Complex32],
    n: usize,
    params: DelayParams,
    table: &CoefficientTable,
) -> Complex32 {
    let interp_idx = n as i64 - params.delay_integer as i64 - 2;
    let row = table.row(params.lagrange_row as usize);

    let mut acc = Complex32::new(0.0, 0.0);
    for (i, &weight) in row.iter().enumerate() {
        if let Some(idx) = tap_index(interp_idx + i as i64, input.len()) {
            acc += input[idx] * weight;
        }
    }
    acc
}
