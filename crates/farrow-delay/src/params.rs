//! Per-beam delay decomposition.

use farrow_signal::CoefficientTable;

/// A real-valued delay split into the parts the interpolation consumes.
///
/// `delay_integer = floor(delay)` leaves the fractional part in `[0, 1)`,
/// so a negative fraction is normalized by borrowing one unit from the
/// integer part: a delay of `-0.3` decomposes to `(-1, row(0.7))`.
///
/// The layout matches the kernel-side `int2` parameter array; the pairs are
/// computed on the host so CPU and GPU always agree on row selection.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DelayParams {
    pub delay_integer: i32,
    pub lagrange_row: i32,
}

impl DelayParams {
    /// Decompose a delay in samples.
    pub fn from_delay(delay: f32) -> Self {
        let delay_integer = delay.floor() as i32;
        let fraction = delay - delay_integer as f32;
        Self {
            delay_integer,
            lagrange_row: CoefficientTable::row_index(fraction) as i32,
        }
    }

    /// Decompose one delay per beam.
    pub fn from_delays(delays: &[f32]) -> Vec<Self> {
        delays.iter().copied().map(Self::from_delay).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_is_identity_row() {
        let p = DelayParams::from_delay(0.0);
        assert_eq!(p.delay_integer, 0);
        assert_eq!(p.lagrange_row, 0);
    }

    #[test]
    fn negative_fraction_borrows_from_integer_part() {
        let p = DelayParams::from_delay(-0.3);
        assert_eq!(p.delay_integer, -1);
        // fraction 0.7 -> floor(0.7 * 48) = 33
        assert_eq!(p.lagrange_row, 33);
    }

    #[test]
    fn fraction_near_one_clamps_to_last_row() {
        let p = DelayParams::from_delay(5.999999);
        assert_eq!(p.delay_integer, 5);
        assert!(p.lagrange_row <= 47);
    }

    #[test]
    fn pure_integer_delays_use_row_zero() {
        for d in [-7.0, -1.0, 0.0, 3.0, 100.0] {
            let p = DelayParams::from_delay(d);
            assert_eq!(p.delay_integer, d as i32);
            assert_eq!(p.lagrange_row, 0);
        }
    }

    #[test]
    fn per_beam_decomposition() {
        let params = DelayParams::from_delays(&[0.0, 0.125, 0.25]);
        assert_eq!(params.len(), 3);
        assert_eq!(params[1].lagrange_row, 6); // 0.125 * 48
        assert_eq!(params[2].lagrange_row, 12);
    }
}
