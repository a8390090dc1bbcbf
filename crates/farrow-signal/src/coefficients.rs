//! Lagrange interpolation coefficient table.
//!
//! 48 rows of 5 weights each. Row `r` holds the 5-tap Lagrange basis
//! evaluated at `x = 2 - r/48` over the nodes `{0, 1, 2, 3, 4}`: the tap
//! window covers input positions `n - delay_integer - 2 + i`, so evaluating
//! a fraction of a sample *below* the center tap delays the signal by that
//! fraction. A fractional delay in `[0, 1)` maps to exactly one row via
//! `floor(fraction * 48)` clamped to 47. Row 0 is the exact identity row
//! `[0, 0, 1, 0, 0]`.

use std::path::Path;

use crate::error::{Result, SignalError};

/// Number of discretized fractional-delay buckets.
pub const LAGRANGE_ROWS: usize = 48;
/// Interpolation order (5-point).
pub const LAGRANGE_TAPS: usize = 5;

/// Immutable 48×5 table of interpolation weights.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    // Row-major, LAGRANGE_ROWS * LAGRANGE_TAPS entries.
    weights: Vec<f32>,
}

impl CoefficientTable {
    /// Compute the table analytically.
    pub fn generate() -> Self {
        let mut weights = Vec::with_capacity(LAGRANGE_ROWS * LAGRANGE_TAPS);
        for row in 0..LAGRANGE_ROWS {
            let x = 2.0_f64 - row as f64 / LAGRANGE_ROWS as f64;
            for i in 0..LAGRANGE_TAPS {
                let mut w = 1.0_f64;
                for j in 0..LAGRANGE_TAPS {
                    if j != i {
                        w *= (x - j as f64) / (i as f64 - j as f64);
                    }
                }
                weights.push(w as f32);
            }
        }
        Self { weights }
    }

    /// Parse a table from a JSON array of 48 arrays of 5 numbers.
    ///
    /// Rejects any row or column count mismatch.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rows: Vec<Vec<f32>> = serde_json::from_str(json)?;
        if rows.len() != LAGRANGE_ROWS {
            return Err(SignalError::TableShapeMismatch {
                expected_rows: LAGRANGE_ROWS,
                expected_cols: LAGRANGE_TAPS,
                rows: rows.len(),
                cols: rows.first().map_or(0, Vec::len),
            });
        }
        let mut weights = Vec::with_capacity(LAGRANGE_ROWS * LAGRANGE_TAPS);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != LAGRANGE_TAPS {
                return Err(SignalError::TableShapeMismatch {
                    expected_rows: LAGRANGE_ROWS,
                    expected_cols: LAGRANGE_TAPS,
                    rows: r + 1,
                    cols: row.len(),
                });
            }
            weights.extend_from_slice(row);
        }
        Ok(Self { weights })
    }

    /// Load a table from a JSON file. See [`Self::from_json_str`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Weight at `(row, tap)`. Panics on out-of-range indices.
    pub fn weight(&self, row: usize, tap: usize) -> f32 {
        assert!(row < LAGRANGE_ROWS && tap < LAGRANGE_TAPS);
        self.weights[row * LAGRANGE_TAPS + tap]
    }

    /// One row of 5 weights.
    pub fn row(&self, row: usize) -> &[f32] {
        assert!(row < LAGRANGE_ROWS);
        &self.weights[row * LAGRANGE_TAPS..(row + 1) * LAGRANGE_TAPS]
    }

    /// The raw row-major weight slice, for device upload.
    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Map a fractional delay to its table row.
    ///
    /// The fraction is normalized into `[0, 1)` first, so any real input is
    /// accepted; the result is always in `[0, 47]`.
    pub fn row_index(delay_fraction: f32) -> usize {
        let mut f = delay_fraction % 1.0;
        if f < 0.0 {
            f += 1.0;
        }
        let row = (f * LAGRANGE_ROWS as f32) as usize;
        row.min(LAGRANGE_ROWS - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_table_has_identity_row_zero() {
        let table = CoefficientTable::generate();
        let row0 = table.row(0);
        assert_eq!(row0[2], 1.0);
        for (i, &w) in row0.iter().enumerate() {
            if i != 2 {
                assert!(w.abs() < 1e-7, "tap {i} = {w}");
            }
        }
    }

    #[test]
    fn generated_rows_sum_to_one() {
        // Lagrange basis functions always sum to 1 at any evaluation point.
        let table = CoefficientTable::generate();
        for row in 0..LAGRANGE_ROWS {
            let sum: f32 = table.row(row).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row {row} sums to {sum}");
        }
    }

    #[test]
    fn rows_evaluate_below_the_center_tap() {
        // Lagrange interpolation reproduces f(x) = x exactly, so the
        // weighted sum of the node indices recovers the evaluation point.
        // Row r must sit r/48 of a sample below the center tap, which is
        // what turns the window sum into a delay rather than an advance.
        let table = CoefficientTable::generate();
        for row in 0..LAGRANGE_ROWS {
            let x: f32 = table.row(row).iter().enumerate().map(|(i, &w)| w * i as f32).sum();
            let expected = 2.0 - row as f32 / LAGRANGE_ROWS as f32;
            assert!((x - expected).abs() < 1e-4, "row {row}: {x} vs {expected}");
        }
    }

    #[test]
    fn row_index_bounds() {
        assert_eq!(CoefficientTable::row_index(0.0), 0);
        assert_eq!(CoefficientTable::row_index(1.0 - 1e-6), 47);
        for i in 0..48 {
            let f = i as f32 / 48.0;
            assert_eq!(CoefficientTable::row_index(f), i);
        }
    }

    #[test]
    fn row_index_normalizes_out_of_range_fractions() {
        assert_eq!(CoefficientTable::row_index(-0.5), CoefficientTable::row_index(0.5));
        assert_eq!(CoefficientTable::row_index(1.25), CoefficientTable::row_index(0.25));
    }

    #[test]
    fn json_round_trip() {
        let table = CoefficientTable::generate();
        let rows: Vec<&[f32]> = (0..LAGRANGE_ROWS).map(|r| table.row(r)).collect();
        let json = serde_json::to_string(&rows).unwrap();
        let parsed = CoefficientTable::from_json_str(&json).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn json_rejects_wrong_row_count() {
        let json = serde_json::to_string(&vec![[0.0f32; 5]; 47]).unwrap();
        assert!(matches!(
            CoefficientTable::from_json_str(&json),
            Err(SignalError::TableShapeMismatch { .. })
        ));
    }

    #[test]
    fn json_rejects_wrong_column_count() {
        let mut rows = vec![vec![0.0f32; 5]; 48];
        rows[10] = vec![0.0f32; 4];
        let json = serde_json::to_string(&rows).unwrap();
        assert!(matches!(
            CoefficientTable::from_json_str(&json),
            Err(SignalError::TableShapeMismatch { .. })
        ));
    }
}
