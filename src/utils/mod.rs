//! # Utilities
//!
//! Shared helpers for dense linear predictors and matrix hygiene checks
//! built on faer matrices.

use faer::Mat;

/// Dense matrix-vector product returning a plain vector.
///
/// A zero-column design yields a zero vector with one entry per row, which is
/// the linear predictor of an absent block.
#[must_use]
pub fn mat_vec(design: &Mat<f64>, coefficients: &[f64]) -> Vec<f64> {
    debug_assert_eq!(design.ncols(), coefficients.len());
    let column = Mat::from_fn(coefficients.len(), 1, |row, _| coefficients[row]);
    let values = design * &column;
    (0..values.nrows()).map(|row| values[(row, 0)]).collect()
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

/// Largest absolute entry-wise difference between two equally shaped matrices.
#[must_use]
pub fn max_abs_diff(a: &Mat<f64>, b: &Mat<f64>) -> f64 {
    let mut max = 0.0;
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            let diff = (a[(i, j)] - b[(i, j)]).abs();
            if diff > max {
                max = diff;
            }
        }
    }
    max
}
