//! Random-effects covariance decomposition.
//!
//! The covariance is carried as `D = diag(sds) * L'L * diag(sds)` where `L`
//! is the upper-triangular Cholesky factor of the correlation matrix with
//! unit-norm columns. The strictly-upper entries of `L` are the free
//! parameters; each column's diagonal entry is the norm remainder, so the
//! reconstructed `R = L'L` has an exactly unit diagonal by construction.

use faer::Mat;

/// Convert a covariance matrix to its correlation matrix.
#[must_use]
pub fn cov2cor(covariance: &Mat<f64>) -> Mat<f64> {
    let dim = covariance.ncols();
    Mat::from_fn(dim, dim, |row, col| {
        covariance[(row, col)]
            / (covariance[(row, row)].sqrt() * covariance[(col, col)].sqrt())
    })
}

/// Upper-triangular Cholesky factor `U` with `U'U = matrix`, or `None` if the
/// matrix is not positive definite.
#[must_use]
pub fn cholesky_upper(matrix: &Mat<f64>) -> Option<Mat<f64>> {
    let dim = matrix.ncols();
    if matrix.nrows() != dim {
        return None;
    }
    let mut lower = Mat::<f64>::zeros(dim, dim);
    for row in 0..dim {
        for col in 0..=row {
            let mut sum = matrix[(row, col)];
            for k in 0..col {
                sum -= lower[(row, k)] * lower[(col, k)];
            }
            if row == col {
                if sum <= 0.0 {
                    return None;
                }
                lower[(row, col)] = sum.sqrt();
            } else {
                let denom = lower[(col, col)];
                if denom <= 0.0 {
                    return None;
                }
                lower[(row, col)] = sum / denom;
            }
        }
    }
    Some(Mat::from_fn(dim, dim, |row, col| lower[(col, row)]))
}

/// `L'L` for an upper-triangular factor.
#[must_use]
pub fn gram_upper(l: &Mat<f64>) -> Mat<f64> {
    let dim = l.ncols();
    Mat::from_fn(dim, dim, |row, col| {
        (0..dim).map(|k| l[(k, row)] * l[(k, col)]).sum()
    })
}

/// Strictly-upper entries of `L` in column-major order.
#[must_use]
pub fn free_entries(l: &Mat<f64>) -> Vec<f64> {
    let dim = l.ncols();
    let mut free = Vec::with_capacity(dim * dim.saturating_sub(1) / 2);
    for col in 1..dim {
        for row in 0..col {
            free.push(l[(row, col)]);
        }
    }
    free
}

/// Rebuild the unit-column upper Cholesky factor from its free entries.
///
/// Returns `None` when a column's strictly-upper entries leave the open unit
/// ball, in which case no valid correlation factor exists.
#[must_use]
pub fn corr_chol_from_free(free: &[f64], dim: usize) -> Option<Mat<f64>> {
    debug_assert_eq!(free.len(), dim * dim.saturating_sub(1) / 2);
    let mut l = Mat::<f64>::zeros(dim, dim);
    if dim > 0 {
        l[(0, 0)] = 1.0;
    }
    let mut offset = 0;
    for col in 1..dim {
        let mut sum_squares = 0.0;
        for row in 0..col {
            let entry = free[offset + row];
            l[(row, col)] = entry;
            sum_squares += entry * entry;
        }
        offset += col;
        if !(sum_squares < 1.0) {
            return None;
        }
        l[(col, col)] = (1.0 - sum_squares).sqrt();
    }
    Some(l)
}

/// `D = diag(sds) * L'L * diag(sds)`.
#[must_use]
pub fn reconstruct_covariance(sds: &[f64], l: &Mat<f64>) -> Mat<f64> {
    let correlation = gram_upper(l);
    let dim = sds.len();
    Mat::from_fn(dim, dim, |row, col| {
        sds[row] * correlation[(row, col)] * sds[col]
    })
}

/// Whether `L` factors a valid correlation matrix: unit diagonal of `L'L`
/// within tolerance and positive definiteness under re-factorization.
#[must_use]
pub fn is_valid_correlation_cholesky(l: &Mat<f64>) -> bool {
    let correlation = gram_upper(l);
    for diag in 0..correlation.ncols() {
        if (correlation[(diag, diag)] - 1.0).abs() > 1.0e-8 {
            return false;
        }
    }
    cholesky_upper(&correlation).is_some()
}

/// Multivariate-normal log-density of the stacked subject random effects
/// under the reconstructed covariance.
///
/// Evaluated through the upper factor `U = L * diag(sds)` of `D`: the
/// determinant comes from `U`'s diagonal and the quadratic form from one
/// triangular solve per subject, so no matrix inverse is formed.
#[must_use]
pub fn log_density_random_effects(b_mat: &Mat<f64>, sds: &[f64], l: &Mat<f64>) -> f64 {
    let n_subjects = b_mat.nrows();
    let dim = sds.len();
    debug_assert_eq!(b_mat.ncols(), dim);

    let mut log_det = 0.0;
    for diag in 0..dim {
        let u_diag = l[(diag, diag)] * sds[diag];
        if !(u_diag > 0.0 && u_diag.is_finite()) {
            return f64::NEG_INFINITY;
        }
        log_det += u_diag.ln();
    }
    log_det *= 2.0;

    let mut quadratic = 0.0;
    let mut solved = vec![0.0; dim];
    for subject in 0..n_subjects {
        for col in 0..dim {
            let mut value = b_mat[(subject, col)];
            for row in 0..col {
                value -= l[(row, col)] * sds[col] * solved[row];
            }
            solved[col] = value / (l[(col, col)] * sds[col]);
        }
        quadratic += solved.iter().map(|value| value * value).sum::<f64>();
    }

    let n = usize_to_f64(n_subjects);
    let k = usize_to_f64(dim);
    -0.5 * (n * k * std::f64::consts::TAU.ln() + n * log_det + quadratic)
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
