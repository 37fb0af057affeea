//! Prior specifications and log-density helpers for the joint model.

use faer::Mat;
use statrs::function::gamma::ln_gamma;

use crate::utils::matrix_is_finite;

use super::types::JmError;

/// Multivariate-normal prior on one coefficient block: mean and precision.
#[derive(Debug, Clone)]
pub struct BlockPrior {
    pub mean: Vec<f64>,
    pub precision: Mat<f64>,
}

impl BlockPrior {
    /// Zero-mean prior with unit precision, a common default.
    #[must_use]
    pub fn standard(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            precision: Mat::from_fn(dim, dim, |row, col| if row == col { 1.0 } else { 0.0 }),
        }
    }

    pub(crate) fn validate(&self, block: &'static str, dim: usize) -> Result<(), JmError> {
        if self.mean.len() != dim || self.precision.nrows() != dim || self.precision.ncols() != dim
        {
            return Err(JmError::PriorShapeMismatch {
                block,
                expected: dim,
                mean_len: self.mean.len(),
                rows: self.precision.nrows(),
                cols: self.precision.ncols(),
            });
        }
        if self.mean.iter().any(|value| !value.is_finite()) || !matrix_is_finite(&self.precision) {
            return Err(JmError::DegeneratePrecision { block });
        }
        let all_zero = (0..dim)
            .all(|row| (0..dim).all(|col| self.precision[(row, col)] == 0.0));
        if dim > 0 && all_zero {
            return Err(JmError::DegeneratePrecision { block });
        }
        Ok(())
    }
}

/// Full prior set for one joint model fit.
#[derive(Debug, Clone)]
pub struct JmPriors {
    pub bs_gammas: BlockPrior,
    pub gammas: BlockPrior,
    pub alphas: BlockPrior,
    /// Gamma shape hyperparameter for the spline-coefficient precision.
    pub a_tau_bs_gammas: f64,
    /// Gamma rate hyperparameter for the spline-coefficient precision.
    pub b_tau_bs_gammas: f64,
    /// Rank of the spline prior precision; the Gibbs shape is `A + rank / 2`.
    pub rank_tau_bs_gammas: f64,
    /// Half-t degrees of freedom for each random-effect scale.
    pub sds_df: f64,
    /// Half-t scale for each random-effect scale.
    pub sds_sigma: f64,
    /// LKJ shape for the random-effects correlation matrix.
    pub lkj_eta: f64,
}

impl JmPriors {
    pub(crate) fn validate(
        &self,
        n_bs_gammas: usize,
        n_gammas: usize,
        n_alphas: usize,
    ) -> Result<(), JmError> {
        self.bs_gammas.validate("bs_gammas", n_bs_gammas)?;
        self.gammas.validate("gammas", n_gammas)?;
        self.alphas.validate("alphas", n_alphas)?;
        if !(self.a_tau_bs_gammas > 0.0
            && self.b_tau_bs_gammas > 0.0
            && self.rank_tau_bs_gammas >= 0.0
            && self.rank_tau_bs_gammas.is_finite())
        {
            return Err(JmError::InvalidTauPrior);
        }
        if !(self.sds_df > 0.0 && self.sds_sigma > 0.0) {
            return Err(JmError::InvalidScalePrior);
        }
        if !(self.lkj_eta > 0.0) {
            return Err(JmError::InvalidLkjShape);
        }
        Ok(())
    }
}

/// Multivariate-normal log-prior up to the quadratic-form term, scaled by a
/// precision multiplier (`tau = 1` for unscaled blocks).
#[must_use]
pub fn log_mvn_prior(theta: &[f64], mean: &[f64], precision: &Mat<f64>, tau: f64) -> f64 {
    -0.5 * tau * quadratic_form(theta, mean, precision)
}

/// `(theta - mean)' precision (theta - mean)`.
#[must_use]
pub fn quadratic_form(theta: &[f64], mean: &[f64], precision: &Mat<f64>) -> f64 {
    let dim = theta.len();
    let mut quadratic = 0.0;
    for row in 0..dim {
        let centered_row = theta[row] - mean[row];
        for col in 0..dim {
            quadratic += centered_row * precision[(row, col)] * (theta[col] - mean[col]);
        }
    }
    quadratic
}

/// Partial derivative of [`log_mvn_prior`] with respect to one coordinate.
///
/// Assumes a symmetric precision matrix.
pub(crate) fn log_mvn_prior_grad(
    theta: &[f64],
    mean: &[f64],
    precision: &Mat<f64>,
    tau: f64,
    coord: usize,
) -> f64 {
    let contribution: f64 = (0..theta.len())
        .map(|col| precision[(coord, col)] * (theta[col] - mean[col]))
        .sum();
    -tau * contribution
}

/// Log-density of a half-t prior on a positive scale parameter.
#[must_use]
pub fn log_half_t(value: f64, df: f64, sigma: f64) -> f64 {
    if !(value > 0.0 && value.is_finite()) {
        return f64::NEG_INFINITY;
    }
    let z = value / sigma;
    std::f64::consts::LN_2 + ln_gamma(0.5 * (df + 1.0))
        - ln_gamma(0.5 * df)
        - 0.5 * (df * std::f64::consts::PI).ln()
        - sigma.ln()
        - 0.5 * (df + 1.0) * (z * z / df).ln_1p()
}

/// LKJ log-density over the upper Cholesky factor of a correlation matrix,
/// up to the normalizing constant.
#[must_use]
pub fn log_lkj_cholesky(l: &Mat<f64>, eta: f64) -> f64 {
    let dim = l.ncols();
    let mut out = 0.0;
    for col in 1..dim {
        let exponent = usize_to_f64(dim) - usize_to_f64(col) - 3.0 + 2.0 * eta;
        out += exponent * l[(col, col)].max(f64::MIN_POSITIVE).ln();
    }
    out
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_form_matches_hand_computation() {
        let precision = Mat::from_fn(2, 2, |row, col| if row == col { 2.0 } else { 0.5 });
        let value = quadratic_form(&[1.0, -1.0], &[0.0, 0.0], &precision);
        // 2*1 + 2*1 + 2*0.5*(1)(-1) = 3
        assert_relative_eq!(value, 3.0);
        assert_relative_eq!(
            log_mvn_prior(&[1.0, -1.0], &[0.0, 0.0], &precision, 2.0),
            -3.0
        );
    }

    #[test]
    fn mvn_prior_gradient_matches_finite_difference() {
        let precision = Mat::from_fn(3, 3, |row, col| if row == col { 1.5 } else { 0.2 });
        let mean = [0.3, -0.1, 0.0];
        let theta = [0.5, 0.25, -0.75];
        let eps = 1.0e-6;
        for coord in 0..3 {
            let mut shifted = theta;
            shifted[coord] += eps;
            let numeric = (log_mvn_prior(&shifted, &mean, &precision, 0.7)
                - log_mvn_prior(&theta, &mean, &precision, 0.7))
                / eps;
            let analytic = log_mvn_prior_grad(&theta, &mean, &precision, 0.7, coord);
            assert_relative_eq!(numeric, analytic, epsilon = 1.0e-4);
        }
    }

    #[test]
    fn half_t_rejects_non_positive_values() {
        assert!(!log_half_t(0.0, 3.0, 10.0).is_finite());
        assert!(!log_half_t(-1.0, 3.0, 10.0).is_finite());
    }

    #[test]
    fn half_t_decreases_in_the_tail() {
        let near = log_half_t(1.0, 3.0, 5.0);
        let far = log_half_t(50.0, 3.0, 5.0);
        assert!(near > far);
    }

    #[test]
    fn lkj_is_flat_for_unit_shape_in_two_dimensions() {
        // q = 2, eta = 1: exponent is 2*eta - 2 = 0 for the single free column.
        let l = Mat::from_fn(2, 2, |row, col| match (row, col) {
            (0, 0) => 1.0,
            (0, 1) => 0.6,
            (1, 1) => 0.8,
            _ => 0.0,
        });
        assert_relative_eq!(log_lkj_cholesky(&l, 1.0), 0.0);
        assert!(log_lkj_cholesky(&l, 2.0) < 0.0);
    }

    #[test]
    fn block_prior_rejects_zero_precision() {
        let prior = BlockPrior {
            mean: vec![0.0, 0.0],
            precision: Mat::<f64>::zeros(2, 2),
        };
        assert!(matches!(
            prior.validate("bs_gammas", 2),
            Err(JmError::DegeneratePrecision { block: "bs_gammas" })
        ));
    }

    #[test]
    fn block_prior_accepts_empty_block() {
        let prior = BlockPrior::standard(0);
        assert!(prior.validate("gammas", 0).is_ok());
    }

    #[test]
    fn priors_validate_scalar_hyperparameters() {
        let priors = JmPriors {
            bs_gammas: BlockPrior::standard(2),
            gammas: BlockPrior::standard(0),
            alphas: BlockPrior::standard(1),
            a_tau_bs_gammas: 1.0,
            b_tau_bs_gammas: 0.0,
            rank_tau_bs_gammas: 2.0,
            sds_df: 3.0,
            sds_sigma: 10.0,
            lkj_eta: 2.0,
        };
        assert!(matches!(
            priors.validate(2, 0, 1),
            Err(JmError::InvalidTauPrior)
        ));
    }
}
