//! Survival log-density evaluation over cached linear predictors.
//!
//! The log hazard is the sum of three components (baseline spline, baseline
//! covariates, longitudinal association), each evaluated on three row grids:
//! the risk-set quadrature grid, the event times, and the interval
//! right-endpoint grid. Everything here is a pure function of the caches and
//! the prepared input; all arithmetic stays in log space.

use faer::Mat;

use crate::input::PreparedJointInput;
use crate::utils::mat_vec;

/// One additive log-hazard component across the three evaluation grids.
#[derive(Debug, Clone)]
pub struct HazardTerms {
    /// Quadrature-grid values, one per quadrature row.
    pub quad: Vec<f64>,
    /// Event-time values, one per subject.
    pub event: Vec<f64>,
    /// Interval right-endpoint grid values.
    pub quad2: Vec<f64>,
}

impl HazardTerms {
    /// Evaluate one component from its design matrices and coefficients.
    #[must_use]
    pub(crate) fn compute(
        data: &PreparedJointInput<'_>,
        design: &BlockDesign<'_>,
        coefficients: &[f64],
    ) -> Self {
        let quad = mat_vec(design.quad, coefficients);
        let event = if data.any_event {
            mat_vec(design.event, coefficients)
        } else {
            vec![0.0; data.n_subjects]
        };
        let quad2 = if data.any_interval {
            mat_vec(design.quad2, coefficients)
        } else {
            vec![0.0; quad.len()]
        };
        Self { quad, event, quad2 }
    }

    /// All-zero component for a block that is not modeled.
    #[must_use]
    pub(crate) fn zeros(data: &PreparedJointInput<'_>) -> Self {
        let n_quad = data.input.id_quad.len();
        Self {
            quad: vec![0.0; n_quad],
            event: vec![0.0; data.n_subjects],
            quad2: vec![0.0; n_quad],
        }
    }
}

/// Cached linear predictors for the three hazard components.
///
/// Block updaters swap a candidate component in, evaluate, and either keep it
/// (acceptance) or restore the previous one (rejection).
#[derive(Debug, Clone)]
pub struct LinearPredictors {
    pub baseline: HazardTerms,
    pub covariates: HazardTerms,
    pub association: HazardTerms,
}

impl LinearPredictors {
    #[must_use]
    pub fn initialize(
        data: &PreparedJointInput<'_>,
        bs_gammas: &[f64],
        gammas: &[f64],
        alphas: &[f64],
    ) -> Self {
        let baseline = HazardTerms::compute(data, &BlockDesign::baseline(data), bs_gammas);
        let covariates = if data.input.any_gammas {
            HazardTerms::compute(data, &BlockDesign::covariates(data), gammas)
        } else {
            HazardTerms::zeros(data)
        };
        let association = HazardTerms::compute(data, &BlockDesign::association(data), alphas);
        Self {
            baseline,
            covariates,
            association,
        }
    }
}

/// Design matrices feeding one hazard component across the three grids.
pub(crate) struct BlockDesign<'a> {
    pub quad: &'a Mat<f64>,
    pub event: &'a Mat<f64>,
    pub quad2: &'a Mat<f64>,
}

impl<'a> BlockDesign<'a> {
    pub(crate) fn baseline(data: &'a PreparedJointInput<'_>) -> Self {
        Self {
            quad: &data.input.w0_quad,
            event: &data.input.w0_event,
            quad2: &data.input.w0_quad2,
        }
    }

    pub(crate) fn covariates(data: &'a PreparedJointInput<'_>) -> Self {
        Self {
            quad: &data.input.w_quad,
            event: &data.input.w_event,
            quad2: &data.input.w_quad2,
        }
    }

    pub(crate) fn association(data: &'a PreparedJointInput<'_>) -> Self {
        Self {
            quad: &data.wlong_quad,
            event: &data.wlong_event,
            quad2: &data.wlong_quad2,
        }
    }
}

/// Total time-to-event log-likelihood at the cached predictors.
///
/// Per subject: minus the cumulative hazard for exactly observed and
/// right-censored records, plus the event-time log hazard for events,
/// `log(1 - exp(-H))` for left-censored records, and the
/// difference-of-survival term for interval-censored records. A non-finite
/// total is returned as-is and rejects at the Metropolis step.
#[must_use]
pub fn log_density_surv(data: &PreparedJointInput<'_>, predictors: &LinearPredictors) -> f64 {
    let (cum_hazard, cum_hazard2) = cumulative_hazards(data, predictors);

    let mut contributions = vec![0.0; data.n_subjects];
    for &subject in &data.which_right_event {
        contributions[subject] = -cum_hazard[subject];
    }
    for &subject in &data.which_event {
        contributions[subject] += predictors.baseline.event[subject]
            + predictors.covariates.event[subject]
            + predictors.association.event[subject];
    }
    for &subject in &data.which_left {
        contributions[subject] = log1m_exp_neg(cum_hazard[subject]);
    }
    if let Some(cum_hazard2) = &cum_hazard2 {
        for &subject in &data.which_interval {
            contributions[subject] = -cum_hazard[subject] + log1m_exp_neg(cum_hazard2[subject]);
        }
    }
    contributions.iter().sum()
}

/// Per-subject cumulative hazards on the risk-set grid and, when interval
/// censoring is present, on the right-endpoint grid.
fn cumulative_hazards(
    data: &PreparedJointInput<'_>,
    predictors: &LinearPredictors,
) -> (Vec<f64>, Option<Vec<f64>>) {
    let n_quad = data.input.id_quad.len();
    let weighted: Vec<f64> = (0..n_quad)
        .map(|row| {
            (data.input.log_pwk[row]
                + predictors.baseline.quad[row]
                + predictors.covariates.quad[row]
                + predictors.association.quad[row])
                .exp()
        })
        .collect();
    let cum_hazard = data.groups.sum_by_group(&weighted);

    let cum_hazard2 = data.any_interval.then(|| {
        let weighted2: Vec<f64> = (0..n_quad)
            .map(|row| {
                (data.input.log_pwk2[row]
                    + predictors.baseline.quad2[row]
                    + predictors.covariates.quad2[row]
                    + predictors.association.quad2[row])
                    .exp()
            })
            .collect();
        data.groups.sum_by_group(&weighted2)
    });

    (cum_hazard, cum_hazard2)
}

/// Partial derivative of [`log_density_surv`] with respect to one coefficient
/// of the block owning `design`, at the cached predictors.
pub(crate) fn log_density_surv_grad(
    data: &PreparedJointInput<'_>,
    predictors: &LinearPredictors,
    design: &BlockDesign<'_>,
    coord: usize,
) -> f64 {
    let n = data.n_subjects;
    let mut cum_hazard = vec![0.0; n];
    let mut d_cum_hazard = vec![0.0; n];
    for group in 0..n {
        for row in data.groups.rows(group) {
            let weight = (data.input.log_pwk[row]
                + predictors.baseline.quad[row]
                + predictors.covariates.quad[row]
                + predictors.association.quad[row])
                .exp();
            cum_hazard[group] += weight;
            d_cum_hazard[group] += weight * design.quad[(row, coord)];
        }
    }

    let mut grad = 0.0;
    for &subject in &data.which_right_event {
        grad -= d_cum_hazard[subject];
    }
    for &subject in &data.which_event {
        grad += design.event[(subject, coord)];
    }
    for &subject in &data.which_left {
        let survival = (-cum_hazard[subject]).exp();
        grad += d_cum_hazard[subject] * survival / (1.0 - survival).max(f64::MIN_POSITIVE);
    }

    if data.any_interval {
        let mut cum_hazard2 = vec![0.0; n];
        let mut d_cum_hazard2 = vec![0.0; n];
        for group in 0..n {
            for row in data.groups.rows(group) {
                let weight = (data.input.log_pwk2[row]
                    + predictors.baseline.quad2[row]
                    + predictors.covariates.quad2[row]
                    + predictors.association.quad2[row])
                    .exp();
                cum_hazard2[group] += weight;
                d_cum_hazard2[group] += weight * design.quad2[(row, coord)];
            }
        }
        for &subject in &data.which_interval {
            grad -= d_cum_hazard[subject];
            let survival2 = (-cum_hazard2[subject]).exp();
            grad +=
                d_cum_hazard2[subject] * survival2 / (1.0 - survival2).max(f64::MIN_POSITIVE);
        }
    }

    grad
}

/// `ln(1 - exp(-h))` for a non-negative cumulative hazard.
fn log1m_exp_neg(h: f64) -> f64 {
    (-(-h).exp()).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::JointModelInput;
    use approx::assert_relative_eq;

    fn two_subject_input(
        which_event: Vec<usize>,
        which_right: Vec<usize>,
        which_left: Vec<usize>,
        which_interval: Vec<usize>,
    ) -> JointModelInput {
        let any_interval = !which_interval.is_empty();
        JointModelInput {
            which_event,
            which_right,
            which_left,
            which_interval,
            w0_quad: Mat::from_fn(4, 1, |_row, _col| 0.2),
            w0_event: Mat::from_fn(2, 1, |_row, _col| 0.3),
            w0_quad2: Mat::from_fn(4, 1, |_row, _col| 0.1),
            w_quad: Mat::<f64>::zeros(4, 0),
            w_event: Mat::<f64>::zeros(2, 0),
            w_quad2: Mat::<f64>::zeros(4, 0),
            w_bar: Mat::<f64>::zeros(1, 0),
            wlong_quad: vec![Mat::from_fn(4, 1, |_row, _col| 0.1)],
            wlong_event: vec![Mat::from_fn(2, 1, |_row, _col| 0.25)],
            wlong_quad2: vec![Mat::from_fn(4, 1, |_row, _col| 0.05)],
            id_quad: vec![1, 1, 2, 2],
            log_pwk: vec![0.5f64.ln(); 4],
            log_pwk2: if any_interval {
                vec![0.5f64.ln(); 4]
            } else {
                vec![]
            },
            any_gammas: false,
            fun_forms: vec![vec![1]],
        }
    }

    fn predictors_for(
        data: &crate::input::PreparedJointInput<'_>,
        bs_gammas: &[f64],
        alphas: &[f64],
    ) -> LinearPredictors {
        LinearPredictors::initialize(data, bs_gammas, &[], alphas)
    }

    #[test]
    fn event_and_right_censoring_match_hand_computation() {
        // lambda_quad = 0.2 + 0.2, both subjects: H = 2 * 0.5 * exp(0.4).
        let input = two_subject_input(vec![1], vec![2], vec![], vec![]);
        let data = input.prepare().expect("input should be valid");
        let predictors = predictors_for(&data, &[1.0], &[2.0]);
        let expected = 0.8 - 2.0 * 0.4f64.exp();
        assert_relative_eq!(
            log_density_surv(&data, &predictors),
            expected,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn left_censoring_uses_log_survival_complement() {
        let input = two_subject_input(vec![1], vec![], vec![2], vec![]);
        let data = input.prepare().expect("input should be valid");
        let predictors = predictors_for(&data, &[1.0], &[2.0]);
        let hazard = 0.4f64.exp();
        let expected = (-hazard + 0.8) + (1.0 - (-hazard).exp()).ln();
        assert_relative_eq!(
            log_density_surv(&data, &predictors),
            expected,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn interval_censoring_uses_difference_of_survivals() {
        let input = two_subject_input(vec![1], vec![], vec![], vec![2]);
        let data = input.prepare().expect("input should be valid");
        let predictors = predictors_for(&data, &[1.0], &[2.0]);
        let hazard = 0.4f64.exp();
        // lambda_quad2 = 0.1 + 0.1, so H2 = exp(0.2).
        let hazard2 = 0.2f64.exp();
        let expected = (-hazard + 0.8) + (-hazard + (1.0 - (-hazard2).exp()).ln());
        assert_relative_eq!(
            log_density_surv(&data, &predictors),
            expected,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn zero_hazard_left_censoring_is_rejectably_non_finite() {
        let mut input = two_subject_input(vec![], vec![], vec![1, 2], vec![]);
        input.log_pwk = vec![-1_000.0; 4];
        let data = input.prepare().expect("input should be valid");
        let predictors = predictors_for(&data, &[0.0], &[0.0]);
        assert_eq!(log_density_surv(&data, &predictors), f64::NEG_INFINITY);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let input = two_subject_input(vec![1], vec![], vec![2], vec![]);
        let data = input.prepare().expect("input should be valid");
        let bs_gammas = [0.7];
        let alphas = [-0.4];
        let eps = 1.0e-6;

        let at = |bs: &[f64], al: &[f64]| {
            let predictors = predictors_for(&data, bs, al);
            log_density_surv(&data, &predictors)
        };
        let predictors = predictors_for(&data, &bs_gammas, &alphas);

        let numeric_bs = (at(&[bs_gammas[0] + eps], &alphas) - at(&bs_gammas, &alphas)) / eps;
        let analytic_bs =
            log_density_surv_grad(&data, &predictors, &BlockDesign::baseline(&data), 0);
        assert_relative_eq!(numeric_bs, analytic_bs, epsilon = 1.0e-4);

        let numeric_alpha = (at(&bs_gammas, &[alphas[0] + eps]) - at(&bs_gammas, &alphas)) / eps;
        let analytic_alpha =
            log_density_surv_grad(&data, &predictors, &BlockDesign::association(&data), 0);
        assert_relative_eq!(numeric_alpha, analytic_alpha, epsilon = 1.0e-4);
    }

    #[test]
    fn interval_gradient_matches_finite_difference() {
        let input = two_subject_input(vec![1], vec![], vec![], vec![2]);
        let data = input.prepare().expect("input should be valid");
        let bs_gammas = [0.5];
        let alphas = [0.3];
        let eps = 1.0e-6;

        let at = |bs: &[f64]| {
            let predictors = predictors_for(&data, bs, &alphas);
            log_density_surv(&data, &predictors)
        };
        let predictors = predictors_for(&data, &bs_gammas, &alphas);
        let numeric = (at(&[bs_gammas[0] + eps]) - at(&bs_gammas)) / eps;
        let analytic =
            log_density_surv_grad(&data, &predictors, &BlockDesign::baseline(&data), 0);
        assert_relative_eq!(numeric, analytic, epsilon = 1.0e-4);
    }
}
