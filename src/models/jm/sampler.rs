//! Adaptive Metropolis-Hastings sampler for the joint posterior.
//!
//! One iteration refreshes the joint log-posterior, then sweeps the blocks in
//! fixed order: baseline-hazard spline coefficients, the Gibbs redraw of
//! their precision, baseline covariate effects when present, association
//! coefficients, and the random-effects scales and correlation factor. Every
//! block conditions on the state left behind by the blocks before it, so the
//! sweep order is part of the sampler's definition and must not change.

use faer::Mat;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::inference::ProposalStats;
use crate::input::{JointModelInput, PreparedJointInput};
use crate::models::matrix_ops::{cbind_columns, trim_rows};
use crate::utils::matrix_is_finite;

use super::adaptive::ScaleAdapter;
use super::covariance::{
    cholesky_upper, corr_chol_from_free, cov2cor, free_entries, is_valid_correlation_cholesky,
    log_density_random_effects,
};
use super::posterior::{JmAcceptance, JmDraws, JmSamples, summarize_draws};
use super::priors::{
    JmPriors, log_half_t, log_lkj_cholesky, log_mvn_prior, log_mvn_prior_grad, quadratic_form,
};
use super::survival::{
    BlockDesign, HazardTerms, LinearPredictors, log_density_surv, log_density_surv_grad,
};
use super::types::{
    JmAcceptanceRates, JmControl, JmDiagnostics, JmError, JmModel, JmReport,
};

/// Starting values for every sampled block.
#[derive(Debug, Clone)]
pub struct JmInitialValues {
    pub bs_gammas: Vec<f64>,
    pub gammas: Vec<f64>,
    pub alphas: Vec<f64>,
    pub tau_bs_gammas: f64,
    /// Per-outcome subject random effects, column-concatenated internally.
    pub b: Vec<Mat<f64>>,
    /// Random-effects covariance, decomposed into scales and a correlation
    /// Cholesky factor at setup.
    pub d: Mat<f64>,
}

/// Mutable chain state threaded through the block updaters.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub bs_gammas: Vec<f64>,
    pub gammas: Vec<f64>,
    pub alphas: Vec<f64>,
    pub tau_bs_gammas: f64,
    pub sds: Vec<f64>,
    /// Upper-triangular correlation Cholesky factor with unit-norm columns.
    pub corr_chol: Mat<f64>,
    /// Strictly-upper free entries of `corr_chol`, column-major.
    pub corr_free: Vec<f64>,
    pub predictors: LinearPredictors,
}

/// Running joint log-posterior, maintained component-wise so block updates
/// and the Gibbs step can patch exactly the terms they change.
#[derive(Debug, Clone, Copy)]
struct LogPosterior {
    survival: f64,
    prior_bs_gammas: f64,
    prior_gammas: f64,
    prior_alphas: f64,
}

impl LogPosterior {
    fn evaluate(data: &PreparedJointInput<'_>, priors: &JmPriors, state: &ChainState) -> Self {
        Self {
            survival: log_density_surv(data, &state.predictors),
            prior_bs_gammas: log_mvn_prior(
                &state.bs_gammas,
                &priors.bs_gammas.mean,
                &priors.bs_gammas.precision,
                state.tau_bs_gammas,
            ),
            prior_gammas: log_mvn_prior(
                &state.gammas,
                &priors.gammas.mean,
                &priors.gammas.precision,
                1.0,
            ),
            prior_alphas: log_mvn_prior(
                &state.alphas,
                &priors.alphas.mean,
                &priors.alphas.precision,
                1.0,
            ),
        }
    }

    const fn total(self) -> f64 {
        self.survival + self.prior_bs_gammas + self.prior_gammas + self.prior_alphas
    }
}

/// The three regression blocks sharing the Metropolis-within-Gibbs machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Baseline,
    Covariates,
    Association,
}

struct SamplerContext<'a> {
    data: &'a PreparedJointInput<'a>,
    priors: &'a JmPriors,
    control: JmControl,
    b_mat: Mat<f64>,
}

struct Traces {
    bs_gammas: Mat<f64>,
    acc_bs_gammas: Mat<f64>,
    tau_bs_gammas: Mat<f64>,
    gammas: Mat<f64>,
    acc_gammas: Mat<f64>,
    w_bar_gammas: Mat<f64>,
    alphas: Mat<f64>,
    acc_alphas: Mat<f64>,
    sds: Mat<f64>,
    acc_sds: Mat<f64>,
    corr_chol: Mat<f64>,
    acc_corr_chol: Mat<f64>,
}

impl Traces {
    fn allocate(n_iter: usize, n_bs: usize, n_gammas: usize, n_alphas: usize, n_sds: usize) -> Self {
        let n_corr = n_sds * n_sds.saturating_sub(1) / 2;
        Self {
            bs_gammas: Mat::<f64>::zeros(n_iter, n_bs),
            acc_bs_gammas: Mat::<f64>::zeros(n_iter, n_bs),
            tau_bs_gammas: Mat::<f64>::zeros(n_iter, 1),
            gammas: Mat::<f64>::zeros(n_iter, n_gammas),
            acc_gammas: Mat::<f64>::zeros(n_iter, n_gammas),
            w_bar_gammas: Mat::<f64>::zeros(n_iter, 1),
            alphas: Mat::<f64>::zeros(n_iter, n_alphas),
            acc_alphas: Mat::<f64>::zeros(n_iter, n_alphas),
            sds: Mat::<f64>::zeros(n_iter, n_sds),
            acc_sds: Mat::<f64>::zeros(n_iter, n_sds),
            corr_chol: Mat::<f64>::zeros(n_iter, n_corr),
            acc_corr_chol: Mat::<f64>::zeros(n_iter, n_corr),
        }
    }
}

#[derive(Default)]
struct Stats {
    bs_gammas: ProposalStats,
    gammas: ProposalStats,
    alphas: ProposalStats,
    sds: ProposalStats,
    corr_chol: ProposalStats,
}

struct BlockScales {
    bs_gammas: ScaleAdapter,
    gammas: ScaleAdapter,
    alphas: ScaleAdapter,
    sds: ScaleAdapter,
    corr_chol: ScaleAdapter,
}

/// Run the MCMC chain and return model metadata, a fit report, and the
/// retained draws with their acceptance indicators.
///
/// # Errors
///
/// Returns `JmError` when the input bundle, control schedule, priors, or
/// initial values are inconsistent, or when the initial state has a
/// non-finite log-posterior. Configuration problems abort before the first
/// iteration; per-iteration numeric problems only reject proposals.
pub fn fit_joint_model(
    input: &JointModelInput,
    initial: &JmInitialValues,
    priors: &JmPriors,
    control: JmControl,
) -> Result<(JmModel, JmReport, JmSamples), JmError> {
    control.validate()?;
    let data = input.prepare()?;

    let n_bs = data.input.w0_quad.ncols();
    let n_gammas = if input.any_gammas {
        data.input.w_quad.ncols()
    } else {
        0
    };
    let n_alphas = data.wlong_quad.ncols();
    check_length("bs_gammas", initial.bs_gammas.len(), n_bs)?;
    check_length("gammas", initial.gammas.len(), n_gammas)?;
    check_length("alphas", initial.alphas.len(), n_alphas)?;
    if !(initial.tau_bs_gammas > 0.0 && initial.tau_bs_gammas.is_finite()) {
        return Err(JmError::InvalidInitialTau);
    }
    priors.validate(n_bs, n_gammas, n_alphas)?;

    let n_sds = initial.d.ncols();
    if initial.d.nrows() != n_sds || !matrix_is_finite(&initial.d) {
        return Err(JmError::CovarianceNotPositiveDefinite);
    }
    for block in &initial.b {
        if block.nrows() != data.n_subjects {
            return Err(JmError::RandomEffectsShapeMismatch {
                subjects: data.n_subjects,
                dim: n_sds,
                rows: block.nrows(),
                cols: block.ncols(),
            });
        }
    }
    let b_mat = if initial.b.is_empty() {
        Mat::<f64>::zeros(data.n_subjects, 0)
    } else {
        cbind_columns(&initial.b)
    };
    if b_mat.nrows() != data.n_subjects || b_mat.ncols() != n_sds {
        return Err(JmError::RandomEffectsShapeMismatch {
            subjects: data.n_subjects,
            dim: n_sds,
            rows: b_mat.nrows(),
            cols: b_mat.ncols(),
        });
    }

    let mut sds = Vec::with_capacity(n_sds);
    for diag in 0..n_sds {
        let variance = initial.d[(diag, diag)];
        if !(variance > 0.0) {
            return Err(JmError::CovarianceNotPositiveDefinite);
        }
        sds.push(variance.sqrt());
    }
    let correlation = cov2cor(&initial.d);
    let corr_chol =
        cholesky_upper(&correlation).ok_or(JmError::CovarianceNotPositiveDefinite)?;
    let corr_free = free_entries(&corr_chol);

    let predictors =
        LinearPredictors::initialize(&data, &initial.bs_gammas, &initial.gammas, &initial.alphas);
    let mut state = ChainState {
        bs_gammas: initial.bs_gammas.clone(),
        gammas: initial.gammas.clone(),
        alphas: initial.alphas.clone(),
        tau_bs_gammas: initial.tau_bs_gammas,
        sds,
        corr_chol,
        corr_free,
        predictors,
    };

    let ctx = SamplerContext {
        data: &data,
        priors,
        control,
        b_mat,
    };
    let initial_log_post = LogPosterior::evaluate(ctx.data, ctx.priors, &state);
    let initial_re_density =
        log_density_random_effects(&ctx.b_mat, &state.sds, &state.corr_chol);
    if !(initial_log_post.total().is_finite() && initial_re_density.is_finite()) {
        return Err(JmError::NonFiniteInitialState);
    }

    let mut rng = StdRng::seed_from_u64(control.seed);
    let mut traces = Traces::allocate(control.n_iter, n_bs, n_gammas, n_alphas, n_sds);
    let mut scales = BlockScales {
        bs_gammas: ScaleAdapter::new(n_bs),
        gammas: ScaleAdapter::new(n_gammas),
        alphas: ScaleAdapter::new(n_alphas),
        sds: ScaleAdapter::new(n_sds),
        corr_chol: ScaleAdapter::new(n_sds * n_sds.saturating_sub(1) / 2),
    };
    let mut stats = Stats::default();

    for it in 0..control.n_iter {
        let mut log_post = LogPosterior::evaluate(ctx.data, ctx.priors, &state);

        update_regression_block(
            &ctx,
            &mut rng,
            &mut state,
            &mut log_post,
            Component::Baseline,
            &mut scales.bs_gammas,
            &mut stats.bs_gammas,
            &mut traces.bs_gammas,
            &mut traces.acc_bs_gammas,
            it,
        );
        gibbs_tau_bs_gammas(&ctx, &mut rng, &mut state, &mut log_post, &mut traces, it);
        if input.any_gammas {
            update_regression_block(
                &ctx,
                &mut rng,
                &mut state,
                &mut log_post,
                Component::Covariates,
                &mut scales.gammas,
                &mut stats.gammas,
                &mut traces.gammas,
                &mut traces.acc_gammas,
                it,
            );
            traces.w_bar_gammas[(it, 0)] = averaged_covariate_effect(ctx.data, &state.gammas);
        }
        update_regression_block(
            &ctx,
            &mut rng,
            &mut state,
            &mut log_post,
            Component::Association,
            &mut scales.alphas,
            &mut stats.alphas,
            &mut traces.alphas,
            &mut traces.acc_alphas,
            it,
        );
        update_sds(&ctx, &mut rng, &mut state, &mut scales.sds, &mut stats.sds, &mut traces, it);
        update_corr_chol(
            &ctx,
            &mut rng,
            &mut state,
            &mut scales.corr_chol,
            &mut stats.corr_chol,
            &mut traces,
            it,
        );

        #[cfg(debug_assertions)]
        if it.is_multiple_of(25) {
            let fresh = LinearPredictors::initialize(
                ctx.data,
                &state.bs_gammas,
                &state.gammas,
                &state.alphas,
            );
            let recomputed = log_density_surv(ctx.data, &fresh);
            let cached = log_density_surv(ctx.data, &state.predictors);
            debug_assert!(
                (recomputed - cached).abs() < 1.0e-8
                    || (!recomputed.is_finite() && !cached.is_finite())
            );
        }
    }

    let draws = JmDraws {
        bs_gammas: trim_rows(&traces.bs_gammas, control.n_burnin),
        tau_bs_gammas: trim_rows(&traces.tau_bs_gammas, control.n_burnin),
        gammas: input
            .any_gammas
            .then(|| trim_rows(&traces.gammas, control.n_burnin)),
        w_bar_gammas: input
            .any_gammas
            .then(|| trim_rows(&traces.w_bar_gammas, control.n_burnin)),
        alphas: trim_rows(&traces.alphas, control.n_burnin),
        sds: trim_rows(&traces.sds, control.n_burnin),
        corr_chol: trim_rows(&traces.corr_chol, control.n_burnin),
    };
    let acceptance = JmAcceptance {
        bs_gammas: trim_rows(&traces.acc_bs_gammas, control.n_burnin),
        gammas: input
            .any_gammas
            .then(|| trim_rows(&traces.acc_gammas, control.n_burnin)),
        alphas: trim_rows(&traces.acc_alphas, control.n_burnin),
        sds: trim_rows(&traces.acc_sds, control.n_burnin),
        corr_chol: trim_rows(&traces.acc_corr_chol, control.n_burnin),
    };

    let model = JmModel {
        n_bs_gammas: n_bs,
        n_gammas,
        n_alphas,
        n_random_effects: n_sds,
        n_subjects: data.n_subjects,
        fun_forms: data.fun_forms.clone(),
    };
    let report = JmReport {
        diagnostics: JmDiagnostics {
            iterations_completed: control.n_iter,
            retained_draws: control.retained_draws(),
            acceptance_rates: JmAcceptanceRates {
                bs_gammas: stats.bs_gammas.acceptance_rate(),
                gammas: stats.gammas.acceptance_rate(),
                alphas: stats.alphas.acceptance_rate(),
                sds: stats.sds.acceptance_rate(),
                corr_chol: stats.corr_chol.acceptance_rate(),
            },
        },
        posterior_summary: Some(summarize_draws(&draws)),
    };

    Ok((model, report, JmSamples { draws, acceptance }))
}

const fn check_length(
    block: &'static str,
    found: usize,
    expected: usize,
) -> Result<(), JmError> {
    if found == expected {
        Ok(())
    } else {
        Err(JmError::CoefficientLengthMismatch {
            block,
            found,
            expected,
        })
    }
}

/// One-at-a-time Metropolis sweep over a regression block, each dimension's
/// proposal conditioned on the already-updated dimensions before it.
#[allow(clippy::too_many_arguments)]
fn update_regression_block(
    ctx: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    log_post: &mut LogPosterior,
    component: Component,
    scales: &mut ScaleAdapter,
    stats: &mut ProposalStats,
    res: &mut Mat<f64>,
    acc: &mut Mat<f64>,
    it: usize,
) {
    let dim = scales.len();
    if dim == 0 {
        return;
    }
    let design = block_design(ctx.data, component);
    let prior = block_prior(ctx.priors, component);
    let tau = block_tau(state, component);

    for i in 0..dim {
        let current = block_coefs(state, component)[i];
        let scale = scales.scale(i);
        let noise = sample_standard_normal(rng);

        let forward_mean = if ctx.control.mala {
            let grad = log_density_surv_grad(ctx.data, &state.predictors, &design, i)
                + log_mvn_prior_grad(
                    block_coefs(state, component),
                    &prior.mean,
                    &prior.precision,
                    tau,
                    i,
                );
            current + mala_drift(scale, grad)
        } else {
            current
        };
        let proposal = scale.mul_add(noise, forward_mean);

        block_coefs_mut(state, component)[i] = proposal;
        let candidate_terms =
            HazardTerms::compute(ctx.data, &design, block_coefs(state, component));
        let previous_terms =
            std::mem::replace(block_terms_mut(state, component), candidate_terms);

        let candidate_survival = log_density_surv(ctx.data, &state.predictors);
        let candidate_prior = log_mvn_prior(
            block_coefs(state, component),
            &prior.mean,
            &prior.precision,
            tau,
        );
        let current_total = log_post.total();
        let candidate_total = current_total - log_post.survival - prior_component(log_post, component)
            + candidate_survival
            + candidate_prior;
        let mut log_ratio = candidate_total - current_total;

        if ctx.control.mala {
            let backward_grad = log_density_surv_grad(ctx.data, &state.predictors, &design, i)
                + log_mvn_prior_grad(
                    block_coefs(state, component),
                    &prior.mean,
                    &prior.precision,
                    tau,
                    i,
                );
            let backward_mean = proposal + mala_drift(scale, backward_grad);
            let forward_dev = (proposal - forward_mean) / scale;
            let backward_dev = (current - backward_mean) / scale;
            log_ratio += 0.5 * (forward_dev * forward_dev - backward_dev * backward_dev);
        }

        let accepted = should_accept(log_ratio, rng);
        if accepted {
            log_post.survival = candidate_survival;
            set_prior_component(log_post, component, candidate_prior);
        } else {
            *block_terms_mut(state, component) = previous_terms;
            block_coefs_mut(state, component)[i] = current;
        }

        scales.record(i, accepted, it);
        stats.record(accepted);
        acc[(it, i)] = if accepted { 1.0 } else { 0.0 };
        res[(it, i)] = block_coefs(state, component)[i];
    }
}

/// Closed-form Gamma redraw of the spline-coefficient precision, followed by
/// an in-place patch of the cached prior term so later blocks condition on
/// the new value exactly.
fn gibbs_tau_bs_gammas(
    ctx: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    log_post: &mut LogPosterior,
    traces: &mut Traces,
    it: usize,
) {
    let priors = ctx.priors;
    let shape = 0.5f64.mul_add(priors.rank_tau_bs_gammas, priors.a_tau_bs_gammas);
    let quadratic = quadratic_form(
        &state.bs_gammas,
        &priors.bs_gammas.mean,
        &priors.bs_gammas.precision,
    );
    let rate = 0.5f64.mul_add(quadratic, priors.b_tau_bs_gammas);
    state.tau_bs_gammas = sample_gamma(rng, shape, 1.0 / rate);
    log_post.prior_bs_gammas = log_mvn_prior(
        &state.bs_gammas,
        &priors.bs_gammas.mean,
        &priors.bs_gammas.precision,
        state.tau_bs_gammas,
    );
    traces.tau_bs_gammas[(it, 0)] = state.tau_bs_gammas;
}

/// Log-scale random-walk sweep over the random-effect scales under the
/// half-t prior, with the log-normal proposal Jacobian folded into the ratio.
fn update_sds(
    ctx: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    scales: &mut ScaleAdapter,
    stats: &mut ProposalStats,
    traces: &mut Traces,
    it: usize,
) {
    let dim = state.sds.len();
    if dim == 0 {
        return;
    }
    let priors = ctx.priors;
    let mut current_density =
        log_density_random_effects(&ctx.b_mat, &state.sds, &state.corr_chol);

    for i in 0..dim {
        let current = state.sds[i];
        let scale = scales.scale(i);
        let proposal = scale
            .mul_add(sample_standard_normal(rng), current.ln())
            .exp();
        state.sds[i] = proposal;

        let candidate_density =
            log_density_random_effects(&ctx.b_mat, &state.sds, &state.corr_chol);
        let log_ratio = (candidate_density
            + log_half_t(proposal, priors.sds_df, priors.sds_sigma))
            - (current_density + log_half_t(current, priors.sds_df, priors.sds_sigma))
            + (proposal.ln() - current.ln());

        let accepted = should_accept(log_ratio, rng);
        if accepted {
            current_density = candidate_density;
        } else {
            state.sds[i] = current;
        }

        scales.record(i, accepted, it);
        stats.record(accepted);
        traces.acc_sds[(it, i)] = if accepted { 1.0 } else { 0.0 };
        traces.sds[(it, i)] = state.sds[i];
    }
}

/// Random-walk sweep over the free entries of the correlation Cholesky
/// factor under the LKJ prior. A proposal that leaves the unit ball, or whose
/// reconstructed correlation fails re-factorization, rejects outright.
fn update_corr_chol(
    ctx: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    scales: &mut ScaleAdapter,
    stats: &mut ProposalStats,
    traces: &mut Traces,
    it: usize,
) {
    let n_free = state.corr_free.len();
    if n_free == 0 {
        return;
    }
    let dim = state.sds.len();
    let eta = ctx.priors.lkj_eta;
    let mut current_density =
        log_density_random_effects(&ctx.b_mat, &state.sds, &state.corr_chol);
    let mut current_lkj = log_lkj_cholesky(&state.corr_chol, eta);

    for i in 0..n_free {
        let current = state.corr_free[i];
        let proposal = scales.scale(i).mul_add(sample_standard_normal(rng), current);
        state.corr_free[i] = proposal;

        let mut accepted = false;
        if let Some(candidate_l) = corr_chol_from_free(&state.corr_free, dim) {
            if is_valid_correlation_cholesky(&candidate_l) {
                let candidate_density =
                    log_density_random_effects(&ctx.b_mat, &state.sds, &candidate_l);
                let candidate_lkj = log_lkj_cholesky(&candidate_l, eta);
                let log_ratio =
                    (candidate_density + candidate_lkj) - (current_density + current_lkj);
                if should_accept(log_ratio, rng) {
                    state.corr_chol = candidate_l;
                    current_density = candidate_density;
                    current_lkj = candidate_lkj;
                    accepted = true;
                }
            }
        }
        if !accepted {
            state.corr_free[i] = current;
        }

        scales.record(i, accepted, it);
        stats.record(accepted);
        traces.acc_corr_chol[(it, i)] = if accepted { 1.0 } else { 0.0 };
        traces.corr_chol[(it, i)] = state.corr_free[i];
    }
}

/// Covariate effect at the averaging row, traced alongside the draws.
fn averaged_covariate_effect(data: &PreparedJointInput<'_>, gammas: &[f64]) -> f64 {
    (0..gammas.len())
        .map(|col| data.input.w_bar[(0, col)] * gammas[col])
        .sum()
}

fn block_design<'a>(data: &'a PreparedJointInput<'_>, component: Component) -> BlockDesign<'a> {
    match component {
        Component::Baseline => BlockDesign::baseline(data),
        Component::Covariates => BlockDesign::covariates(data),
        Component::Association => BlockDesign::association(data),
    }
}

fn block_prior<'p>(priors: &'p JmPriors, component: Component) -> &'p super::priors::BlockPrior {
    match component {
        Component::Baseline => &priors.bs_gammas,
        Component::Covariates => &priors.gammas,
        Component::Association => &priors.alphas,
    }
}

const fn block_tau(state: &ChainState, component: Component) -> f64 {
    match component {
        Component::Baseline => state.tau_bs_gammas,
        Component::Covariates | Component::Association => 1.0,
    }
}

fn block_coefs<'s>(state: &'s ChainState, component: Component) -> &'s [f64] {
    match component {
        Component::Baseline => &state.bs_gammas,
        Component::Covariates => &state.gammas,
        Component::Association => &state.alphas,
    }
}

fn block_coefs_mut<'s>(state: &'s mut ChainState, component: Component) -> &'s mut Vec<f64> {
    match component {
        Component::Baseline => &mut state.bs_gammas,
        Component::Covariates => &mut state.gammas,
        Component::Association => &mut state.alphas,
    }
}

fn block_terms_mut<'s>(state: &'s mut ChainState, component: Component) -> &'s mut HazardTerms {
    match component {
        Component::Baseline => &mut state.predictors.baseline,
        Component::Covariates => &mut state.predictors.covariates,
        Component::Association => &mut state.predictors.association,
    }
}

const fn prior_component(log_post: &LogPosterior, component: Component) -> f64 {
    match component {
        Component::Baseline => log_post.prior_bs_gammas,
        Component::Covariates => log_post.prior_gammas,
        Component::Association => log_post.prior_alphas,
    }
}

const fn set_prior_component(log_post: &mut LogPosterior, component: Component, value: f64) {
    match component {
        Component::Baseline => log_post.prior_bs_gammas = value,
        Component::Covariates => log_post.prior_gammas = value,
        Component::Association => log_post.prior_alphas = value,
    }
}

/// Langevin drift for one coordinate; a non-finite gradient degrades the
/// proposal to a plain random walk.
fn mala_drift(scale: f64, grad: f64) -> f64 {
    if grad.is_finite() {
        0.5 * scale * scale * grad
    } else {
        0.0
    }
}

/// A non-finite log ratio (NaN comparisons are false) always rejects.
fn should_accept(log_acceptance: f64, rng: &mut StdRng) -> bool {
    log_acceptance >= 0.0 || rng.random::<f64>().ln() < log_acceptance
}

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn sample_gamma(rng: &mut StdRng, shape: f64, scale: f64) -> f64 {
    if !(shape > 0.0 && scale > 0.0) {
        return f64::NAN;
    }

    if shape < 1.0 {
        let u = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
        return sample_gamma(rng, shape + 1.0, scale) * u.powf(1.0 / shape);
    }

    let shape_minus_third = shape - (1.0 / 3.0);
    let coeff = (1.0 / (9.0 * shape_minus_third)).sqrt();
    loop {
        let standard_normal = sample_standard_normal(rng);
        let one_plus_coeff_noise = coeff.mul_add(standard_normal, 1.0);
        if one_plus_coeff_noise <= 0.0 {
            continue;
        }
        let cubic_term = one_plus_coeff_noise * one_plus_coeff_noise * one_plus_coeff_noise;
        let uniform = rng.random::<f64>();
        if uniform
            < (0.0331 * standard_normal * standard_normal * standard_normal)
                .mul_add(-standard_normal, 1.0)
        {
            return scale * shape_minus_third * cubic_term;
        }
        if uniform.ln()
            < (0.5 * standard_normal).mul_add(
                standard_normal,
                shape_minus_third * (1.0 - cubic_term + cubic_term.ln()),
            )
        {
            return scale * shape_minus_third * cubic_term;
        }
    }
}
