//! Core public types for the joint model engine.

use thiserror::Error;

use crate::input::JointInputError;

/// Errors returned by joint model configuration, validation, and fitting.
#[derive(Debug, Error)]
pub enum JmError {
    #[error(transparent)]
    InvalidInput(#[from] JointInputError),
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({n_burnin}) must be smaller than iterations ({n_iter})")]
    InvalidBurnIn { n_burnin: usize, n_iter: usize },
    #[error("{block} initial value length ({found}) must match its design width ({expected})")]
    CoefficientLengthMismatch {
        block: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("{block} prior must cover {expected} dimensions (mean {mean_len}, precision {rows}x{cols})")]
    PriorShapeMismatch {
        block: &'static str,
        expected: usize,
        mean_len: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{block} prior precision is degenerate (zero or non-finite)")]
    DegeneratePrecision { block: &'static str },
    #[error("precision hyperprior requires positive shape and rate")]
    InvalidTauPrior,
    #[error("random-effects scale prior requires positive df and scale")]
    InvalidScalePrior,
    #[error("LKJ shape parameter must be positive")]
    InvalidLkjShape,
    #[error("initial precision hyperparameter must be positive and finite")]
    InvalidInitialTau,
    #[error("random-effects matrix must be {subjects} x {dim}, found {rows} x {cols}")]
    RandomEffectsShapeMismatch {
        subjects: usize,
        dim: usize,
        rows: usize,
        cols: usize,
    },
    #[error("initial random-effects covariance is not positive definite")]
    CovarianceNotPositiveDefinite,
    #[error("initial state has a non-finite log-posterior")]
    NonFiniteInitialState,
}

/// Chain schedule and proposal-flavor controls.
#[derive(Debug, Clone, Copy)]
pub struct JmControl {
    /// Total MCMC iterations.
    pub n_iter: usize,
    /// Leading iterations discarded from the returned draws.
    pub n_burnin: usize,
    /// Gradient-informed proposals for the regression blocks.
    pub mala: bool,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl Default for JmControl {
    fn default() -> Self {
        Self {
            n_iter: 3_500,
            n_burnin: 500,
            mala: false,
            seed: 42,
        }
    }
}

impl JmControl {
    /// # Errors
    ///
    /// Returns `JmError` if the schedule is internally inconsistent.
    pub const fn validate(self) -> Result<(), JmError> {
        if self.n_iter == 0 {
            return Err(JmError::InvalidIterations);
        }
        if self.n_burnin >= self.n_iter {
            return Err(JmError::InvalidBurnIn {
                n_burnin: self.n_burnin,
                n_iter: self.n_iter,
            });
        }
        Ok(())
    }

    /// Number of retained draws implied by `(n_iter, n_burnin)`.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        self.n_iter - self.n_burnin
    }
}

/// Fitted joint model metadata.
#[derive(Debug, Clone)]
pub struct JmModel {
    pub n_bs_gammas: usize,
    pub n_gammas: usize,
    pub n_alphas: usize,
    /// Random-effects dimensionality per subject.
    pub n_random_effects: usize,
    pub n_subjects: usize,
    /// Per-outcome column indices into the combined long design (0-based).
    pub fun_forms: Vec<Vec<usize>>,
}

/// Block-wise acceptance rates over the whole chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct JmAcceptanceRates {
    pub bs_gammas: f64,
    pub gammas: f64,
    pub alphas: f64,
    pub sds: f64,
    pub corr_chol: f64,
}

/// Sampler diagnostics summary.
#[derive(Debug, Clone, Default)]
pub struct JmDiagnostics {
    pub iterations_completed: usize,
    pub retained_draws: usize,
    pub acceptance_rates: JmAcceptanceRates,
}

/// Output report from a joint model fit.
#[derive(Debug, Clone, Default)]
pub struct JmReport {
    pub diagnostics: JmDiagnostics,
    pub posterior_summary: Option<super::posterior::JmPosteriorSummary>,
}
