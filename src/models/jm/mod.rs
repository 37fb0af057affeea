//! Bayesian joint model for a time-to-event outcome linked to longitudinal
//! trajectories.
//!
//! The sampler runs adaptive Metropolis-Hastings updates over correlated
//! coefficient blocks (baseline-hazard splines, baseline covariates,
//! association parameters), a Gibbs redraw of the spline precision, and a
//! Metropolis update of the random-effects covariance carried as scales plus
//! a correlation Cholesky factor.

pub mod adaptive;
pub mod covariance;
pub mod posterior;
pub mod priors;
pub mod sampler;
pub mod survival;
pub mod types;

pub use adaptive::ScaleAdapter;
pub use covariance::{
    cholesky_upper, corr_chol_from_free, cov2cor, free_entries, log_density_random_effects,
    reconstruct_covariance,
};
pub use posterior::{
    JmAcceptance, JmDraws, JmPosteriorSummary, JmSamples, ParameterSummary, summarize_columns,
    summarize_draws,
};
pub use priors::{BlockPrior, JmPriors};
pub use sampler::{ChainState, JmInitialValues, fit_joint_model};
pub use survival::{LinearPredictors, log_density_surv};
pub use types::{
    JmAcceptanceRates, JmControl, JmDiagnostics, JmError, JmModel, JmReport,
};
