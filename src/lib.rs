#![forbid(unsafe_code)]

//! # `joint_models`
//!
//! MCMC engine for Bayesian joint models linking a time-to-event process to
//! one or more longitudinal measurement processes. The crate owns the
//! sampler: adaptive Metropolis-Hastings updates over correlated parameter
//! blocks, a closed-form Gibbs step for the spline-coefficient precision, and
//! numerically stable covariance updates through a Cholesky-factored
//! correlation matrix.
//!
//! Design-matrix construction, model specification, posterior plotting, and
//! data marshalling are host responsibilities; inputs arrive as validated
//! numeric bundles (see [`input`]).

pub mod inference;
pub mod input;
pub mod models;
pub mod utils;

pub use inference::ProposalStats;
pub use input::{GroupIndex, JointInputError, JointModelInput, PreparedJointInput};
pub use models::jm::{
    BlockPrior, ChainState, JmAcceptance, JmAcceptanceRates, JmControl, JmDiagnostics, JmDraws,
    JmError, JmInitialValues, JmModel, JmPosteriorSummary, JmPriors, JmReport, JmSamples,
    LinearPredictors, ParameterSummary, ScaleAdapter, fit_joint_model, log_density_surv,
    summarize_draws,
};
pub mod matrix_ops {
    pub use crate::models::matrix_ops::*;
}
