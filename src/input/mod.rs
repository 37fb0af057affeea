//! # Model inputs
//!
//! Typed containers for the pre-assembled numeric bundle the sampler
//! consumes: censoring index sets, quadrature design matrices, quadrature
//! log-weights, and the subject grouping index. Construction of these
//! matrices from raw subject data is a host responsibility; validation here
//! only rejects bundles whose shapes or values are inconsistent.

pub mod joint;

pub use joint::{GroupIndex, JointInputError, JointModelInput, PreparedJointInput};
