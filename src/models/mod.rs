//! # Models
//!
//! The joint survival/longitudinal model implementation and shared
//! dense-matrix helpers.

pub mod jm;
pub mod matrix_ops;
