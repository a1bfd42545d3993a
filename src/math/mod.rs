//! # Ensemble statistics and gain computations.
//!
//! The two numerical kernels of the filter live here:
//! - [`ensemble_covariance`] estimates the unbiased sample covariance of a column ensemble.
//! - [`kalman_gain`] combines that covariance with the observation operator and the
//!   observation-error covariance into the Kalman gain matrix.
//!
//! Both functions surface degenerate inputs as a typed [`MathError`] instead of returning
//! numerical garbage; the gain computation goes through a Cholesky factorization and triangular
//! solves rather than a formula-level matrix inverse.

mod covariance;
mod gain;

pub use covariance::*;
pub use gain::*;

use thiserror::Error;

/// Error types associated with the covariance and gain computations.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MathError {
    #[error("ensemble of size {size} is too small to form a covariance estimate")]
    DegenerateEnsemble { size: usize },
    #[error("{rows} x {cols} matrix is not invertible within numerical tolerance")]
    SingularMatrix { rows: usize, cols: usize },
}
