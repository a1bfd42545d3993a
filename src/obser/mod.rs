//! # Observation operators and noise models.
//!
//! Observations enter the filter through two fixed, read-shared components:
//! - The [`ObservationOperator`] is the linear map `H` from the full state space into the
//!   lower-dimensional space that is actually observed. It is pure data, constant for the
//!   filter's lifetime, and caches its own transpose.
//! - The [`ObservationNoise`] model owns the observation-error covariance `R` and generates the
//!   perturbed-observation ensembles that keep the updated ensemble spread from collapsing.
//!   Perturbations are redrawn from a seeded random stream at every assimilation cycle.

mod noise;
mod operator;

pub use noise::*;
pub use operator::*;
