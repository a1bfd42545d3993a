//! # Core building blocks of the **enkf** crate.
//!
//! # Forecast Models
//!
//! External dynamical models enter the filter through the [`ForecastModel`] capability contract:
//! advance-one-step, read-state, write-state, a readable state history and explicit replication.
//! The contract is deliberately a trait rather than a reflective probe, so a model that cannot be
//! assimilated fails to compile instead of failing mid-run.
//!
//! # Ensembles
//!
//! An [`Ensemble`] owns the replicated model instances together with the materialized state
//! matrix (one column per member), and is the single owner of both representations:
//! - [`sync_from_members`](`Ensemble::sync_from_members`) refreshes the matrix after the members
//!   were advanced.
//! - [`sync_to_members`](`Ensemble::sync_to_members`) writes a corrected matrix back into the
//!   members.
//! - [`mean`](`Ensemble::mean`) recomputes the ensemble mean, the filter's best point estimate.

mod ensbl;
mod model;

pub use ensbl::*;
pub use model::*;
