//! # Assimilation methods.
//!
//! This module provides the [`EnsembleKalmanFilter`], the orchestrator of the predict/update
//! cycle, together with its typed configuration surface:
//! - [`FilterSettings`] (and [`FilterSettingsBuilder`]) carries the recognized options with
//!   validated, named fields; [`FilterSettings::from_json5`] loads settings from JSON5 and flags
//!   unknown keys as structured warnings instead of applying them blindly.
//! - [`ConfigError`] covers everything that can go wrong at construction, [`FilterError`]
//!   everything that can go wrong during a step; per-step numerical failures carry the time
//!   index and matrix shapes needed to diagnose them without re-running.
//! - [`SingularUpdatePolicy`] makes the behavior on a singular innovation covariance an
//!   explicit choice between aborting the run and skipping the affected cycle.

mod enkf;

pub use enkf::*;
