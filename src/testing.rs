//! Shared model fixtures for unit tests.

use crate::base::ForecastModel;
use nalgebra::{DVector, DVectorView};
use rand::RngExt;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::cell::Cell;

/// A stochastic drift model over an interleaved x/y state.
///
/// Every instance drifts by a constant per step plus normal jitter drawn from
/// its own random stream; replicas receive distinct streams so the ensemble
/// develops spread, mirroring the agent-based models the filter targets.
#[derive(Debug)]
pub(crate) struct DriftModel {
    state: DVector<f64>,
    history: Vec<DVector<f64>>,
    rng: Xoshiro256PlusPlus,
    jitter: f64,
    seed: u64,
    replicas: Cell<u64>,
}

impl DriftModel {
    pub(crate) fn new(ndim: usize, seed: u64) -> Self {
        Self::with_jitter(ndim, seed, 0.2)
    }

    pub(crate) fn with_jitter(ndim: usize, seed: u64, jitter: f64) -> Self {
        let state = DVector::from_fn(ndim, |idx, _| idx as f64 * 0.5);

        Self {
            history: vec![state.clone()],
            state,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            jitter,
            seed,
            replicas: Cell::new(0),
        }
    }
}

impl ForecastModel<f64> for DriftModel {
    fn advance_one_step(&mut self) {
        let jitter = self.jitter;
        let rng = &mut self.rng;

        self.state
            .apply(|value| *value += 0.1 + jitter * rng.sample::<f64, _>(StandardNormal));

        self.history.push(self.state.clone());
    }

    fn get_state(&self) -> DVector<f64> {
        self.state.clone()
    }

    fn set_state(&mut self, state: &DVectorView<f64>) {
        self.state = state.clone_owned();
    }

    fn state_history(&self) -> &[DVector<f64>] {
        &self.history
    }

    fn replicate(&self) -> Self {
        let replicas = self.replicas.get() + 1;
        self.replicas.set(replicas);

        Self {
            state: self.state.clone(),
            history: self.history.clone(),
            rng: Xoshiro256PlusPlus::seed_from_u64(
                self.seed.wrapping_mul(31).wrapping_add(replicas),
            ),
            jitter: self.jitter,
            seed: self.seed.wrapping_mul(31).wrapping_add(replicas),
            replicas: Cell::new(0),
        }
    }
}
