use nalgebra::{DVector, DVectorView, RealField};

/// A trait that is shared by all dynamical models that can seed an ensemble.
///
/// The filter core is model-agnostic: any type that can advance its own state
/// by one discrete tick, expose that state as a vector, accept a corrected
/// state vector, and replicate itself into independent copies can be
/// assimilated. The contract is validated once at filter construction, see
/// [`EnsembleKalmanFilter::new`](`crate::methods::EnsembleKalmanFilter::new`).
pub trait ForecastModel<T>: Send
where
    T: Copy + RealField,
{
    /// Advance the model state by exactly one discrete time step.
    fn advance_one_step(&mut self);

    /// Returns the current model state as a vector.
    fn get_state(&self) -> DVector<T>;

    /// Overwrite the current model state with the given vector.
    fn set_state(&mut self, state: &DVectorView<T>);

    /// Returns the recorded state history, one entry per completed time step.
    ///
    /// The last entry is used as the ground-truth observation source at
    /// assimilation boundaries when the model acts as the reference model.
    fn state_history(&self) -> &[DVector<T>];

    /// Create an independent copy of the model.
    ///
    /// The copy must not share any mutable state with `self`; replica
    /// independence is probed at filter construction. Stochastic models
    /// should hand each replica its own random stream, as replicas that
    /// evolve identically collapse the ensemble spread.
    fn replicate(&self) -> Self
    where
        Self: Sized;
}
