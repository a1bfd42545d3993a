use nalgebra::{DVector, RealField};
use serde::{Deserialize, Serialize};

/// A read-only view of the filter state at an assimilation boundary.
///
/// All vectors are copies; mutating a snapshot never feeds back into the
/// filter.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EnsembleSnapshot<T>
where
    T: Copy + RealField,
{
    /// The time index of the snapshot.
    pub time: usize,

    /// Current state of the reference (truth) model.
    pub truth: DVector<T>,

    /// Current ensemble mean state.
    pub mean: DVector<T>,

    /// Current state of every ensemble member.
    pub members: Vec<DVector<T>>,
}

/// A trait that is shared by all assimilation reporting sinks.
///
/// The filter hands a sink read-only [`EnsembleSnapshot`] values around every
/// update cycle; both hooks default to doing nothing, so implementors only
/// override what they render.
pub trait AssimilationSink<T>
where
    T: Copy + RealField,
{
    /// Called immediately before an update cycle is applied.
    fn on_before_update(&mut self, _snapshot: &EnsembleSnapshot<T>) {}

    /// Called immediately after an update cycle was applied.
    fn on_after_update(&mut self, _snapshot: &EnsembleSnapshot<T>) {}
}

/// A reporting sink that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl<T> AssimilationSink<T> for NullSink where T: Copy + RealField {}
