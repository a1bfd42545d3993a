use nalgebra::{DVector, DVectorView, RealField};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// Split an interleaved planar state vector into its x and y components.
///
/// Assumes the convention used by planar agent models: even entries are x
/// coordinates, odd entries are y coordinates.
pub fn split_planar<T>(state: &DVectorView<T>) -> (DVector<T>, DVector<T>)
where
    T: Copy + RealField,
{
    let x = state.iter().copied().step_by(2).collect::<Vec<T>>();
    let y = state.iter().copied().skip(1).step_by(2).collect::<Vec<T>>();

    (DVector::from_vec(x), DVector::from_vec(y))
}

/// Per-step mean absolute errors between a result series and a truth history.
///
/// Entry `k` compares the `k`-th result against the `k`-th truth state;
/// models that record their initial state in the history should be compared
/// against `history[1..]` so that both sequences start after the first step.
/// The comparison stops at the shorter of the two sequences.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ErrorSeries<T>
where
    T: Copy + RealField,
{
    /// Mean absolute x error per step.
    pub x: Vec<T>,

    /// Mean absolute y error per step.
    pub y: Vec<T>,

    /// Mean Euclidean distance error per step.
    pub distance: Vec<T>,
}

impl<T> ErrorSeries<T>
where
    T: Copy + RealField,
{
    /// Compute an [`ErrorSeries`] from a result series and a truth history.
    pub fn from_results(results: &[DVector<T>], truth: &[DVector<T>]) -> Self
    where
        usize: AsPrimitive<T>,
    {
        let mut series = Self {
            x: Vec::with_capacity(results.len()),
            y: Vec::with_capacity(results.len()),
            distance: Vec::with_capacity(results.len()),
        };

        for (result, expected) in results.iter().zip(truth) {
            let (x_result, y_result) = split_planar(&result.as_view());
            let (x_truth, y_truth) = split_planar(&expected.as_view());

            let x_error = (x_result - x_truth).map(|value| value.abs());
            let y_error = (y_result - y_truth).map(|value| value.abs());

            let distance = x_error
                .zip_map(&y_error, |dx, dy| (dx * dx + dy * dy).sqrt())
                .sum()
                / x_error.len().as_();

            series.x.push(x_error.mean());
            series.y.push(y_error.mean());
            series.distance.push(distance);
        }

        series
    }

    /// Returns true if the series contains no entries.
    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    /// Returns the number of compared steps.
    pub fn len(&self) -> usize {
        self.distance.len()
    }
}
