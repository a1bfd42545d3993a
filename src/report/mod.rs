//! # Reporting surfaces of the filter.
//!
//! Everything in this module is read-only with respect to the filter core:
//! - [`StateMeanSeries`] is the append-only record of ensemble mean states, one entry per
//!   completed step, for post-hoc analysis.
//! - [`EnsembleSnapshot`] captures the reference model state and every member state at an
//!   assimilation boundary; snapshots are handed to an [`AssimilationSink`] before and after
//!   each update cycle, so that plotting or diagnostics can be injected without living inside
//!   the assimilation step. [`NullSink`] is the sink that does nothing.
//! - [`ErrorSeries`] condenses a result series and a ground-truth history into per-step mean
//!   absolute x/y/Euclidean errors for interleaved planar states; rendering the curves is out
//!   of scope and left to external tooling.

mod errors;
mod sink;

pub use errors::*;
pub use sink::*;

use derive_more::{Deref, IntoIterator};
use nalgebra::{DVector, RealField};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// The append-only record of ensemble mean states.
///
/// One entry is appended per completed filter step; entry `k` is the mean
/// after step `k + 1`. Entries are never removed or rewritten.
#[derive(Clone, Debug, Default, Deref, Deserialize, IntoIterator, Serialize)]
pub struct StateMeanSeries<T>(#[into_iterator(ref)] Vec<DVector<T>>)
where
    T: Copy + RealField;

impl<T> StateMeanSeries<T>
where
    T: Copy + RealField,
{
    /// Create an empty [`StateMeanSeries`].
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append the mean state of a completed step.
    pub(crate) fn push(&mut self, mean: DVector<T>) {
        self.0.push(mean);
    }

    /// Serialize the series to a JSON file.
    pub fn save(&self, path: String) -> std::io::Result<()>
    where
        Self: Serialize,
    {
        let mut file = std::fs::File::create(path)?;

        file.write_all(serde_json5::to_string(&self).unwrap().as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_append_and_save() {
        let mut series = StateMeanSeries::new();

        series.push(DVector::from_vec(vec![1.0, 2.0]));
        series.push(DVector::from_vec(vec![3.0, 4.0]));

        assert_eq!(series.len(), 2);
        assert_eq!(series[1][0], 3.0);

        let path = std::env::temp_dir().join("enkf_series_test.json");

        series.save(path.to_string_lossy().to_string()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let restored = serde_json5::from_str::<StateMeanSeries<f64>>(&text).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[1], series[1]);

        std::fs::remove_file(path).ok();
    }
}
