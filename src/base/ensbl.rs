use crate::base::ForecastModel;
use itertools::zip_eq;
use nalgebra::{DMatrix, DVector, RealField};
use rayon::prelude::*;
use thiserror::Error;

/// Error types associated with [`Ensemble`] construction and synchronization.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EnsembleError {
    #[error("member {member} holds a state vector of length {found} but expected {expected}")]
    StateLength {
        member: usize,
        expected: usize,
        found: usize,
    },
}

/// A model ensemble.
///
/// Owns the `m` model instances together with the materialized `n × m` state
/// matrix, where column `i` mirrors the state of member `i`. The matrix and
/// the members are kept consistent through
/// [`sync_from_members`](`Ensemble::sync_from_members`) after operations that
/// mutate the members and [`sync_to_members`](`Ensemble::sync_to_members`)
/// after operations that mutate the matrix; no stale copy survives a step
/// boundary.
#[derive(Debug)]
pub struct Ensemble<M, T>
where
    M: ForecastModel<T>,
    T: Copy + RealField,
{
    /// The ensemble members, exclusively owned.
    members: Vec<M>,

    /// State matrix, one column per member.
    matrix: DMatrix<T>,
}

impl<M, T> Ensemble<M, T>
where
    M: ForecastModel<T>,
    T: Copy + RealField,
{
    /// Advance every member by exactly one discrete time step and resync the
    /// state matrix.
    ///
    /// Members evolve independently and are advanced in parallel; the
    /// parallel join acts as the barrier required before any covariance or
    /// gain computation reads the matrix.
    pub fn advance(&mut self) -> Result<(), EnsembleError> {
        self.members
            .par_iter_mut()
            .for_each(|member| member.advance_one_step());

        self.sync_from_members()
    }

    /// Returns true if the ensemble contains no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the number of members in the ensemble, also referred to as its 'length'.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns a reference to the state matrix.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// Returns the column-wise mean of the state matrix.
    ///
    /// The mean is always recomputed from the current matrix, never
    /// maintained incrementally.
    pub fn mean(&self) -> DVector<T> {
        self.matrix.column_mean()
    }

    /// Returns read-only copies of every member state, for reporting.
    pub fn member_states(&self) -> Vec<DVector<T>> {
        self.members.iter().map(|member| member.get_state()).collect()
    }

    /// Returns a reference to the ensemble members.
    pub fn members(&self) -> &[M] {
        &self.members
    }

    /// Returns the state vector dimension.
    pub fn ndim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Create a new [`Ensemble`] by replicating a base model `size` times.
    ///
    /// Each member is an independent copy obtained through
    /// [`ForecastModel::replicate`]; the state matrix is populated from the
    /// fresh members immediately.
    pub fn new(base_model: &M, size: usize, ndim: usize) -> Result<Self, EnsembleError> {
        let members = (0..size)
            .map(|_| base_model.replicate())
            .collect::<Vec<M>>();

        let mut ensemble = Self {
            members,
            matrix: DMatrix::zeros(ndim, size),
        };

        ensemble.sync_from_members()?;

        Ok(ensemble)
    }

    /// Replace the state matrix with a freshly computed one.
    ///
    /// The members are left untouched; callers apply a correction into a new
    /// matrix and follow up with [`sync_to_members`](`Ensemble::sync_to_members`).
    pub fn set_matrix(&mut self, matrix: DMatrix<T>) {
        assert_eq!(
            matrix.shape(),
            self.matrix.shape(),
            "ensemble matrix shape is fixed for the filter lifetime"
        );

        self.matrix = matrix;
    }

    /// Overwrite each matrix column with the corresponding member state.
    ///
    /// Must be called after any operation that mutates the members directly.
    pub fn sync_from_members(&mut self) -> Result<(), EnsembleError> {
        let ndim = self.matrix.nrows();

        for (idx, member) in self.members.iter().enumerate() {
            let state = member.get_state();

            if state.len() != ndim {
                return Err(EnsembleError::StateLength {
                    member: idx,
                    expected: ndim,
                    found: state.len(),
                });
            }

            self.matrix.set_column(idx, &state);
        }

        Ok(())
    }

    /// Overwrite each member state with the corresponding matrix column.
    ///
    /// Must be called after any operation that mutates the matrix directly.
    pub fn sync_to_members(&mut self) {
        zip_eq(self.members.iter_mut(), self.matrix.column_iter())
            .for_each(|(member, column)| member.set_state(&column));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DriftModel;
    use approx::ulps_eq;
    use nalgebra::DVector;

    #[test]
    fn test_ensemble_construction() {
        let base = DriftModel::new(4, 1);

        let ensemble = Ensemble::new(&base, 10, 4).unwrap();

        assert_eq!(ensemble.len(), 10);
        assert_eq!(ensemble.ndim(), 4);
        assert!(!ensemble.is_empty());

        // Fresh replicas all mirror the base state.
        for state in ensemble.member_states() {
            assert_eq!(state, base.get_state());
        }
    }

    #[test]
    fn test_ensemble_rejects_dimension_mismatch() {
        let base = DriftModel::new(4, 1);

        assert_eq!(
            Ensemble::new(&base, 3, 6).unwrap_err(),
            EnsembleError::StateLength {
                member: 0,
                expected: 6,
                found: 4
            }
        );
    }

    #[test]
    fn test_ensemble_sync_round_trip() {
        let base = DriftModel::new(2, 1);
        let mut ensemble = Ensemble::new(&base, 3, 2).unwrap();

        let mut matrix = ensemble.matrix().clone();
        matrix.set_column(1, &DVector::from_vec(vec![5.0, -3.0]));

        ensemble.set_matrix(matrix);
        ensemble.sync_to_members();

        assert_eq!(
            ensemble.members()[1].get_state(),
            DVector::from_vec(vec![5.0, -3.0])
        );

        ensemble.sync_from_members().unwrap();

        assert_eq!(ensemble.matrix()[(0, 1)], 5.0);
        assert_eq!(ensemble.matrix()[(1, 1)], -3.0);
    }

    #[test]
    fn test_ensemble_mean_and_advance() {
        let base = DriftModel::new(2, 7);
        let mut ensemble = Ensemble::new(&base, 25, 2).unwrap();

        let before = ensemble.mean();

        assert!(ulps_eq!(before, base.get_state()));

        ensemble.advance().unwrap();

        // Shapes are invariant under predict steps.
        assert_eq!(ensemble.matrix().shape(), (2, 25));
        assert_eq!(ensemble.mean().len(), 2);

        // The drift moves every member, so the mean must have moved as well.
        assert!((ensemble.mean() - before).norm() > 0.0);
    }
}
