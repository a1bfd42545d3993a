use nalgebra::{DMatrix, DVector, DVectorView, RealField};

/// A fixed linear map from state space to observation space.
///
/// Wraps the `p × n` observation operator matrix `H`, constant for the
/// filter's lifetime. The transpose enters every gain computation, so it is
/// computed once at construction and cached.
#[derive(Clone, Debug)]
pub struct ObservationOperator<T>
where
    T: Copy + RealField,
{
    matrix: DMatrix<T>,
    transpose: DMatrix<T>,
}

impl<T> ObservationOperator<T>
where
    T: Copy + RealField,
{
    /// Returns a reference to the operator matrix.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// Create a new [`ObservationOperator`] from the `p × n` matrix `H`.
    pub fn new(matrix: DMatrix<T>) -> Self {
        let transpose = matrix.transpose();

        Self { matrix, transpose }
    }

    /// Returns the observation space dimension `p`.
    pub fn nobs(&self) -> usize {
        self.matrix.nrows()
    }

    /// Returns the state space dimension `n`.
    pub fn nstate(&self) -> usize {
        self.matrix.ncols()
    }

    /// Map a column ensemble of states into observation space (`H·X`).
    pub fn project_ensemble(&self, states: &DMatrix<T>) -> DMatrix<T> {
        &self.matrix * states
    }

    /// Map a single state vector into observation space (`H·x`).
    pub fn project_state(&self, state: &DVectorView<T>) -> DVector<T> {
        &self.matrix * state
    }

    /// Returns a reference to the cached operator transpose.
    pub fn transpose(&self) -> &DMatrix<T> {
        &self.transpose
    }
}
