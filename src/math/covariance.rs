use crate::math::MathError;
use nalgebra::{DMatrix, RealField};

/// Compute the unbiased sample covariance of a column ensemble.
///
/// For an `n × m` matrix `X` with one member state per column this evaluates
/// `C = (X − X̄)(X − X̄)ᵗ / (m − 1)`, where every column of `X̄` equals the
/// ensemble mean. The estimate is undefined for fewer than two members and
/// fails with [`MathError::DegenerateEnsemble`] in that case.
pub fn ensemble_covariance<T>(ensemble: &DMatrix<T>) -> Result<DMatrix<T>, MathError>
where
    T: Copy + RealField,
{
    let size = ensemble.ncols();

    if size < 2 {
        return Err(MathError::DegenerateEnsemble { size });
    }

    let mean = ensemble.column_mean();

    let mut centered = ensemble.clone_owned();

    centered
        .column_iter_mut()
        .for_each(|mut column| column -= &mean);

    Ok(&centered * centered.transpose() / T::from_usize(size - 1).unwrap())
}
