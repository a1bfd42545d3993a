use crate::{math::MathError, obser::ObservationOperator};
use nalgebra::{DMatrix, RealField};

/// Compute the Kalman gain matrix `K = C·Hᵗ·S⁻¹` with `S = H·C·Hᵗ + R`.
///
/// `C` is the ensemble state covariance, `H` the observation operator and `R`
/// the observation-error covariance; `S` is the innovation covariance. `S` is
/// factorized with a Cholesky decomposition and the gain is obtained through
/// triangular solves. A factorization failure means the innovation covariance
/// is not invertible within numerical tolerance and surfaces as
/// [`MathError::SingularMatrix`]; the failure is never replaced by a default.
pub fn kalman_gain<T>(
    covariance: &DMatrix<T>,
    operator: &ObservationOperator<T>,
    noise_covariance: &DMatrix<T>,
) -> Result<DMatrix<T>, MathError>
where
    T: Copy + RealField,
{
    let cross = covariance * operator.transpose();

    let innovation = operator.matrix() * &cross + noise_covariance;
    let nobs = innovation.nrows();

    let cholesky = innovation.cholesky().ok_or(MathError::SingularMatrix {
        rows: nobs,
        cols: nobs,
    })?;

    // S and C are symmetric, so solving S·Kᵗ = (C·Hᵗ)ᵗ yields the gain transpose.
    Ok(cholesky.solve(&cross.transpose()).transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_gain_hand_checked() {
        // Observe only the first of two state dimensions.
        let operator = ObservationOperator::new(dmatrix![1.0, 0.0]);
        let covariance: DMatrix<f64> = dmatrix![
            2.0, 1.0;
            1.0, 2.0
        ];
        let noise = dmatrix![1.0];

        let gain = kalman_gain(&covariance, &operator, &noise).unwrap();

        assert_eq!(gain.shape(), (2, 1));
        assert!((gain[(0, 0)] - 2.0 / 3.0).abs() < 1e-12);
        assert!((gain[(1, 0)] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_gain_limits() {
        let operator = ObservationOperator::new(DMatrix::identity(3, 3));
        let covariance = DMatrix::identity(3, 3);

        // Vanishing observation error: the gain approaches the identity and
        // the update replaces the ensemble with the observations.
        let strong = kalman_gain(&covariance, &operator, &(DMatrix::identity(3, 3) * 1e-12)).unwrap();

        assert!((strong - DMatrix::identity(3, 3)).norm() < 1e-9);

        // Infinite observation error: the gain vanishes and the update leaves
        // the ensemble unchanged.
        let weak = kalman_gain(&covariance, &operator, &(DMatrix::identity(3, 3) * 1e12)).unwrap();

        assert!(weak.norm() < 1e-9);
    }

    #[test]
    fn test_gain_singular_innovation() {
        let operator = ObservationOperator::new(DMatrix::<f64>::identity(2, 2));

        assert_eq!(
            kalman_gain(&DMatrix::zeros(2, 2), &operator, &DMatrix::zeros(2, 2)).unwrap_err(),
            MathError::SingularMatrix { rows: 2, cols: 2 }
        );
    }
}
