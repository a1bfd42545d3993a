use log::warn;
use nalgebra::{DMatrix, DVector, DVectorView, RealField};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// The observation-error model.
///
/// Holds the per-dimension noise variances together with the `p × p`
/// observation-error covariance `R`, which is diagonal unless a full matrix
/// was supplied. Perturbed-observation ensembles are drawn so that their
/// empirical covariance converges to `R` with growing ensemble size.
#[derive(Clone, Debug)]
pub struct ObservationNoise<T>
where
    T: Copy + RealField,
{
    /// Per-dimension standard deviations, precomputed for sampling.
    stddev: DVector<T>,

    /// Observation-error covariance `R`.
    covariance: DMatrix<T>,
}

impl<T> ObservationNoise<T>
where
    T: Copy + RealField,
{
    /// Returns a reference to the observation-error covariance `R`.
    pub fn covariance(&self) -> &DMatrix<T> {
        &self.covariance
    }

    /// Create a new [`ObservationNoise`] from per-dimension variances, with
    /// `R` as the corresponding diagonal matrix.
    pub fn from_variances(variances: &DVectorView<T>) -> Self {
        Self {
            stddev: variances.map(|variance| variance.sqrt()),
            covariance: DMatrix::from_diagonal(variances),
        }
    }

    /// Returns the observation space dimension `p`.
    pub fn ndim(&self) -> usize {
        self.stddev.len()
    }

    /// Generate a perturbed-observation ensemble around the vector `data`.
    ///
    /// Column `i` equals `data + ε_i` with `ε_i` drawn independently per
    /// member and per dimension from the noise distribution. The draw is
    /// deterministic for a fixed RNG state and must be repeated freshly every
    /// assimilation cycle; callers never cache the result.
    ///
    /// A length mismatch between `data` and the noise dimension is flagged
    /// with a warning and the supplied length is used; dimensions without a
    /// configured variance are copied unperturbed.
    pub fn perturb_ensemble<R>(&self, data: &DVectorView<T>, size: usize, rng: &mut R) -> DMatrix<T>
    where
        R: Rng,
        StandardNormal: Distribution<T>,
    {
        if data.len() != self.ndim() {
            warn!(
                "perturb_ensemble: observation vector length {} disagrees with noise dimension {}",
                data.len(),
                self.ndim()
            );
        }

        DMatrix::from_fn(data.len(), size, |idx, _| {
            let sigma = if idx < self.stddev.len() {
                self.stddev[idx]
            } else {
                T::zero()
            };

            data[idx] + sigma * StandardNormal.sample(rng)
        })
    }

    /// Create a new [`ObservationNoise`] with a uniform variance across all
    /// `ndim` observation dimensions.
    pub fn uniform(ndim: usize, variance: T) -> Self {
        Self::from_variances(&DVector::from_element(ndim, variance).as_view())
    }

    /// Returns a reference to the per-dimension standard deviations.
    pub fn stddev(&self) -> &DVector<T> {
        &self.stddev
    }

    /// Create a new [`ObservationNoise`] from per-dimension variances and an
    /// explicitly supplied covariance matrix.
    ///
    /// The variances drive the perturbation sampling while the supplied
    /// matrix enters the gain computation; shape consistency is validated at
    /// filter construction.
    pub fn with_covariance(variances: &DVectorView<T>, covariance: DMatrix<T>) -> Self {
        Self {
            stddev: variances.map(|variance| variance.sqrt()),
            covariance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ensemble_covariance;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_perturbation_covariance_converges() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);

        let noise =
            ObservationNoise::from_variances(&DVector::<f64>::from_vec(vec![0.25, 1.0]).as_view());
        let data = DVector::from_vec(vec![10.0, -4.0]);

        let perturbed = noise.perturb_ensemble(&data.as_view(), 5000, &mut rng);

        assert_eq!(perturbed.shape(), (2, 5000));

        let covariance = ensemble_covariance(&perturbed).unwrap();

        assert!((covariance[(0, 0)] - 0.25).abs() < 0.05);
        assert!((covariance[(1, 1)] - 1.0).abs() < 0.1);
        assert!(covariance[(0, 1)].abs() < 0.05);
    }

    #[test]
    fn test_perturbation_is_reproducible() {
        let noise = ObservationNoise::uniform(3, 0.5);
        let data = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let first = noise.perturb_ensemble(
            &data.as_view(),
            16,
            &mut Xoshiro256PlusPlus::seed_from_u64(7),
        );
        let second = noise.perturb_ensemble(
            &data.as_view(),
            16,
            &mut Xoshiro256PlusPlus::seed_from_u64(7),
        );

        assert_eq!(first, second);

        // A different stream produces a different ensemble.
        let third = noise.perturb_ensemble(
            &data.as_view(),
            16,
            &mut Xoshiro256PlusPlus::seed_from_u64(8),
        );

        assert_ne!(first, third);
    }

    #[test]
    fn test_uniform_noise_matches_explicit_variances() {
        let uniform = ObservationNoise::uniform(4, 0.1);
        let explicit =
            ObservationNoise::from_variances(&DVector::from_element(4, 0.1).as_view());

        assert_eq!(uniform.covariance(), explicit.covariance());
        assert_eq!(uniform.stddev(), explicit.stddev());
        assert_eq!(uniform.ndim(), 4);
    }
}
