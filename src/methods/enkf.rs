use crate::{
    base::{Ensemble, EnsembleError, ForecastModel},
    math::{MathError, ensemble_covariance, kalman_gain},
    obser::{ObservationNoise, ObservationOperator},
    report::{AssimilationSink, EnsembleSnapshot, NullSink, StateMeanSeries},
};
use derive_builder::Builder;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, RealField};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Instant;
use thiserror::Error;

/// Error types associated with filter configuration and construction.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{option}` must be nonzero")]
    ZeroOption { option: &'static str },
    #[error(
        "observation operator has shape {rows} x {cols} \
        but expected {expected_rows} x {expected_cols}"
    )]
    OperatorShape {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("noise variance vector has length {found} but expected {expected}")]
    NoiseLength { expected: usize, found: usize },
    #[error("data covariance has shape {rows} x {cols} but expected {expected} x {expected}")]
    CovarianceShape {
        rows: usize,
        cols: usize,
        expected: usize,
    },
    #[error("base model state has length {found} but expected {expected}")]
    StateLength { expected: usize, found: usize },
    #[error("base model state did not round-trip through set_state/get_state")]
    StateWriteback,
    #[error("replicated model aliases the base model state")]
    AliasedReplica,
    #[error("failed to parse filter settings: {0}")]
    Parse(String),
    #[error("ensemble construction failed")]
    Ensemble(#[from] EnsembleError),
}

/// Error types associated with the per-step assimilation cycle.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("covariance estimation failed at time {time}")]
    Covariance {
        time: usize,
        #[source]
        source: MathError,
    },
    #[error("gain computation failed at time {time} (state dim {nstate}, observation dim {nobs})")]
    Gain {
        time: usize,
        nstate: usize,
        nobs: usize,
        #[source]
        source: MathError,
    },
    #[error("reference model has no recorded state at time {time}")]
    MissingObservation { time: usize },
    #[error("observation at time {time} has length {found} but expected {expected}")]
    ObservationLength {
        time: usize,
        expected: usize,
        found: usize,
    },
    #[error("ensemble synchronization failed at time {time}")]
    Ensemble {
        time: usize,
        #[source]
        source: EnsembleError,
    },
}

/// Policy applied when the innovation covariance cannot be factorized during
/// an update.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SingularUpdatePolicy {
    /// Abort the run: the failing step returns [`FilterError::Gain`].
    #[default]
    Abort,
    /// Skip the assimilation cycle with a warning and keep predicting.
    Skip,
}

fn default_max_iterations() -> usize {
    10
}

fn default_assimilation_period() -> usize {
    1
}

fn default_rseed() -> u64 {
    42
}

/// Ensemble Kalman Filter settings.
///
/// All dimensions are fixed for the filter's lifetime. Settings can be
/// assembled through [`FilterSettingsBuilder`] or loaded from JSON5 with
/// [`FilterSettings::from_json5`].
#[derive(Builder, Clone, Debug, Deserialize, Serialize)]
pub struct FilterSettings<T>
where
    T: Copy + RealField,
{
    /// Advisory cap on the total number of steps, enforced by
    /// [`EnsembleKalmanFilter::run`] rather than by `step` itself.
    #[builder(default = 10)]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of ensemble members `m`.
    pub ensemble_size: usize,

    /// Number of predict-only steps between update cycles.
    #[builder(default = 1)]
    #[serde(default = "default_assimilation_period")]
    pub assimilation_period: usize,

    /// State vector dimension `n`.
    pub state_vector_length: usize,

    /// Observation vector dimension `p`.
    pub data_vector_length: usize,

    /// Observation operator matrix `H` with shape `p × n`.
    #[serde(rename = "H")]
    pub observation_operator: DMatrix<T>,

    /// Per-dimension observation noise variances, length `p`.
    #[serde(rename = "R_vector")]
    pub noise_variances: DVector<T>,

    /// Optional precomputed `p × p` observation-error covariance; derived
    /// from the noise variances when absent.
    #[builder(default = None)]
    #[serde(default)]
    pub data_covariance: Option<DMatrix<T>>,

    /// Fail instead of warning when an observation length disagrees with the
    /// configured state dimension.
    #[builder(default = false)]
    #[serde(default)]
    pub strict_observation_length: bool,

    /// Policy for singular innovation covariances.
    #[builder(default)]
    #[serde(default)]
    pub singular_policy: SingularUpdatePolicy,

    /// Random seed (initial & running).
    #[builder(default = 42)]
    #[serde(default = "default_rseed")]
    pub rseed: u64,
}

impl<T> FilterSettings<T>
where
    T: Copy + RealField,
{
    /// Load settings from a JSON5 string.
    ///
    /// Every unrecognized key is flagged with a warning and otherwise
    /// ignored; recognized values are validated for shape consistency.
    pub fn from_json5(text: &str) -> Result<Self, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        const RECOGNIZED: [&str; 11] = [
            "max_iterations",
            "ensemble_size",
            "assimilation_period",
            "state_vector_length",
            "data_vector_length",
            "H",
            "R_vector",
            "data_covariance",
            "strict_observation_length",
            "singular_policy",
            "rseed",
        ];

        let raw = serde_json5::from_str::<serde_json::Map<String, serde_json::Value>>(text)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;

        for key in raw.keys() {
            if !RECOGNIZED.contains(&key.as_str()) {
                warn!("filter settings received unexpected `{key}` option");
            }
        }

        let settings = serde_json5::from_str::<Self>(text)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate dimension and shape consistency across all options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (option, value) in [
            ("ensemble_size", self.ensemble_size),
            ("assimilation_period", self.assimilation_period),
            ("state_vector_length", self.state_vector_length),
            ("data_vector_length", self.data_vector_length),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroOption { option });
            }
        }

        if self.observation_operator.shape()
            != (self.data_vector_length, self.state_vector_length)
        {
            return Err(ConfigError::OperatorShape {
                rows: self.observation_operator.nrows(),
                cols: self.observation_operator.ncols(),
                expected_rows: self.data_vector_length,
                expected_cols: self.state_vector_length,
            });
        }

        if self.noise_variances.len() != self.data_vector_length {
            return Err(ConfigError::NoiseLength {
                expected: self.data_vector_length,
                found: self.noise_variances.len(),
            });
        }

        if let Some(covariance) = &self.data_covariance {
            if !covariance.is_square() || covariance.nrows() != self.data_vector_length {
                return Err(ConfigError::CovarianceShape {
                    rows: covariance.nrows(),
                    cols: covariance.ncols(),
                    expected: self.data_vector_length,
                });
            }
        }

        Ok(())
    }
}

/// The Ensemble Kalman Filter.
///
/// Owns the reference (truth) model, the replicated ensemble, the observation
/// operator and noise model, and the append-only record of ensemble means.
/// One [`step`](`EnsembleKalmanFilter::step`) call performs exactly one
/// discrete-time tick: a predict phase for the reference model and every
/// member, followed by an update cycle whenever the time counter reaches an
/// assimilation boundary. Each step is atomic from the caller's perspective;
/// stopping between steps leaves the ensemble fully consistent and resumable.
#[derive(Debug)]
pub struct EnsembleKalmanFilter<M, T>
where
    M: ForecastModel<T>,
    T: Copy + RealField,
{
    settings: FilterSettings<T>,
    base_model: M,
    ensemble: Ensemble<M, T>,
    operator: ObservationOperator<T>,
    noise: ObservationNoise<T>,
    state_mean: DVector<T>,
    results: StateMeanSeries<T>,
    rseed: u64,
    time: usize,
}

impl<M, T> EnsembleKalmanFilter<M, T>
where
    M: ForecastModel<T>,
    T: Copy + RealField,
{
    /// Returns a reference to the reference (truth) model.
    pub fn base_model(&self) -> &M {
        &self.base_model
    }

    /// Returns a reference to the model ensemble.
    pub fn ensemble(&self) -> &Ensemble<M, T> {
        &self.ensemble
    }

    /// Create a new [`EnsembleKalmanFilter`] around a validated base model.
    ///
    /// The settings are checked for shape consistency and the base model is
    /// probed once for the required capabilities: its state length must match
    /// the configured dimension, a state written through `set_state` must
    /// read back unchanged, and a mutated replica must not alias the base
    /// model. The ensemble is then seeded with independent replicas.
    pub fn new(base_model: M, settings: FilterSettings<T>) -> Result<Self, ConfigError> {
        settings.validate()?;

        let ndim = settings.state_vector_length;
        let state = base_model.get_state();

        if state.len() != ndim {
            return Err(ConfigError::StateLength {
                expected: ndim,
                found: state.len(),
            });
        }

        let mut probe = base_model.replicate();

        probe.set_state(&state.as_view());

        if probe.get_state() != state {
            return Err(ConfigError::StateWriteback);
        }

        probe.set_state(&state.add_scalar(T::one()).as_view());

        if base_model.get_state() != state {
            return Err(ConfigError::AliasedReplica);
        }

        let operator = ObservationOperator::new(settings.observation_operator.clone());

        let noise = match &settings.data_covariance {
            Some(covariance) => ObservationNoise::with_covariance(
                &settings.noise_variances.as_view(),
                covariance.clone(),
            ),
            None => ObservationNoise::from_variances(&settings.noise_variances.as_view()),
        };

        let ensemble = Ensemble::new(&base_model, settings.ensemble_size, ndim)?;
        let state_mean = ensemble.mean();

        info!(
            "running ensemble kalman filter\n\tmax_iterations: {}\n\tensemble_size: {}\n\tassimilation_period: {}",
            settings.max_iterations, settings.ensemble_size, settings.assimilation_period
        );

        let rseed = settings.rseed;

        Ok(Self {
            settings,
            base_model,
            ensemble,
            operator,
            noise,
            state_mean,
            results: StateMeanSeries::new(),
            rseed,
            time: 0,
        })
    }

    /// Returns a reference to the recorded ensemble mean series.
    pub fn results(&self) -> &StateMeanSeries<T> {
        &self.results
    }

    /// Returns a reference to the filter settings.
    pub fn settings(&self) -> &FilterSettings<T> {
        &self.settings
    }

    /// Returns a read-only snapshot of the current filter state.
    pub fn snapshot(&self) -> EnsembleSnapshot<T> {
        EnsembleSnapshot {
            time: self.time,
            truth: self.base_model.get_state(),
            mean: self.state_mean.clone(),
            members: self.ensemble.member_states(),
        }
    }

    /// Returns a reference to the current ensemble mean state.
    pub fn state_mean(&self) -> &DVector<T> {
        &self.state_mean
    }

    /// Returns the current time index (number of completed steps).
    pub fn time(&self) -> usize {
        self.time
    }

    /// Obtain the current observation from the reference model.
    ///
    /// The latest entry of the truth state history is projected through the
    /// observation operator into observation space. A length mismatch is
    /// fatal under the strict policy; otherwise it is flagged with a warning
    /// and the leading entries are used (a vector shorter than the state
    /// dimension cannot be projected and always fails).
    fn observation_from_truth(&self) -> Result<DVector<T>, FilterError> {
        let ndim = self.settings.state_vector_length;

        let truth = self
            .base_model
            .state_history()
            .last()
            .ok_or(FilterError::MissingObservation { time: self.time })?;

        if truth.len() == ndim {
            return Ok(self.operator.project_state(&truth.as_view()));
        }

        if self.settings.strict_observation_length || truth.len() < ndim {
            return Err(FilterError::ObservationLength {
                time: self.time,
                expected: ndim,
                found: truth.len(),
            });
        }

        warn!(
            "observation at time {} has length {} but expected {}; using the leading entries",
            self.time,
            truth.len(),
            ndim
        );

        Ok(self.operator.project_state(&truth.rows(0, ndim)))
    }
}

impl<M, T> EnsembleKalmanFilter<M, T>
where
    M: ForecastModel<T>,
    T: Copy + RealField,
    StandardNormal: Distribution<T>,
{
    /// Run the filter until the advisory iteration cap is reached.
    pub fn run(&mut self) -> Result<(), FilterError> {
        self.run_with_sink(None::<&mut NullSink>)
    }

    /// Same as [`run`](`EnsembleKalmanFilter::run`), with a reporting sink.
    pub fn run_with_sink<S>(&mut self, mut opt_sink: Option<&mut S>) -> Result<(), FilterError>
    where
        S: AssimilationSink<T>,
    {
        while self.time < self.settings.max_iterations {
            self.step_with_sink(opt_sink.as_deref_mut())?;
        }

        Ok(())
    }

    /// Step the filter forward by one time step.
    pub fn step(&mut self) -> Result<(), FilterError> {
        self.step_with_sink(None::<&mut NullSink>)
    }

    /// Same as [`step`](`EnsembleKalmanFilter::step`), with a reporting sink.
    ///
    /// The sink receives read-only snapshots immediately before and after the
    /// update cycle; predict-only steps invoke neither hook.
    pub fn step_with_sink<S>(&mut self, mut opt_sink: Option<&mut S>) -> Result<(), FilterError>
    where
        S: AssimilationSink<T>,
    {
        self.base_model.advance_one_step();

        self.ensemble.advance().map_err(|source| FilterError::Ensemble {
            time: self.time,
            source,
        })?;

        self.state_mean = self.ensemble.mean();
        self.time += 1;

        if self.time % self.settings.assimilation_period == 0 {
            let data = self.observation_from_truth()?;

            if let Some(sink) = opt_sink.as_deref_mut() {
                sink.on_before_update(&self.snapshot());
            }

            self.update(&data)?;

            self.state_mean = self.ensemble.mean();

            if let Some(sink) = opt_sink.as_deref_mut() {
                sink.on_after_update(&self.snapshot());
            }
        }

        self.state_mean = self.ensemble.mean();
        self.results.push(self.state_mean.clone());

        Ok(())
    }

    /// Apply one assimilation update with the given observation.
    fn update(&mut self, data: &DVector<T>) -> Result<(), FilterError> {
        let start = Instant::now();
        let time = self.time;

        let covariance = ensemble_covariance(self.ensemble.matrix())
            .map_err(|source| FilterError::Covariance { time, source })?;

        let gain = match kalman_gain(&covariance, &self.operator, self.noise.covariance()) {
            Ok(gain) => gain,
            Err(source @ MathError::SingularMatrix { .. })
                if self.settings.singular_policy == SingularUpdatePolicy::Skip =>
            {
                warn!("skipping assimilation cycle at time {time}: {source}");

                return Ok(());
            }
            Err(source) => {
                return Err(FilterError::Gain {
                    time,
                    nstate: self.ensemble.ndim(),
                    nobs: self.operator.nobs(),
                    source,
                });
            }
        };

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.rseed);
        self.rseed += 1;

        let data_ensemble =
            self.noise
                .perturb_ensemble(&data.as_view(), self.ensemble.len(), &mut rng);

        let innovation = data_ensemble - self.operator.project_ensemble(self.ensemble.matrix());

        // The corrected ensemble is written into a freshly owned matrix; the
        // pre-update state is never mutated in place.
        let corrected = self.ensemble.matrix() + &gain * innovation;

        self.ensemble.set_matrix(corrected);
        self.ensemble.sync_to_members();

        debug!(
            "assimilation update at time {}: {} members in {:.2} msec",
            time,
            self.ensemble.len(),
            start.elapsed().as_micros() as f64 / 1e3
        );

        Ok(())
    }
}
