//! Particle filter session.
//!
//! [`ParticleFilter`] owns one [`ParticleSet`] together with the single seeded random source that
//! every sampling step draws from, and sequences the stages of a localization cycle:
//!
//! 1. [`ParticleFilter::predict`] advances every particle with the commanded controls and adds
//!    process noise.
//! 2. [`ParticleFilter::update_weights`] re-weights every particle against a fresh batch of
//!    vehicle-frame landmark observations and the static map.
//! 3. [`ParticleFilter::resample`] (or [`ParticleFilter::resample_if_needed`]) draws a new
//!    generation proportional to weight.
//!
//! A filter can only be obtained through initialization, so the stages never run on an empty
//! population. The pose estimate is left to the caller; see [`crate::estimate`].
use std::fmt::{self, Display};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::estimate::EstimateStrategy;
use crate::map::Map;
use crate::motion::MotionModel;
use crate::particle::{Axis, Particle, ParticleSet, associations_string, sense_coord_string};
use crate::resample::{ParticleResamplingStrategy, resample};
use crate::weights::WeightEngine;
use crate::{LandmarkObs, Pose, Vehicle};

#[derive(Clone, Debug)]
pub struct ParticleFilter {
    particles: ParticleSet,
    motion: MotionModel,
    sensor: WeightEngine,
    init_std: [f64; 3],
    resampling_strategy: ParticleResamplingStrategy,
    resample_threshold: Option<f64>,
    seed: u64,
    rng: StdRng,
}
impl Display for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weights = self.particles.weights();
        let min_weight = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max_weight = weights.iter().copied().fold(0.0, f64::max);
        let mean = EstimateStrategy::WeightedMean.estimate(&self.particles);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("mean_pose", &mean)
            .field("resampling_strategy", &self.resampling_strategy)
            .field("seed", &self.seed)
            .finish()
    }
}
impl ParticleFilter {
    /// Initialize a filter around `initial_pose`.
    ///
    /// The configuration is validated first; no particle is created if it is invalid. The random
    /// source is seeded from `config.seed`, or from one random draw when it is `None`.
    ///
    /// # Arguments
    /// * `config` - Particle count, noise levels and resampling policy.
    /// * `initial_pose` - Mean of the Gaussian prior (typically a coarse GPS fix).
    ///
    /// # Example
    /// ```rust
    /// use mcl::config::FilterConfig;
    /// use mcl::{ParticleFilter, Pose};
    ///
    /// let config = FilterConfig { num_particles: 10, seed: Some(1), ..Default::default() };
    /// let filter = ParticleFilter::new(&config, Pose::new(1.0, 2.0, 0.0)).unwrap();
    /// assert_eq!(filter.particles().len(), 10);
    /// ```
    pub fn new(config: &FilterConfig, initial_pose: Pose) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = ParticleSet::from_gaussian(
            initial_pose,
            config.init_std,
            config.num_particles,
            &mut rng,
        )?;
        let sensor = WeightEngine::new(config.landmark_std, config.sensor_range)?
            .with_zero_match_weight(config.zero_match_weight)?;
        log::debug!(
            "initialized {} particles around {} (seed {})",
            particles.len(),
            initial_pose,
            seed
        );
        Ok(ParticleFilter {
            particles,
            motion: MotionModel::new(config.process_std)?,
            sensor,
            init_std: config.init_std,
            resampling_strategy: config.resampling_strategy,
            resample_threshold: config.resample_threshold,
            seed,
            rng,
        })
    }
    /// True once the population has been sampled, which every constructed filter has.
    pub fn is_initialized(&self) -> bool {
        !self.particles.is_empty()
    }
    /// Discard the population and sample a fresh prior around `pose` with the same generator.
    pub fn reinitialize(&mut self, pose: Pose) -> Result<()> {
        self.particles =
            ParticleSet::from_gaussian(pose, self.init_std, self.particles.len(), &mut self.rng)?;
        log::debug!("reinitialized {} particles around {}", self.particles.len(), pose);
        Ok(())
    }
    /// Seed of the filter's random source.
    pub fn seed(&self) -> u64 {
        self.seed
    }
    /// Advance every particle by `velocity` (m/s) and `yaw_rate` (rad/s) over `dt` seconds using
    /// the configured process noise.
    pub fn predict(&mut self, dt: f64, velocity: f64, yaw_rate: f64) -> Result<()> {
        self.motion
            .predict(&mut self.particles, dt, velocity, yaw_rate, &mut self.rng)
    }
    /// Like [`ParticleFilter::predict`] with process noise `std_pos` for this step only.
    pub fn predict_with_noise(
        &mut self,
        dt: f64,
        std_pos: [f64; 3],
        velocity: f64,
        yaw_rate: f64,
    ) -> Result<()> {
        let motion = MotionModel::new(std_pos)?;
        motion.predict(&mut self.particles, dt, velocity, yaw_rate, &mut self.rng)
    }
    /// Recompute every weight from `observations` (vehicle frame) and `map`.
    ///
    /// Weights and association records from the previous cycle are discarded, so the result
    /// depends only on the current poses and this batch.
    pub fn update_weights(&mut self, observations: &[LandmarkObs<Vehicle>], map: &Map) {
        self.sensor.update(&mut self.particles, observations, map);
    }
    /// Draw a new generation with the configured strategy; all weights become 1.0.
    ///
    /// Fails with [`FilterError::DegenerateWeights`] when every weight is zero, in which case the
    /// population is left as it was.
    pub fn resample(&mut self) -> Result<()> {
        let ess = self.particles.effective_sample_size();
        resample(&mut self.particles, self.resampling_strategy, &mut self.rng)?;
        log::debug!(
            "resampled {} particles ({:?}, ESS before {:.1})",
            self.particles.len(),
            self.resampling_strategy,
            ess
        );
        Ok(())
    }
    /// Resample only when the effective sample size drops below `threshold * N`.
    ///
    /// # Returns
    /// Whether a resample took place.
    pub fn resample_if_needed(&mut self, threshold: f64) -> Result<bool> {
        let n = self.particles.len() as f64;
        if self.particles.effective_sample_size() < threshold * n {
            self.resample()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
    /// One full cycle: predict, weigh, then resample according to the configured threshold
    /// (every cycle when none is set).
    ///
    /// # Returns
    /// Whether a resample took place.
    pub fn step(
        &mut self,
        dt: f64,
        velocity: f64,
        yaw_rate: f64,
        observations: &[LandmarkObs<Vehicle>],
        map: &Map,
    ) -> Result<bool> {
        self.predict(dt, velocity, yaw_rate)?;
        self.update_weights(observations, map);
        match self.resample_threshold {
            Some(threshold) => self.resample_if_needed(threshold),
            None => self.resample().map(|_| true),
        }
    }
    pub fn particles(&self) -> &[Particle] {
        self.particles.particles()
    }
    pub fn weights(&self) -> &[f64] {
        self.particles.weights()
    }
    pub fn particle_set(&self) -> &ParticleSet {
        &self.particles
    }
    pub fn effective_sample_size(&self) -> f64 {
        self.particles.effective_sample_size()
    }
    pub fn best_particle(&self) -> Option<&Particle> {
        self.particles.best()
    }
    /// Pose estimate under the caller's chosen policy.
    pub fn estimate(&self, strategy: EstimateStrategy) -> Option<Pose> {
        strategy.estimate(&self.particles)
    }
    /// Landmark ids recorded for `particle` in the last weighting pass, space separated.
    pub fn get_associations(&self, particle: &Particle) -> String {
        associations_string(particle)
    }
    /// Map-frame sense coordinates recorded for `particle` along `axis`, space separated.
    pub fn get_sense_coord(&self, particle: &Particle, axis: Axis) -> String {
        sense_coord_string(particle, axis)
    }
}

/// Resampling failures the simulator tolerates by keeping the current generation.
pub fn is_recoverable(err: &FilterError) -> bool {
    matches!(err, FilterError::DegenerateWeights)
}
