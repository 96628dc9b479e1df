//! Importance-weight update against a landmark map.
//!
//! For every particle the vehicle-frame observations are moved into the map frame through the
//! particle's pose, associated with the map landmarks visible from that pose, and scored with a
//! bivariate Gaussian sensor model with diagonal covariance:
//!
//! $$
//! p(dx, dy) = \frac{1}{2\pi\sigma_x\sigma_y}
//! \exp\left(-\left(\frac{dx^2}{2\sigma_x^2} + \frac{dy^2}{2\sigma_y^2}\right)\right)
//! $$
//!
//! The particle weight is the product of the densities of all matched pairs. Observations that
//! find no landmark contribute no factor, and a particle with no match at all gets the
//! zero-match weight (0.0 unless configured otherwise). Products that underflow to zero are left
//! as zero, and products that would overflow saturate at `f64::MAX` so every weight stays finite.
use rayon::prelude::*;

use crate::association::associate;
use crate::error::{FilterError, Result, check_positive};
use crate::map::Map;
use crate::particle::{Association, Particle, ParticleSet};
use crate::{LandmarkObs, MapFrame, Vehicle};

/// Bivariate Gaussian density with diagonal covariance `diag(std_x^2, std_y^2)` evaluated at an
/// offset `(dx, dy)` from the mean.
pub fn bivariate_gaussian(dx: f64, dy: f64, std_x: f64, std_y: f64) -> f64 {
    let norm = 1.0 / (2.0 * std::f64::consts::PI * std_x * std_y);
    let exponent = dx.powi(2) / (2.0 * std_x.powi(2)) + dy.powi(2) / (2.0 * std_y.powi(2));
    norm * (-exponent).exp()
}

/// Sensor model and weighting policy for the update stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightEngine {
    landmark_std: [f64; 2],
    sensor_range: f64,
    zero_match_weight: f64,
}
impl WeightEngine {
    /// # Arguments
    /// * `landmark_std` - Observation noise `[sigma_x, sigma_y]` (m), both strictly positive.
    /// * `sensor_range` - Maximum distance (m) from a particle at which a landmark is a candidate.
    pub fn new(landmark_std: [f64; 2], sensor_range: f64) -> Result<Self> {
        check_positive("landmark sigma_x", landmark_std[0])?;
        check_positive("landmark sigma_y", landmark_std[1])?;
        if !(sensor_range.is_finite() && sensor_range >= 0.0) {
            return Err(FilterError::InvalidSensorRange(sensor_range));
        }
        Ok(WeightEngine {
            landmark_std,
            sensor_range,
            zero_match_weight: 0.0,
        })
    }
    /// Weight given to a particle whose observations matched no landmark.
    pub fn with_zero_match_weight(mut self, weight: f64) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(FilterError::InvalidWeight {
                index: 0,
                value: weight,
            });
        }
        self.zero_match_weight = weight;
        Ok(self)
    }
    pub fn landmark_std(&self) -> [f64; 2] {
        self.landmark_std
    }
    pub fn sensor_range(&self) -> f64 {
        self.sensor_range
    }
    pub fn zero_match_weight(&self) -> f64 {
        self.zero_match_weight
    }
    /// Density of observing `obs` when the true landmark sits at `(mu_x, mu_y)`.
    pub fn density(&self, obs: &LandmarkObs<MapFrame>, mu_x: f64, mu_y: f64) -> f64 {
        bivariate_gaussian(
            obs.x - mu_x,
            obs.y - mu_y,
            self.landmark_std[0],
            self.landmark_std[1],
        )
    }
    /// Recompute the weight and association record of a single particle.
    ///
    /// The previous weight and record are discarded first, so the result depends only on the
    /// particle's pose, `observations` and `map`.
    pub fn weigh(&self, particle: &mut Particle, observations: &[LandmarkObs<Vehicle>], map: &Map) {
        let pose = particle.pose();
        let mut in_map: Vec<LandmarkObs<MapFrame>> =
            observations.iter().map(|o| o.to_map_frame(&pose)).collect();
        let candidates = map.within_range(pose.x, pose.y, self.sensor_range);
        let matches = associate(&candidates, &mut in_map);

        let mut weight = 1.0;
        let mut associations = Vec::with_capacity(in_map.len());
        for (obs, matched) in in_map.iter().zip(matches) {
            if let Some(j) = matched {
                let landmark = &candidates[j];
                weight = (weight * self.density(obs, landmark.x, landmark.y)).min(f64::MAX);
                associations.push(Association {
                    landmark_id: landmark.id,
                    sense_x: obs.x,
                    sense_y: obs.y,
                });
            }
        }
        particle.weight = if associations.is_empty() {
            self.zero_match_weight
        } else {
            weight
        };
        particle.set_associations(associations);
    }
    /// Recompute every particle's weight from `observations` (vehicle frame) and `map`.
    ///
    /// Particles are weighed in parallel; the weight vector of `set` is rewritten afterwards.
    pub fn update(&self, set: &mut ParticleSet, observations: &[LandmarkObs<Vehicle>], map: &Map) {
        set.particles_mut()
            .par_iter_mut()
            .for_each(|particle| self.weigh(particle, observations, map));
        set.sync_weights();
        log::debug!(
            "weighted {} particles against {} observations, total weight {:.4e}",
            set.len(),
            observations.len(),
            set.total_weight()
        );
    }
}
