//! Particle population and diagnostic accessors.
//!
//! A [`ParticleSet`] owns N pose hypotheses together with a parallel weight vector. The stages in
//! [`crate::motion`], [`crate::weights`] and [`crate::resample`] mutate the set in place and leave
//! `weights()[i] == particles()[i].weight` true whenever they return.
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt::{self, Display};

use crate::error::{FilterError, Result, check_non_negative};
use crate::{LandmarkId, Pose};

/// A matched landmark recorded during the last weighting pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Association {
    pub landmark_id: LandmarkId,
    /// Observation x in the map frame (m)
    pub sense_x: f64,
    /// Observation y in the map frame (m)
    pub sense_y: f64,
}

/// A single weighted pose hypothesis.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub weight: f64,
    pub associations: Vec<Association>,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("theta", &self.theta)
            .field("weight", &self.weight)
            .field("associations", &self.associations.len())
            .finish()
    }
}
impl Particle {
    pub fn new(id: usize, pose: Pose, weight: f64) -> Particle {
        Particle {
            id,
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            weight,
            associations: Vec::new(),
        }
    }
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.theta)
    }
    pub fn set_pose(&mut self, pose: Pose) {
        self.x = pose.x;
        self.y = pose.y;
        self.theta = pose.theta;
    }
    /// Replace the association record with `associations`.
    pub fn set_associations(&mut self, associations: Vec<Association>) {
        self.associations = associations;
    }
}

/// Selects which recorded sense coordinate [`sense_coord_string`] renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

fn join_space_separated<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Recorded landmark ids of `particle`, space separated, in association order.
///
/// ```rust
/// use mcl::particle::{Association, Particle, associations_string};
/// use mcl::Pose;
///
/// let mut particle = Particle::new(0, Pose::default(), 1.0);
/// particle.set_associations(vec![
///     Association { landmark_id: 4, sense_x: 1.0, sense_y: 2.0 },
///     Association { landmark_id: 9, sense_x: 3.5, sense_y: -1.0 },
/// ]);
/// assert_eq!(associations_string(&particle), "4 9");
/// ```
pub fn associations_string(particle: &Particle) -> String {
    join_space_separated(particle.associations.iter().map(|a| a.landmark_id))
}

/// Recorded sense-x or sense-y coordinates of `particle`, space separated, in association order.
pub fn sense_coord_string(particle: &Particle, axis: Axis) -> String {
    match axis {
        Axis::X => join_space_separated(particle.associations.iter().map(|a| a.sense_x)),
        Axis::Y => join_space_separated(particle.associations.iter().map(|a| a.sense_y)),
    }
}

/// Fixed-size population of particles with a parallel weight vector.
#[derive(Clone, Debug, Default)]
pub struct ParticleSet {
    particles: Vec<Particle>,
    weights: Vec<f64>,
}
impl ParticleSet {
    /// Sample `num_particles` poses independently from a Gaussian prior around `seed`.
    ///
    /// Each axis is drawn from `Normal(seed, std_dev)`; a zero standard deviation places every
    /// particle exactly on that axis of the seed. All weights start at 1.0.
    ///
    /// # Arguments
    /// * `seed` - Mean of the prior.
    /// * `std_dev` - Standard deviations `[sigma_x, sigma_y, sigma_theta]`.
    /// * `num_particles` - Population size N, must be positive.
    /// * `rng` - The filter's random source.
    pub fn from_gaussian<R: Rng + ?Sized>(
        seed: Pose,
        std_dev: [f64; 3],
        num_particles: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if num_particles == 0 {
            return Err(FilterError::InvalidParticleCount);
        }
        check_non_negative("init sigma_x", std_dev[0])?;
        check_non_negative("init sigma_y", std_dev[1])?;
        check_non_negative("init sigma_theta", std_dev[2])?;
        let dist_x = gaussian(seed.x, std_dev[0], "init sigma_x")?;
        let dist_y = gaussian(seed.y, std_dev[1], "init sigma_y")?;
        let dist_theta = gaussian(seed.theta, std_dev[2], "init sigma_theta")?;

        let particles: Vec<Particle> = (0..num_particles)
            .map(|id| {
                let pose = Pose::new(
                    dist_x.sample(rng),
                    dist_y.sample(rng),
                    dist_theta.sample(rng),
                );
                Particle::new(id, pose, 1.0)
            })
            .collect();
        Ok(ParticleSet::from_particles(particles))
    }
    /// Build a set from explicit particles; the weight vector is taken from the particles.
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        let weights = particles.iter().map(|p| p.weight).collect();
        ParticleSet { particles, weights }
    }
    pub fn len(&self) -> usize {
        self.particles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }
    /// Mutable access for the stages. Callers must finish with [`ParticleSet::sync_weights`].
    pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }
    /// Rewrite the weight vector from the particles.
    pub(crate) fn sync_weights(&mut self) {
        self.weights.clear();
        self.weights.extend(self.particles.iter().map(|p| p.weight));
    }
    /// Swap in a complete new generation at once.
    pub(crate) fn replace(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
        self.sync_weights();
    }
    /// Overwrite every weight from `weights`.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.particles.len() {
            return Err(FilterError::SizeMismatch {
                expected: self.particles.len(),
                actual: weights.len(),
            });
        }
        for (particle, &w) in self.particles.iter_mut().zip(weights.iter()) {
            particle.weight = w;
        }
        self.sync_weights();
        Ok(())
    }
    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
    /// Effective sample size, `(sum w)^2 / sum w^2`; 0 when every weight is zero.
    ///
    /// Evaluated on the weights relative to the largest one, so it stays finite for weights near
    /// `f64::MAX`.
    pub fn effective_sample_size(&self) -> f64 {
        let weights = relative_weights(&self.weights);
        let sum: f64 = weights.iter().sum();
        let sum_of_squares: f64 = weights.iter().map(|w| w * w).sum();
        if sum_of_squares > 0.0 {
            sum * sum / sum_of_squares
        } else {
            0.0
        }
    }
    /// The particle with the largest weight (first one on ties).
    pub fn best(&self) -> Option<&Particle> {
        self.particles.iter().reduce(|best, p| {
            if p.weight > best.weight { p } else { best }
        })
    }
}

/// `weights` divided by their largest entry, so the result lies in `[0, 1]` and sums to at most
/// `weights.len()`. Returned unchanged when no entry is positive.
pub fn relative_weights(weights: &[f64]) -> Vec<f64> {
    let max = weights.iter().copied().fold(0.0, f64::max);
    if max > 0.0 && max.is_finite() {
        weights.iter().map(|w| w / max).collect()
    } else {
        weights.to_vec()
    }
}

/// Gaussian with the given mean and standard deviation, mapping construction errors to
/// [`FilterError::InvalidStdDev`].
pub(crate) fn gaussian(mean: f64, std_dev: f64, name: &'static str) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|_| FilterError::InvalidStdDev {
        name,
        value: std_dev,
    })
}
