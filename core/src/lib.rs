//! Landmark-based Monte-Carlo localization
//!
//! This crate estimates the planar pose (x, y, heading) of a mobile agent by fusing noisy motion
//! commands with noisy landmark observations against a known, static map. The estimator is a
//! particle filter: a population of weighted pose hypotheses that is propagated through a motion
//! model, re-weighted against each batch of observations, and resampled in proportion to weight.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): rigid transforms between the vehicle and map frames and the pose covariance.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): the single seeded random source and the Gaussian noise models.
//! - [`rayon`](https://crates.io/crates/rayon): per-particle parallelism in the prediction and weighting stages.
//!
//! ## Crate overview
//!
//! - [particle]: the particle population, its weight vector and the diagnostic accessors.
//! - [motion]: the velocity / yaw-rate motion model used for prediction.
//! - [association]: greedy nearest-neighbor data association.
//! - [weights]: the importance-weight update with a bivariate Gaussian sensor model.
//! - [resample]: weighted resampling strategies.
//! - [filter]: the [`filter::ParticleFilter`] session object that owns the particles and the random source.
//! - [estimate]: pose-estimate policies (weighted mean, best particle, ...) applied by callers.
//! - [map]: landmark maps and their CSV representation.
//! - [config]: serde configuration for filters and simulations.
//! - [sim]: a synthetic scenario generator and closed-loop runner.
//!
//! ## Frames
//!
//! Two planar frames appear throughout. The *map* frame is the fixed frame of the landmark map and
//! of every particle pose. The *vehicle* frame is attached to the agent: x forward, y to the left.
//! Sensor observations arrive in the vehicle frame and are moved into the map frame through a
//! particle's pose:
//!
//! $$
//! \begin{bmatrix} x_m \\ y_m \end{bmatrix} =
//! \begin{bmatrix} x_p \\ y_p \end{bmatrix} +
//! \begin{bmatrix} \cos\theta & -\sin\theta \\ \sin\theta & \cos\theta \end{bmatrix}
//! \begin{bmatrix} x_v \\ y_v \end{bmatrix}
//! $$
//!
//! The frame of a [`LandmarkObs`] is part of its type, so a vehicle-frame observation cannot be
//! handed to code that expects map-frame coordinates.
pub mod association;
pub mod config;
pub mod error;
pub mod estimate;
pub mod filter;
pub mod map;
pub mod motion;
pub mod particle;
pub mod resample;
pub mod sim;
pub mod weights;

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;

pub use error::FilterError;
pub use filter::ParticleFilter;
pub use map::{Landmark, Map};
pub use particle::{Particle, ParticleSet};

/// Identifier of a landmark in the map.
pub type LandmarkId = i32;

/// Planar pose in the map frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// x position (m)
    pub x: f64,
    /// y position (m)
    pub y: f64,
    /// heading (rad), counter-clockwise from the map x axis
    pub theta: f64,
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3} rad)", self.x, self.y, self.theta)
    }
}
impl From<[f64; 3]> for Pose {
    fn from(values: [f64; 3]) -> Self {
        Pose::new(values[0], values[1], values[2])
    }
}
impl From<Pose> for [f64; 3] {
    fn from(pose: Pose) -> Self {
        [pose.x, pose.y, pose.theta]
    }
}
impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }
    /// Rigid transform taking vehicle-frame points into the map frame.
    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.theta)
    }
    /// Euclidean distance from this pose's position to the point (x, y).
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        nalgebra::distance(&Point2::new(self.x, self.y), &Point2::new(x, y))
    }
}

/// Marker trait for the coordinate frame an observation is expressed in.
pub trait Frame: Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    const NAME: &'static str;
}
/// Vehicle-relative frame: x forward, y left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Vehicle;
impl Frame for Vehicle {
    const NAME: &'static str = "vehicle";
}
/// Fixed frame of the landmark map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapFrame;
impl Frame for MapFrame {
    const NAME: &'static str = "map";
}

/// A single landmark observation in frame `F`.
///
/// `id` is `None` until data association assigns the id of the matched map landmark; it stays
/// `None` when no candidate landmark was available.
#[derive(Clone, Copy, PartialEq)]
pub struct LandmarkObs<F: Frame> {
    pub id: Option<LandmarkId>,
    pub x: f64,
    pub y: f64,
    frame: PhantomData<F>,
}
impl<F: Frame> Debug for LandmarkObs<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LandmarkObs")
            .field("frame", &F::NAME)
            .field("id", &self.id)
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}
impl<F: Frame> LandmarkObs<F> {
    /// Create an unassociated observation.
    pub fn new(x: f64, y: f64) -> Self {
        LandmarkObs {
            id: None,
            x,
            y,
            frame: PhantomData,
        }
    }
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}
impl LandmarkObs<Vehicle> {
    /// Move this observation into the map frame as seen from `pose` (rotate, then translate).
    ///
    /// The resulting observation is unassociated regardless of `self.id`.
    pub fn to_map_frame(&self, pose: &Pose) -> LandmarkObs<MapFrame> {
        let p = pose.isometry() * self.point();
        LandmarkObs::new(p.x, p.y)
    }
}
impl LandmarkObs<MapFrame> {
    /// Express this map-frame point relative to a vehicle at `pose`; the inverse of
    /// [`LandmarkObs::to_map_frame`].
    pub fn to_vehicle_frame(&self, pose: &Pose) -> LandmarkObs<Vehicle> {
        let p = pose.isometry().inverse_transform_point(&self.point());
        LandmarkObs::new(p.x, p.y)
    }
}

/// Wrap an angle to the range -π to π radians
///
/// # Example
/// ```rust
/// use mcl::wrap_to_pi;
/// use std::f64::consts::PI;
/// let wrapped = wrap_to_pi(3.0 * PI / 2.0);
/// assert!((wrapped + PI / 2.0).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle;
    while wrapped > std::f64::consts::PI {
        wrapped -= 2.0 * std::f64::consts::PI;
    }
    while wrapped < -std::f64::consts::PI {
        wrapped += 2.0 * std::f64::consts::PI;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_wrap_to_pi() {
        assert_approx_eq!(wrap_to_pi(3.0 * PI), PI, 1e-12);
        assert_approx_eq!(wrap_to_pi(-3.0 * FRAC_PI_2), FRAC_PI_2, 1e-12);
        assert_eq!(wrap_to_pi(0.25), 0.25);
    }

    #[test]
    fn test_observation_to_map_frame_identity() {
        let obs = LandmarkObs::<Vehicle>::new(2.0, -1.0);
        let mapped = obs.to_map_frame(&Pose::default());
        assert_approx_eq!(mapped.x, 2.0, 1e-12);
        assert_approx_eq!(mapped.y, -1.0, 1e-12);
        assert_eq!(mapped.id, None);
    }

    #[test]
    fn test_observation_to_map_frame_rotation_and_translation() {
        // Facing +y, a landmark 2 m ahead and 1 m to the left sits at (4 - 1, 5 + 2).
        let pose = Pose::new(4.0, 5.0, FRAC_PI_2);
        let mapped = LandmarkObs::<Vehicle>::new(2.0, 1.0).to_map_frame(&pose);
        assert_approx_eq!(mapped.x, 3.0, 1e-12);
        assert_approx_eq!(mapped.y, 7.0, 1e-12);
    }

    #[test]
    fn test_observation_transform_preserves_range() {
        let pose = Pose::new(-3.0, 8.0, 2.3);
        let obs = LandmarkObs::<Vehicle>::new(6.0, -2.5);
        let mapped = obs.to_map_frame(&pose);
        let range = (obs.x.powi(2) + obs.y.powi(2)).sqrt();
        assert_approx_eq!(pose.distance_to(mapped.x, mapped.y), range, 1e-9);
    }

    #[test]
    fn test_vehicle_frame_is_inverse_of_map_frame() {
        let pose = Pose::new(1.5, -2.0, -0.8);
        let obs = LandmarkObs::<Vehicle>::new(3.0, 4.0);
        let back = obs.to_map_frame(&pose).to_vehicle_frame(&pose);
        assert_approx_eq!(back.x, 3.0, 1e-12);
        assert_approx_eq!(back.y, 4.0, 1e-12);
    }

    #[test]
    fn test_pose_array_conversion() {
        let pose = Pose::from([1.0, 2.0, 0.5]);
        let values: [f64; 3] = pose.into();
        assert_eq!(values, [1.0, 2.0, 0.5]);
        assert_eq!(format!("{}", pose), "(1.000, 2.000, 0.500 rad)");
    }
}
