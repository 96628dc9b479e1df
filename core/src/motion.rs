//! Velocity / yaw-rate motion model for the prediction stage.
//!
//! Each particle is advanced by the commanded forward velocity `v` and yaw rate `w` over `dt`
//! using exact arc integration of the unicycle model:
//!
//! $$
//! x' = x + \frac{v}{w}\left(\sin(\theta + w\,dt) - \sin\theta\right), \quad
//! y' = y + \frac{v}{w}\left(\cos\theta - \cos(\theta + w\,dt)\right), \quad
//! \theta' = \theta + w\,dt
//! $$
//!
//! When `|w|` is below [`YAW_RATE_EPSILON`] the straight-line limit is used instead, which keeps
//! the two branches continuous. Independent Gaussian process noise is then added to x, y and
//! theta of every particle.
use rand::Rng;
use rand_distr::Distribution;
use rayon::prelude::*;

use crate::Pose;
use crate::error::{FilterError, Result, check_non_negative};
use crate::particle::{ParticleSet, gaussian};

/// Yaw rates with magnitude below this value use the straight-line branch.
pub const YAW_RATE_EPSILON: f64 = 1e-5;

/// Noise-free pose after driving at `velocity` with `yaw_rate` for `dt` seconds.
///
/// # Example
/// ```rust
/// use mcl::Pose;
/// use mcl::motion::propagate;
///
/// let next = propagate(&Pose::new(0.0, 0.0, 0.0), 1.0, 1.0, 0.0);
/// assert_eq!(next, Pose::new(1.0, 0.0, 0.0));
/// ```
pub fn propagate(pose: &Pose, dt: f64, velocity: f64, yaw_rate: f64) -> Pose {
    if yaw_rate.abs() < YAW_RATE_EPSILON {
        Pose::new(
            pose.x + velocity * dt * pose.theta.cos(),
            pose.y + velocity * dt * pose.theta.sin(),
            pose.theta,
        )
    } else {
        let theta = pose.theta + yaw_rate * dt;
        Pose::new(
            pose.x + velocity / yaw_rate * (theta.sin() - pose.theta.sin()),
            pose.y + velocity / yaw_rate * (pose.theta.cos() - theta.cos()),
            theta,
        )
    }
}

/// Motion model with fixed process-noise standard deviations `[sigma_x, sigma_y, sigma_theta]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionModel {
    process_std: [f64; 3],
}
impl MotionModel {
    /// Zero standard deviations are allowed and give noise-free prediction.
    pub fn new(process_std: [f64; 3]) -> Result<Self> {
        check_non_negative("process sigma_x", process_std[0])?;
        check_non_negative("process sigma_y", process_std[1])?;
        check_non_negative("process sigma_theta", process_std[2])?;
        Ok(MotionModel { process_std })
    }
    pub fn process_std(&self) -> [f64; 3] {
        self.process_std
    }
    /// Advance every particle in `set` and add process noise.
    ///
    /// Noise is drawn from `rng` sequentially, particle by particle and axis by axis, before the
    /// kinematics run in parallel. The result for a given seed therefore does not depend on the
    /// number of worker threads. Weights and association records are left untouched.
    ///
    /// # Arguments
    /// * `set` - Particles to advance.
    /// * `dt` - Elapsed time (s), must be positive.
    /// * `velocity` - Commanded forward velocity (m/s).
    /// * `yaw_rate` - Commanded yaw rate (rad/s).
    /// * `rng` - The filter's random source.
    pub fn predict<R: Rng + ?Sized>(
        &self,
        set: &mut ParticleSet,
        dt: f64,
        velocity: f64,
        yaw_rate: f64,
        rng: &mut R,
    ) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(FilterError::InvalidTimeStep(dt));
        }
        let noise_x = gaussian(0.0, self.process_std[0], "process sigma_x")?;
        let noise_y = gaussian(0.0, self.process_std[1], "process sigma_y")?;
        let noise_theta = gaussian(0.0, self.process_std[2], "process sigma_theta")?;
        let noise: Vec<[f64; 3]> = (0..set.len())
            .map(|_| {
                [
                    noise_x.sample(rng),
                    noise_y.sample(rng),
                    noise_theta.sample(rng),
                ]
            })
            .collect();

        set.particles_mut()
            .par_iter_mut()
            .zip(noise.par_iter())
            .for_each(|(particle, n)| {
                let next = propagate(&particle.pose(), dt, velocity, yaw_rate);
                particle.set_pose(Pose::new(next.x + n[0], next.y + n[1], next.theta + n[2]));
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn uniform_set(pose: Pose, n: usize) -> ParticleSet {
        ParticleSet::from_particles((0..n).map(|i| Particle::new(i, pose, 1.0)).collect())
    }

    #[test]
    fn test_straight_line_unit_step() {
        let next = propagate(&Pose::new(0.0, 0.0, 0.0), 1.0, 1.0, 0.0);
        assert_eq!(next, Pose::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_straight_line_follows_heading() {
        let next = propagate(&Pose::new(1.0, 1.0, FRAC_PI_2), 2.0, 3.0, 0.0);
        assert_approx_eq!(next.x, 1.0, 1e-12);
        assert_approx_eq!(next.y, 7.0, 1e-12);
        assert_eq!(next.theta, FRAC_PI_2);
    }

    #[test]
    fn test_arc_half_circle() {
        // v = pi, w = pi for 1 s traces a half circle of radius 1 to the left.
        let next = propagate(&Pose::new(0.0, 0.0, 0.0), 1.0, PI, PI);
        assert_approx_eq!(next.x, 0.0, 1e-12);
        assert_approx_eq!(next.y, 2.0, 1e-12);
        assert_approx_eq!(next.theta, PI, 1e-12);
    }

    #[test]
    fn test_branches_are_continuous() {
        let start = Pose::new(2.0, -1.0, 0.7);
        let straight = propagate(&start, 0.1, 1.0, 0.0);
        let arc = propagate(&start, 0.1, 1.0, YAW_RATE_EPSILON);
        assert_approx_eq!(straight.x, arc.x, 1e-6);
        assert_approx_eq!(straight.y, arc.y, 1e-6);
        assert_approx_eq!(straight.theta, arc.theta, 1e-6);
    }

    #[test]
    fn test_predict_without_noise_is_exact() {
        let model = MotionModel::new([0.0, 0.0, 0.0]).unwrap();
        let mut set = uniform_set(Pose::default(), 10);
        let mut rng = StdRng::seed_from_u64(1);
        model.predict(&mut set, 1.0, 1.0, 0.0, &mut rng).unwrap();
        for particle in set.iter() {
            assert_eq!(particle.pose(), Pose::new(1.0, 0.0, 0.0));
            assert_eq!(particle.weight, 1.0);
        }
    }

    #[test]
    fn test_predict_noise_statistics() {
        let model = MotionModel::new([0.3, 0.3, 0.01]).unwrap();
        let n = 10_000;
        let mut set = uniform_set(Pose::default(), n);
        let mut rng = StdRng::seed_from_u64(99);
        model.predict(&mut set, 0.1, 10.0, 0.0, &mut rng).unwrap();
        let mean_x = set.iter().map(|p| p.x).sum::<f64>() / n as f64;
        let var_x = set.iter().map(|p| (p.x - mean_x).powi(2)).sum::<f64>() / n as f64;
        let mean_t = set.iter().map(|p| p.theta).sum::<f64>() / n as f64;
        assert_approx_eq!(mean_x, 1.0, 0.02);
        assert_approx_eq!(var_x, 0.09, 0.01);
        assert_approx_eq!(mean_t, 0.0, 0.001);
    }

    #[test]
    fn test_predict_is_reproducible_for_a_seed() {
        let model = MotionModel::new([0.2, 0.2, 0.05]).unwrap();
        let mut a = uniform_set(Pose::new(1.0, 2.0, 0.3), 64);
        let mut b = a.clone();
        model
            .predict(&mut a, 0.1, 5.0, 0.2, &mut StdRng::seed_from_u64(11))
            .unwrap();
        model
            .predict(&mut b, 0.1, 5.0, 0.2, &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert_eq!(a.particles(), b.particles());
    }

    #[test]
    fn test_predict_rejects_bad_time_step() {
        let model = MotionModel::new([0.1, 0.1, 0.1]).unwrap();
        let mut set = uniform_set(Pose::default(), 2);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            model.predict(&mut set, 0.0, 1.0, 0.0, &mut rng),
            Err(FilterError::InvalidTimeStep(0.0))
        );
        assert!(model.predict(&mut set, f64::NAN, 1.0, 0.0, &mut rng).is_err());
    }

    #[test]
    fn test_negative_process_noise_rejected() {
        assert!(matches!(
            MotionModel::new([0.1, 0.1, -0.1]),
            Err(FilterError::InvalidStdDev {
                name: "process sigma_theta",
                ..
            })
        ));
    }
}
