//! Pose estimates extracted from a particle population.
//!
//! The filter itself never commits to a single pose; callers pick a policy here. Headings are
//! averaged on the circle (mean of unit vectors) so that a cloud straddling +/-pi does not
//! collapse to zero.
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::particle::{ParticleSet, relative_weights};
use crate::{Pose, wrap_to_pi};

/// How a single pose is read out of the particle set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStrategy {
    /// Weight-averaged pose. Falls back to the plain mean when the total weight is zero.
    #[default]
    WeightedMean,
    /// Every particle counts the same.
    UnweightedMean,
    /// Pose of the heaviest particle.
    HighestWeight,
}
impl EstimateStrategy {
    /// Pose estimate for `set`, or `None` for an empty set.
    pub fn estimate(&self, set: &ParticleSet) -> Option<Pose> {
        match self {
            EstimateStrategy::WeightedMean => weighted_mean(set),
            EstimateStrategy::UnweightedMean => unweighted_mean(set),
            EstimateStrategy::HighestWeight => set.best().map(|p| p.pose()),
        }
    }
}

fn mean_with(set: &ParticleSet, weight: impl Fn(usize) -> f64) -> Option<Pose> {
    let mut total = 0.0;
    let (mut x, mut y, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0);
    for (i, particle) in set.iter().enumerate() {
        let w = weight(i);
        total += w;
        x += w * particle.x;
        y += w * particle.y;
        sin += w * particle.theta.sin();
        cos += w * particle.theta.cos();
    }
    if total > 0.0 {
        Some(Pose::new(x / total, y / total, sin.atan2(cos)))
    } else {
        None
    }
}

/// Weighted mean pose with a circular mean for the heading.
pub fn weighted_mean(set: &ParticleSet) -> Option<Pose> {
    let weights = relative_weights(set.weights());
    mean_with(set, |i| weights[i]).or_else(|| {
        if !set.is_empty() {
            log::debug!("total particle weight is zero, reporting the unweighted mean");
        }
        unweighted_mean(set)
    })
}

/// Plain mean pose with a circular mean for the heading.
pub fn unweighted_mean(set: &ParticleSet) -> Option<Pose> {
    mean_with(set, |_| 1.0)
}

/// Weighted 3x3 covariance of `(x, y, theta)` about the weighted mean.
///
/// Heading deviations are wrapped to `[-pi, pi]` before they enter the outer products. Returns
/// `None` for an empty set; zero total weight falls back to equal weights.
pub fn spread(set: &ParticleSet) -> Option<Matrix3<f64>> {
    let mean = weighted_mean(set)?;
    let weights = relative_weights(set.weights());
    let total: f64 = weights.iter().sum();
    let uniform = total <= 0.0;
    let norm = if uniform { set.len() as f64 } else { total };
    let mut cov = Matrix3::zeros();
    for (particle, &w) in set.iter().zip(&weights) {
        let w = if uniform { 1.0 } else { w };
        let d = Vector3::new(
            particle.x - mean.x,
            particle.y - mean.y,
            wrap_to_pi(particle.theta - mean.theta),
        );
        cov += w * d * d.transpose();
    }
    Some(cov / norm)
}
