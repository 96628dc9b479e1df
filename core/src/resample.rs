//! Weighted resampling.
//!
//! Every strategy reads one immutable snapshot of the weight vector, produces N ancestor indices,
//! and the new generation is assembled in a fresh buffer before it replaces the old one. The
//! weights do not have to be normalized, but they must be finite and non-negative with at least
//! one positive entry; an all-zero vector is reported as [`FilterError::DegenerateWeights`] rather
//! than being replaced by a uniform distribution.
//!
//! After resampling every particle weight is reset to 1.0 so the next weighting pass starts from
//! a neutral multiplicative baseline.
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::particle::{Particle, ParticleSet, relative_weights};

/// Available resampling schemes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParticleResamplingStrategy {
    /// N independent categorical draws with replacement.
    #[default]
    Multinomial,
    /// One uniform offset, N evenly spaced pointers.
    Systematic,
    /// One uniform draw inside each of N equal strata.
    Stratified,
    /// Deterministic floor(N w) copies, remainder drawn systematically from the residuals.
    Residual,
}
impl ParticleResamplingStrategy {
    /// Ancestor indices for a new generation of `weights.len()` particles.
    pub fn indices<R: Rng + ?Sized>(&self, weights: &[f64], rng: &mut R) -> Result<Vec<usize>> {
        let scaled = validate_weights(weights)?;
        let total: f64 = scaled.iter().sum();
        Ok(match self {
            ParticleResamplingStrategy::Multinomial => multinomial_resample(&scaled, rng)?,
            ParticleResamplingStrategy::Systematic => systematic_resample(&scaled, total, rng),
            ParticleResamplingStrategy::Stratified => stratified_resample(&scaled, total, rng),
            ParticleResamplingStrategy::Residual => residual_resample(&scaled, total, rng),
        })
    }
}

/// Check that `weights` defines a sampling distribution and return it divided by its largest
/// entry.
///
/// The scaled weights lie in `[0, 1]` with at least one equal to 1.0, so their total is finite
/// even when the raw weights sit near `f64::MAX` and positive even when they are subnormal.
pub fn validate_weights(weights: &[f64]) -> Result<Vec<f64>> {
    for (index, &value) in weights.iter().enumerate() {
        if !(value.is_finite() && value >= 0.0) {
            return Err(FilterError::InvalidWeight { index, value });
        }
    }
    if weights.iter().any(|&w| w > 0.0) {
        Ok(relative_weights(weights))
    } else {
        Err(FilterError::DegenerateWeights)
    }
}

/// Draw a new generation for `set` with `strategy`; all weights become 1.0.
///
/// On error `set` is left unchanged.
pub fn resample<R: Rng + ?Sized>(
    set: &mut ParticleSet,
    strategy: ParticleResamplingStrategy,
    rng: &mut R,
) -> Result<()> {
    let indices = strategy.indices(set.weights(), rng)?;
    let next: Vec<Particle> = indices
        .into_iter()
        .map(|i| {
            let mut particle = set.particles()[i].clone();
            particle.weight = 1.0;
            particle
        })
        .collect();
    set.replace(next);
    Ok(())
}

// The strategies below expect weights already checked by `validate_weights`: non-empty, finite,
// non-negative and with a positive total.

/// N independent draws from the categorical distribution defined by `weights`.
fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<Vec<usize>> {
    let dist = WeightedIndex::new(weights).map_err(|_| FilterError::DegenerateWeights)?;
    Ok((0..weights.len()).map(|_| dist.sample(rng)).collect())
}

/// Walk the cumulative weights with sorted pointers in `[0, total)`.
fn select_sorted(weights: &[f64], pointers: impl Iterator<Item = f64>) -> Vec<usize> {
    let last = weights.len() - 1;
    let mut indices = Vec::with_capacity(weights.len());
    let mut i = 0;
    let mut cumsum = weights[0];
    for u in pointers {
        while u >= cumsum && i < last {
            i += 1;
            cumsum += weights[i];
        }
        indices.push(i);
    }
    indices
}

fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let step = total / n as f64;
    let offset = rng.random::<f64>() * step;
    select_sorted(weights, (0..n).map(|j| offset + j as f64 * step))
}

fn stratified_resample<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let step = total / n as f64;
    let pointers: Vec<f64> = (0..n)
        .map(|j| (j as f64 + rng.random::<f64>()) * step)
        .collect();
    select_sorted(weights, pointers.into_iter())
}

fn residual_resample<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; n];
    for (i, &w) in weights.iter().enumerate() {
        let expected = w / total * n as f64;
        let copies = expected.floor() as usize;
        indices.extend(std::iter::repeat_n(i, copies));
        residual[i] = expected - copies as f64;
    }
    // Rounding can hand out one copy too many when the expectations sum just above n.
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        let residual_total: f64 = residual.iter().sum();
        if residual_total > 0.0 {
            let step = residual_total / remaining as f64;
            let offset = rng.random::<f64>() * step;
            indices.extend(select_sorted(
                &residual,
                (0..remaining).map(|j| offset + j as f64 * step),
            ));
        } else {
            let best = indices.last().copied().unwrap_or(0);
            indices.extend(std::iter::repeat_n(best, remaining));
        }
    }
    indices
}
