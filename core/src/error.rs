//! Error type shared by every stage of the filter.
use thiserror::Error;

/// Errors raised by filter construction and by the per-cycle stages.
///
/// Configuration problems (`InvalidParticleCount`, `InvalidStdDev`, `InvalidTimeStep`,
/// `InvalidSensorRange`) are reported before any particle is touched. `DegenerateWeights` is the
/// resampling failure for a weight vector with no positive mass; it is deliberately distinct so
/// callers can decide whether to skip the resample or reinitialize.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("number of particles must be positive")]
    InvalidParticleCount,

    #[error("standard deviation `{name}` is invalid: {value}")]
    InvalidStdDev { name: &'static str, value: f64 },

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("sensor range must be non-negative and finite, got {0}")]
    InvalidSensorRange(f64),

    #[error("weight of particle {index} is invalid: {value}")]
    InvalidWeight { index: usize, value: f64 },

    #[error("all particle weights are zero; cannot define a sampling distribution")]
    DegenerateWeights,

    #[error("expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Check a standard deviation that may be zero (deterministic) but not negative or non-finite.
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}

/// Check a standard deviation that must be strictly positive.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}
