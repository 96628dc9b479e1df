//! Synthetic closed-loop scenarios.
//!
//! A scenario drives a ground-truth vehicle along a constant velocity / yaw-rate arc through a
//! landmark map. Every step the filter receives the controls corrupted by noise and a batch of
//! noisy vehicle-frame observations of the landmarks within sensor range of the true pose, then
//! predicts, re-weights and resamples. The per-step comparison between the truth and the filter's
//! estimate is collected as [`StepRecord`] rows.
//!
//! The scenario uses its own random source (seeded from [`SimulationConfig::seed`]) so the
//! ground-truth noise does not share a stream with the filter.
use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::filter::{ParticleFilter, is_recoverable};
use crate::map::{Landmark, Map};
use crate::motion::propagate;
use crate::particle::{associations_string, gaussian};
use crate::{LandmarkId, LandmarkObs, MapFrame, Pose, Vehicle, wrap_to_pi};

/// One row of simulation output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// Elapsed time (s)
    pub time: f64,
    pub true_x: f64,
    pub true_y: f64,
    pub true_theta: f64,
    pub est_x: f64,
    pub est_y: f64,
    pub est_theta: f64,
    /// Distance between the true and estimated positions (m)
    pub position_error: f64,
    /// Wrapped heading difference, estimate minus truth (rad)
    pub heading_error: f64,
    /// Effective sample size after weighting
    pub ess: f64,
    pub observations: usize,
    pub resampled: bool,
    /// Landmark ids associated by the best particle, space separated
    pub associations: String,
}
impl StepRecord {
    fn new(step: usize, time: f64, truth: &Pose, estimate: &Pose) -> Self {
        StepRecord {
            step,
            time,
            true_x: truth.x,
            true_y: truth.y,
            true_theta: truth.theta,
            est_x: estimate.x,
            est_y: estimate.y,
            est_theta: estimate.theta,
            position_error: estimate.distance_to(truth.x, truth.y),
            heading_error: wrap_to_pi(estimate.theta - truth.theta),
            ess: 0.0,
            observations: 0,
            resampled: false,
            associations: String::new(),
        }
    }
    /// Reads a CSV file written by [`StepRecord::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<Self>, Box<dyn Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }
    /// Writes `records` to a CSV file with a header row.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Aggregate error statistics of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub steps: usize,
    pub rmse_position: f64,
    pub max_position_error: f64,
    pub final_position_error: f64,
    pub rmse_heading: f64,
    pub resamples: usize,
}
impl Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} steps, position RMSE {:.3} m (max {:.3} m, final {:.3} m), heading RMSE {:.4} rad, {} resamples",
            self.steps,
            self.rmse_position,
            self.max_position_error,
            self.final_position_error,
            self.rmse_heading,
            self.resamples
        )
    }
}
impl Summary {
    pub fn from_records(records: &[StepRecord]) -> Self {
        if records.is_empty() {
            return Summary::default();
        }
        let n = records.len() as f64;
        Summary {
            steps: records.len(),
            rmse_position: (records.iter().map(|r| r.position_error.powi(2)).sum::<f64>() / n)
                .sqrt(),
            max_position_error: records
                .iter()
                .map(|r| r.position_error)
                .fold(0.0, f64::max),
            final_position_error: records.last().map_or(0.0, |r| r.position_error),
            rmse_heading: (records.iter().map(|r| r.heading_error.powi(2)).sum::<f64>() / n)
                .sqrt(),
            resamples: records.iter().filter(|r| r.resampled).count(),
        }
    }
}

/// Scatter `count` landmarks uniformly over the square of half-width `extent` centered on
/// `center`. Ids run from 1.
pub fn generate_map<R: Rng + ?Sized>(count: usize, extent: f64, center: &Pose, rng: &mut R) -> Map {
    let extent = extent.abs();
    (1..=count)
        .map(|id| {
            Landmark::new(
                id as LandmarkId,
                center.x + rng.random_range(-extent..=extent),
                center.y + rng.random_range(-extent..=extent),
            )
        })
        .collect()
}

/// The map a scenario runs against: the configured CSV file, or a generated one.
pub fn scenario_map(config: &SimulationConfig) -> std::result::Result<Map, Box<dyn Error>> {
    match &config.map_file {
        Some(path) => {
            let map = Map::from_csv(path)?;
            log::info!("loaded {} landmarks from {}", map.len(), path);
            Ok(map)
        }
        None => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let map = generate_map(
                config.num_landmarks,
                config.map_extent,
                &config.initial_pose,
                &mut rng,
            );
            log::info!(
                "generated {} landmarks within {} m of {}",
                map.len(),
                config.map_extent,
                config.initial_pose
            );
            Ok(map)
        }
    }
}

/// Noisy vehicle-frame observations of every landmark within `sensor_range` of `truth`.
///
/// `noise_std` is `[sigma_x, sigma_y]` in the vehicle frame; zero gives exact observations.
pub fn observe<R: Rng + ?Sized>(
    truth: &Pose,
    map: &Map,
    sensor_range: f64,
    noise_std: [f64; 2],
    rng: &mut R,
) -> Result<Vec<LandmarkObs<Vehicle>>> {
    let noise_x = gaussian(0.0, noise_std[0], "observation sigma_x")?;
    let noise_y = gaussian(0.0, noise_std[1], "observation sigma_y")?;
    Ok(map
        .within_range(truth.x, truth.y, sensor_range)
        .iter()
        .map(|landmark| {
            let exact =
                LandmarkObs::<MapFrame>::new(landmark.x, landmark.y).to_vehicle_frame(truth);
            LandmarkObs::new(exact.x + noise_x.sample(rng), exact.y + noise_y.sample(rng))
        })
        .collect())
}

/// Run the closed-loop scenario described by `config` against `map`.
///
/// Resampling follows `config.filter.resample_threshold`. When every weight is zero (no particle
/// could explain the batch) the resample is skipped with a warning and the current generation is
/// kept; any other filter error ends the run.
pub fn run_simulation(config: &SimulationConfig, map: &Map) -> Result<Vec<StepRecord>> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let control_v = gaussian(0.0, config.control_std[0], "control sigma_v")?;
    let control_w = gaussian(0.0, config.control_std[1], "control sigma_w")?;

    let mut filter = ParticleFilter::new(&config.filter, config.initial_pose)?;
    let mut truth = config.initial_pose;
    let mut records = Vec::with_capacity(config.steps);
    log::info!(
        "running {} steps with {} particles ({:?} resampling)",
        config.steps,
        config.filter.num_particles,
        config.filter.resampling_strategy
    );

    for step in 1..=config.steps {
        truth = propagate(&truth, config.dt, config.velocity, config.yaw_rate);
        let velocity = config.velocity + control_v.sample(&mut rng);
        let yaw_rate = config.yaw_rate + control_w.sample(&mut rng);
        let observations = observe(
            &truth,
            map,
            config.filter.sensor_range,
            config.observation_std,
            &mut rng,
        )?;

        filter.predict(config.dt, velocity, yaw_rate)?;
        filter.update_weights(&observations, map);

        let estimate = config
            .estimate
            .estimate(filter.particle_set())
            .unwrap_or(truth);
        let mut record = StepRecord::new(step, step as f64 * config.dt, &truth, &estimate);
        record.ess = filter.effective_sample_size();
        record.observations = observations.len();
        record.associations = filter
            .best_particle()
            .map(associations_string)
            .unwrap_or_default();

        let resampled = match config.filter.resample_threshold {
            Some(threshold) => filter.resample_if_needed(threshold),
            None => filter.resample().map(|_| true),
        };
        record.resampled = match resampled {
            Ok(done) => done,
            Err(err) if is_recoverable(&err) => {
                log::warn!("step {}: {}; keeping the current particles", step, err);
                false
            }
            Err(err) => return Err(err),
        };
        log::debug!(
            "step {}: {} observations, error {:.3} m, ESS {:.1}",
            step,
            record.observations,
            record.position_error,
            record.ess
        );
        records.push(record);
    }
    log::info!("{}", Summary::from_records(&records));
    Ok(records)
}
