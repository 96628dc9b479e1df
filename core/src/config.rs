//! Configuration for filters and synthetic simulations.
//!
//! Both [`FilterConfig`] and [`SimulationConfig`] can be stored as JSON, YAML or TOML; the format
//! is chosen from the file extension by [`ConfigFile::to_file`] and [`ConfigFile::from_file`].
//! Every field has a serde default, so a partial file only needs to name what it changes.
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Pose;
use crate::error::{FilterError, Result, check_non_negative, check_positive};
use crate::estimate::EstimateStrategy;
use crate::resample::ParticleResamplingStrategy;

/// File persistence shared by the configuration types.
pub trait ConfigFile: Serialize + DeserializeOwned + Sized {
    /// Write the configuration as pretty-printed JSON.
    fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }
    /// Read the configuration from a JSON file.
    fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(unsupported(p)),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(unsupported(p)),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn unsupported(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unsupported file extension: {}", path.display()),
    )
}

fn default_num_particles() -> usize {
    100
}
fn default_init_std() -> [f64; 3] {
    [0.3, 0.3, 0.01]
}
fn default_process_std() -> [f64; 3] {
    [0.3, 0.3, 0.01]
}
fn default_landmark_std() -> [f64; 2] {
    [0.3, 0.3]
}
fn default_sensor_range() -> f64 {
    50.0
}

/// Parameters of a [`crate::ParticleFilter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Population size N.
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,
    /// Seed of the filter's random source. A random seed is drawn once when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Prior standard deviations `[sigma_x, sigma_y, sigma_theta]` around the initial pose.
    #[serde(default = "default_init_std")]
    pub init_std: [f64; 3],
    /// Process noise `[sigma_x, sigma_y, sigma_theta]` added after every prediction.
    #[serde(default = "default_process_std")]
    pub process_std: [f64; 3],
    /// Landmark observation noise `[sigma_x, sigma_y]`.
    #[serde(default = "default_landmark_std")]
    pub landmark_std: [f64; 2],
    /// Maximum landmark distance (m) considered during association.
    #[serde(default = "default_sensor_range")]
    pub sensor_range: f64,
    /// Weight of a particle whose observations matched no landmark.
    #[serde(default)]
    pub zero_match_weight: f64,
    #[serde(default)]
    pub resampling_strategy: ParticleResamplingStrategy,
    /// Resample only when ESS < threshold * N. `None` resamples every cycle.
    #[serde(default)]
    pub resample_threshold: Option<f64>,
}
impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: default_num_particles(),
            seed: None,
            init_std: default_init_std(),
            process_std: default_process_std(),
            landmark_std: default_landmark_std(),
            sensor_range: default_sensor_range(),
            zero_match_weight: 0.0,
            resampling_strategy: ParticleResamplingStrategy::default(),
            resample_threshold: None,
        }
    }
}
impl FilterConfig {
    /// Check every parameter before any particle is created.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(FilterError::InvalidParticleCount);
        }
        check_non_negative("init sigma_x", self.init_std[0])?;
        check_non_negative("init sigma_y", self.init_std[1])?;
        check_non_negative("init sigma_theta", self.init_std[2])?;
        check_non_negative("process sigma_x", self.process_std[0])?;
        check_non_negative("process sigma_y", self.process_std[1])?;
        check_non_negative("process sigma_theta", self.process_std[2])?;
        check_positive("landmark sigma_x", self.landmark_std[0])?;
        check_positive("landmark sigma_y", self.landmark_std[1])?;
        if !(self.sensor_range.is_finite() && self.sensor_range >= 0.0) {
            return Err(FilterError::InvalidSensorRange(self.sensor_range));
        }
        if !(self.zero_match_weight.is_finite() && self.zero_match_weight >= 0.0) {
            return Err(FilterError::InvalidWeight {
                index: 0,
                value: self.zero_match_weight,
            });
        }
        Ok(())
    }
}
impl ConfigFile for FilterConfig {}

/// Log verbosity, mirroring [`log::LevelFilter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}
impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file path; stderr when absent.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_steps() -> usize {
    100
}
fn default_dt() -> f64 {
    0.1
}
fn default_velocity() -> f64 {
    5.0
}
fn default_yaw_rate() -> f64 {
    0.1
}
fn default_control_std() -> [f64; 2] {
    [0.1, 0.01]
}
fn default_observation_std() -> [f64; 2] {
    [0.3, 0.3]
}
fn default_num_landmarks() -> usize {
    40
}
fn default_map_extent() -> f64 {
    100.0
}
fn default_sim_seed() -> u64 {
    42
}

/// Synthetic closed-loop scenario driven by the `mcl run` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    /// Number of predict/update/resample cycles.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Cycle period (s).
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// True forward velocity (m/s).
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    /// True yaw rate (rad/s).
    #[serde(default = "default_yaw_rate")]
    pub yaw_rate: f64,
    /// True starting pose, also the seed of the filter's prior.
    #[serde(default)]
    pub initial_pose: Pose,
    /// Noise `[sigma_v, sigma_w]` on the controls reported to the filter.
    #[serde(default = "default_control_std")]
    pub control_std: [f64; 2],
    /// Noise `[sigma_x, sigma_y]` on the vehicle-frame landmark observations.
    #[serde(default = "default_observation_std")]
    pub observation_std: [f64; 2],
    /// Landmark map CSV. A random map is generated when absent.
    #[serde(default)]
    pub map_file: Option<String>,
    /// Landmarks in a generated map.
    #[serde(default = "default_num_landmarks")]
    pub num_landmarks: usize,
    /// Half-width (m) of the square, centered on the initial pose, that a generated map fills.
    #[serde(default = "default_map_extent")]
    pub map_extent: f64,
    /// Seed of the scenario's own random source (ground truth noise and generated map).
    #[serde(default = "default_sim_seed")]
    pub seed: u64,
    /// Policy used to report the filter's pose each step.
    #[serde(default)]
    pub estimate: EstimateStrategy,
    #[serde(default)]
    pub logging: LoggingConfig,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            filter: FilterConfig::default(),
            steps: default_steps(),
            dt: default_dt(),
            velocity: default_velocity(),
            yaw_rate: default_yaw_rate(),
            initial_pose: Pose::default(),
            control_std: default_control_std(),
            observation_std: default_observation_std(),
            map_file: None,
            num_landmarks: default_num_landmarks(),
            map_extent: default_map_extent(),
            seed: default_sim_seed(),
            estimate: EstimateStrategy::default(),
            logging: LoggingConfig::default(),
        }
    }
}
impl SimulationConfig {
    /// Validate the embedded filter and the scenario parameters.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(FilterError::InvalidTimeStep(self.dt));
        }
        check_non_negative("control sigma_v", self.control_std[0])?;
        check_non_negative("control sigma_w", self.control_std[1])?;
        check_non_negative("observation sigma_x", self.observation_std[0])?;
        check_non_negative("observation sigma_y", self.observation_std[1])?;
        Ok(())
    }
}
impl ConfigFile for SimulationConfig {}
