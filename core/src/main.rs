//! `mcl`: run synthetic localization scenarios with the landmark particle filter.
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;

use mcl::config::{ConfigFile, LogLevel, SimulationConfig};
use mcl::resample::ParticleResamplingStrategy;
use mcl::sim::{StepRecord, Summary, run_simulation, scenario_map};

const LONG_ABOUT: &str = "Landmark-based Monte-Carlo localization.

The `run` command drives a simulated vehicle through a landmark map, feeds noisy controls and
landmark observations to a particle filter, and writes the per-step ground truth, estimate and
error to CSV. All scenario and filter parameters come from a configuration file (TOML/JSON/YAML);
use `create-config` to write one with the default values.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Landmark-based Monte-Carlo localization.", long_about = LONG_ABOUT)]
struct Cli {
    /// Simulation configuration file (TOML/JSON/YAML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,

    /// Log level; overrides the configuration file
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        about = "Run a closed-loop localization scenario",
        long_about = "Run a synthetic closed-loop scenario: the ground-truth vehicle follows a constant velocity and yaw-rate arc, the filter predicts from noisy controls, weighs every particle against noisy observations of the landmarks within sensor range and resamples. One CSV row is written per step."
    )]
    Run(RunArgs),
    #[command(
        name = "create-config",
        about = "Write a configuration file with default values"
    )]
    CreateConfig(CreateConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Landmark map CSV with header `id,x,y`; overrides the configuration file
    #[arg(short, long)]
    map: Option<PathBuf>,
    /// Output CSV path
    #[arg(short, long, default_value = "mcl_output.csv")]
    output: PathBuf,
    /// Number of particles; overrides the configuration file
    #[arg(short = 'n', long)]
    particles: Option<usize>,
    /// Filter seed; overrides the configuration file
    #[arg(long)]
    seed: Option<u64>,
    /// Resampling strategy; overrides the configuration file
    #[arg(long, value_enum)]
    strategy: Option<ParticleResamplingStrategy>,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Destination; the extension selects the format (.toml/.json/.yaml/.yml)
    #[arg(short, long, default_value = "mcl.toml")]
    output: PathBuf,
}

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `level` - Maximum level to emit
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
fn init_logger(level: LogLevel, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(SimulationConfig::from_file(path)?),
        None => Ok(SimulationConfig::default()),
    }
}

fn run(mut config: SimulationConfig, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    if let Some(map) = &args.map {
        config.map_file = Some(map.display().to_string());
    }
    if let Some(n) = args.particles {
        config.filter.num_particles = n;
    }
    if let Some(seed) = args.seed {
        config.filter.seed = Some(seed);
    }
    if let Some(strategy) = args.strategy {
        config.filter.resampling_strategy = strategy;
    }
    config.validate()?;

    let map = scenario_map(&config)?;
    let records = run_simulation(&config, &map)?;
    StepRecord::to_csv(&records, &args.output)?;
    info!(
        "wrote {} records to {}",
        records.len(),
        args.output.display()
    );
    println!("{}", Summary::from_records(&records));
    Ok(())
}

fn create_config(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    SimulationConfig::default().to_file(&args.output)?;
    println!("Configuration written to {}", args.output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Command::CreateConfig(args) = &cli.command {
        init_logger(cli.log_level.unwrap_or_default(), cli.log_file.as_deref())?;
        return create_config(args);
    }

    let config = load_config(cli.config.as_deref())?;
    // CLI flags take precedence over the configuration file.
    let log_level = cli.log_level.unwrap_or(config.logging.level);
    let config_log_file = config.logging.file.as_ref().map(PathBuf::from);
    let log_file = cli.log_file.as_deref().or(config_log_file.as_deref());
    init_logger(log_level, log_file)?;

    match &cli.command {
        Command::Run(args) => {
            match &cli.config {
                Some(path) => info!("running scenario from {}", path.display()),
                None => info!("running default scenario"),
            }
            run(config, args)
        }
        Command::CreateConfig(args) => create_config(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "mcl",
            "run",
            "--config",
            "scenario.toml",
            "--map",
            "landmarks.csv",
            "--output",
            "out.csv",
            "--strategy",
            "systematic",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("scenario.toml")));
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.map, Some(PathBuf::from("landmarks.csv")));
                assert_eq!(args.output, PathBuf::from("out.csv"));
                assert_eq!(args.strategy, Some(ParticleResamplingStrategy::Systematic));
                assert!(args.particles.is_none());
            }
            Command::CreateConfig(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_create_config() {
        let cli = Cli::try_parse_from(["mcl", "create-config", "--output", "cfg.yaml"]).unwrap();
        assert!(cli.log_level.is_none());
        match cli.command {
            Command::CreateConfig(args) => assert_eq!(args.output, PathBuf::from("cfg.yaml")),
            Command::Run(_) => panic!("expected create-config"),
        }
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }
}
