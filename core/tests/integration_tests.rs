//! End-to-end localization tests
//!
//! These tests run complete predict / weigh / resample cycles against synthetic scenarios and check
//! that the filter tracks the ground truth. The error bounds are regression checks observed on the
//! seeded scenarios, not theoretical guarantees.
//!
//! ## Error Metrics
//!
//! - **Position error**: Euclidean distance between the estimated and true positions (m)
//! - **Heading error**: wrapped difference between estimated and true heading (rad)
use std::env::temp_dir;

use rand::SeedableRng;
use rand::rngs::StdRng;

use mcl::config::{ConfigFile, FilterConfig, SimulationConfig};
use mcl::estimate::{EstimateStrategy, spread};
use mcl::motion::propagate;
use mcl::resample::ParticleResamplingStrategy;
use mcl::sim::{StepRecord, Summary, generate_map, observe, run_simulation, scenario_map};
use mcl::{Landmark, Map, ParticleFilter, Pose};

fn scenario(strategy: ParticleResamplingStrategy) -> SimulationConfig {
    SimulationConfig {
        filter: FilterConfig {
            seed: Some(7),
            resampling_strategy: strategy,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn closed_loop_tracks_ground_truth() {
    let config = scenario(ParticleResamplingStrategy::Multinomial);
    let map = scenario_map(&config).unwrap();
    let records = run_simulation(&config, &map).unwrap();
    let summary = Summary::from_records(&records);
    assert_eq!(summary.steps, 100);
    assert!(summary.rmse_position < 1.0, "{}", summary);
    assert!(summary.final_position_error < 1.0, "{}", summary);
    assert!(summary.rmse_heading < 0.1, "{}", summary);
    assert!(summary.resamples > 90, "{}", summary);
}

#[test]
fn every_resampling_strategy_tracks_ground_truth() {
    for strategy in [
        ParticleResamplingStrategy::Multinomial,
        ParticleResamplingStrategy::Systematic,
        ParticleResamplingStrategy::Stratified,
        ParticleResamplingStrategy::Residual,
    ] {
        let config = scenario(strategy);
        let map = scenario_map(&config).unwrap();
        let summary = Summary::from_records(&run_simulation(&config, &map).unwrap());
        assert!(summary.rmse_position < 1.0, "{:?}: {}", strategy, summary);
    }
}

#[test]
fn adaptive_resampling_tracks_ground_truth() {
    let mut config = scenario(ParticleResamplingStrategy::Systematic);
    config.filter.resample_threshold = Some(0.5);
    let map = scenario_map(&config).unwrap();
    let records = run_simulation(&config, &map).unwrap();
    let summary = Summary::from_records(&records);
    assert!(summary.rmse_position < 1.0, "{}", summary);
    assert!(summary.resamples <= records.len());
    for record in records.iter().filter(|r| r.resampled) {
        assert!(record.ess < 0.5 * config.filter.num_particles as f64);
    }
}

#[test]
fn scenario_from_files() {
    let dir = temp_dir().join(format!("mcl_it_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    let map = generate_map(30, 60.0, &Pose::default(), &mut rng);
    let map_path = dir.join("landmarks.csv");
    map.to_csv(&map_path).unwrap();

    let mut config = scenario(ParticleResamplingStrategy::Residual);
    config.steps = 30;
    config.map_file = Some(map_path.display().to_string());
    let config_path = dir.join("scenario.toml");
    config.to_file(&config_path).unwrap();

    let loaded = SimulationConfig::from_file(&config_path).unwrap();
    assert_eq!(loaded, config);
    let loaded_map = scenario_map(&loaded).unwrap();
    assert_eq!(loaded_map, map);

    let records = run_simulation(&loaded, &loaded_map).unwrap();
    let output = dir.join("out.csv");
    StepRecord::to_csv(&records, &output).unwrap();
    let read = StepRecord::from_csv(&output).unwrap();
    assert_eq!(read.len(), 30);
    assert!(read.iter().all(|r| r.observations > 0));

    let _ = std::fs::remove_dir_all(&dir);
}

/// Drive the filter through the library API alone, the way an application would.
#[test]
fn library_cycle_recovers_from_offset_prior() {
    let map = Map::new(vec![
        Landmark::new(1, 10.0, 0.0),
        Landmark::new(2, 10.0, 10.0),
        Landmark::new(3, 0.0, 10.0),
        Landmark::new(4, -10.0, 5.0),
        Landmark::new(5, 20.0, -5.0),
        Landmark::new(6, 25.0, 10.0),
    ]);
    let config = FilterConfig {
        num_particles: 500,
        seed: Some(11),
        init_std: [1.0, 1.0, 0.05],
        process_std: [0.05, 0.05, 0.005],
        landmark_std: [0.3, 0.3],
        sensor_range: 40.0,
        ..Default::default()
    };
    let mut truth = Pose::new(0.0, 0.0, 0.0);
    // Prior centered away from the true starting pose.
    let mut filter = ParticleFilter::new(&config, Pose::new(0.5, -0.5, 0.0)).unwrap();
    let mut rng = StdRng::seed_from_u64(12);

    let (dt, velocity, yaw_rate) = (0.1, 2.0, 0.05);
    for _ in 0..50 {
        truth = propagate(&truth, dt, velocity, yaw_rate);
        let observations =
            observe(&truth, &map, config.sensor_range, [0.1, 0.1], &mut rng).unwrap();
        filter.predict(dt, velocity, yaw_rate).unwrap();
        filter.update_weights(&observations, &map);
        filter.resample().unwrap();
    }

    let estimate = filter.estimate(EstimateStrategy::WeightedMean).unwrap();
    assert!(
        estimate.distance_to(truth.x, truth.y) < 0.3,
        "estimate {} truth {}",
        estimate,
        truth
    );
    let cov = spread(filter.particle_set()).unwrap();
    assert!(cov[(0, 0)] < 0.25 && cov[(1, 1)] < 0.25, "{}", cov);

    let best = filter.best_particle().unwrap();
    let ids = filter.get_associations(best);
    assert!(!ids.is_empty());
    assert!(ids.split(' ').all(|id| map.get(id.parse().unwrap()).is_some()));
}
