//! VM CPU load models.

use std::path::Path;

use dyn_clone::{clone_trait_object, DynClone};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::core::config::options::{option_or, parse_config_value, parse_optional_options};

/// A load model defines which fraction of the requested VM resources is actually used at the given time.
///
/// Returned values are expected to lie in `[0, 1]`.
pub trait LoadModel: DynClone {
    fn get_resource_load(&self, time: f64) -> f64;
}

clone_trait_object!(LoadModel);

/// Resolves load model from its description, e.g. `Random[min=0.1,max=0.9,interval=300,seed=7]`.
pub fn load_model_resolver(config_str: &str) -> Box<dyn LoadModel> {
    let (model_name, options_str) = parse_config_value(config_str);
    let options = parse_optional_options(&options_str);
    match model_name.as_str() {
        "Constant" | "ConstantLoadModel" => Box::new(ConstantLoadModel::new(option_or(&options, "load", 1.))),
        "Random" | "RandomLoadModel" => Box::new(RandomLoadModel::new(
            option_or(&options, "min", 0.),
            option_or(&options, "max", 1.),
            option_or(&options, "interval", 300.),
            option_or(&options, "seed", 123),
        )),
        _ => panic!("Can't resolve: {}", config_str),
    }
}

/// The simplest load model, the constant load.
#[derive(Clone)]
pub struct ConstantLoadModel {
    load: f64,
}

impl ConstantLoadModel {
    pub fn new(load: f64) -> Self {
        Self { load }
    }
}

impl LoadModel for ConstantLoadModel {
    fn get_resource_load(&self, _time: f64) -> f64 {
        self.load
    }
}

/// Load defined by a series of samples taken at a fixed interval, such as PlanetLab CPU utilization traces.
///
/// Sample `i` defines the load during `[i * interval, (i + 1) * interval)`, the series is repeated cyclically.
#[derive(Clone)]
pub struct TraceLoadModel {
    samples: Vec<f64>,
    interval: f64,
}

impl TraceLoadModel {
    /// Creates the model from samples given as fractions.
    pub fn new(samples: Vec<f64>, interval: f64) -> Self {
        assert!(!samples.is_empty(), "Trace load model requires at least one sample");
        assert!(interval > 0., "Trace sampling interval should be positive");
        Self { samples, interval }
    }

    /// Parses PlanetLab trace format: one integer CPU utilization percentage per line.
    pub fn from_planetlab_str(data: &str, interval: f64) -> Self {
        let samples = data
            .lines()
            .filter_map(|line| line.trim().parse::<f64>().ok())
            .map(|percent| percent / 100.)
            .collect();
        Self::new(samples, interval)
    }

    /// Reads PlanetLab trace file.
    pub fn from_planetlab_file<P: AsRef<Path>>(path: P, interval: f64) -> Result<Self, std::io::Error> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_planetlab_str(&data, interval))
    }
}

impl LoadModel for TraceLoadModel {
    fn get_resource_load(&self, time: f64) -> f64 {
        let idx = (time.max(0.) / self.interval).floor() as usize % self.samples.len();
        self.samples[idx]
    }
}

/// Uniformly distributed load which changes once per interval.
///
/// The value for each interval is derived from the seed and the interval number only,
/// so the model can be queried repeatedly for the same time with the same result.
#[derive(Clone)]
pub struct RandomLoadModel {
    min: f64,
    max: f64,
    interval: f64,
    seed: u64,
}

impl RandomLoadModel {
    pub fn new(min: f64, max: f64, interval: f64, seed: u64) -> Self {
        assert!(min <= max, "Incorrect random load range: min = {}, max = {}", min, max);
        assert!(interval > 0., "Random load interval should be positive");
        Self {
            min,
            max,
            interval,
            seed,
        }
    }
}

impl LoadModel for RandomLoadModel {
    fn get_resource_load(&self, time: f64) -> f64 {
        let step = (time.max(0.) / self.interval).floor() as u64;
        let mut rng = Pcg64::seed_from_u64(self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(step));
        rng.gen_range(self.min..=self.max)
    }
}
