//! Physical host power consumption models.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::options::{option_or, parse_config_value, parse_optional_options};

/// Power model is a function which computes the power consumption (in W) of a physical host from its CPU load.
///
/// Models must be deterministic and side-effect free, since the optimizer queries them for hypothetical loads.
/// Powered off hosts (zero load) are handled by [`Host`](crate::core::host::Host), so the models always describe
/// a running host.
pub trait PowerModel: DynClone {
    /// Returns the power consumption at the given CPU load (fraction from 0 to 1).
    fn get_power(&self, cpu_load: f64) -> f64;

    /// Returns the rated maximum power consumption.
    fn max_power(&self) -> f64 {
        self.get_power(1.)
    }
}

clone_trait_object!(PowerModel);

/// Resolves power model from its description, e.g. `Linear[max=250,idle=175]` or `HpProLiantMl110G5`.
pub fn power_model_resolver(config_str: &str) -> Box<dyn PowerModel> {
    let (model_name, options_str) = parse_config_value(config_str);
    let options = parse_optional_options(&options_str);
    match model_name.as_str() {
        "Linear" => {
            let max_power = option_or(&options, "max", 1.);
            Box::new(LinearPowerModel::new(max_power, option_or(&options, "idle", 0.4 * max_power)))
        }
        "Constant" => Box::new(ConstantPowerModel::new(option_or(&options, "power", 1.))),
        "HpProLiantMl110G4" => Box::new(EmpiricalPowerModel::hp_proliant_ml110_g4()),
        "HpProLiantMl110G5" => Box::new(EmpiricalPowerModel::hp_proliant_ml110_g5()),
        _ => panic!("Can't resolve: {}", config_str),
    }
}

/// Simple linear power model: `idle_power + cpu_load * (max_power - idle_power)`.
#[derive(Clone)]
pub struct LinearPowerModel {
    max_power: f64,
    idle_power: f64,
}

impl LinearPowerModel {
    pub fn new(max_power: f64, idle_power: f64) -> Self {
        Self { max_power, idle_power }
    }
}

impl PowerModel for LinearPowerModel {
    fn get_power(&self, cpu_load: f64) -> f64 {
        self.idle_power + cpu_load * (self.max_power - self.idle_power)
    }

    fn max_power(&self) -> f64 {
        self.max_power
    }
}

/// Load-independent power consumption.
#[derive(Clone)]
pub struct ConstantPowerModel {
    power: f64,
}

impl ConstantPowerModel {
    pub fn new(power: f64) -> Self {
        Self { power }
    }
}

impl PowerModel for ConstantPowerModel {
    fn get_power(&self, _cpu_load: f64) -> f64 {
        self.power
    }
}

/// A power model based on measurements of actual power consumption at different load levels.
///
/// The model uses 11 measurements corresponding to power consumption at load levels from 0% to 100% with step 10%,
/// such as measurements reported by the [SPECpower benchmark](https://www.spec.org/power_ssj2008/results/).
/// The power consumption between the measured levels is linearly interpolated, loads outside `[0, 1]` are clamped.
#[derive(Clone)]
pub struct EmpiricalPowerModel {
    measurements: Vec<f64>,
}

impl EmpiricalPowerModel {
    pub fn new(measurements: Vec<f64>) -> Self {
        assert_eq!(
            measurements.len(),
            11,
            "Incorrect measurements size for EmpiricalPowerModel, should be 11"
        );
        Self { measurements }
    }

    /// HP ProLiant ML110 G4 (1 x Intel Xeon 3040, 2 cores 1860 MHz, 4 GB).
    pub fn hp_proliant_ml110_g4() -> Self {
        Self::new(vec![86., 89.4, 92.6, 96., 99.5, 102., 106., 108., 112., 114., 117.])
    }

    /// HP ProLiant ML110 G5 (1 x Intel Xeon 3075, 2 cores 2660 MHz, 4 GB).
    pub fn hp_proliant_ml110_g5() -> Self {
        Self::new(vec![93.7, 97., 101., 105., 110., 116., 121., 125., 129., 133., 135.])
    }
}

impl PowerModel for EmpiricalPowerModel {
    fn get_power(&self, cpu_load: f64) -> f64 {
        let scaled = cpu_load.clamp(0., 1.) * 10.;
        let idx = (scaled.floor() as usize).min(9);
        let frac = scaled - idx as f64;
        self.measurements[idx] + (self.measurements[idx + 1] - self.measurements[idx]) * frac
    }

    fn max_power(&self) -> f64 {
        self.measurements[10]
    }
}
