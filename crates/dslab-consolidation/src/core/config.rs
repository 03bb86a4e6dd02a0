//! Consolidation configuration.

pub mod options;

use serde::{Deserialize, Serialize};

/// Holds raw consolidation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawConsolidationConfig {
    pub scheduling_interval: Option<f64>,
    pub simulation_length: Option<f64>,
    pub overload_detection: Option<String>,
    pub vm_selection: Option<String>,
    pub overload_placement: Option<String>,
    pub underload_placement: Option<String>,
    pub clustering: Option<RawClusteringConfig>,
    pub history_limit: Option<usize>,
    pub utilization_history_length: Option<usize>,
    pub hosts: Option<Vec<HostConfig>>,
    pub vms: Option<Vec<VmConfig>>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawClusteringConfig {
    pub enabled: Option<bool>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
}

/// Controls VM feature clustering used before placing evicted VMs.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ClusteringConfig {
    /// Whether evicted VMs are grouped into clusters before placement.
    pub enabled: bool,
    /// Maximum number of centroid refinement rounds.
    pub max_iterations: usize,
    /// Centroids closer than this to their previous position are considered unchanged.
    /// Zero means exact equality.
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 10,
            tolerance: 0.,
        }
    }
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Host CPU capacity in MIPS.
    pub cpus: f64,
    /// Host memory capacity in MB.
    pub memory: u64,
    /// Power model in `Name[opt=value]` notation.
    pub power_model: String,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Holds configuration of a single VM or a set of identical VMs.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmConfig {
    /// Requested CPU in MIPS.
    pub cpu_usage: f64,
    /// Requested memory in MB.
    pub memory: u64,
    /// CPU load model in `Name[opt=value]` notation.
    pub load_model: String,
    /// Name of the host where VM is initially placed.
    pub host: Option<String>,
    /// Number of such VMs.
    pub count: Option<u32>,
}

/// Represents consolidation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConsolidationConfig {
    /// Duration in seconds between optimizer invocations.
    pub scheduling_interval: f64,
    /// Length of simulation in seconds.
    pub simulation_length: f64,
    /// Host overload detection algorithm.
    pub overload_detection: String,
    /// Policy choosing VMs to evict from overloaded hosts.
    pub vm_selection: String,
    /// Host ranking strategy for VMs evicted from overloaded hosts.
    pub overload_placement: String,
    /// Host ranking strategy for VMs of drained underloaded hosts.
    pub underload_placement: String,
    /// VM clustering settings.
    pub clustering: ClusteringConfig,
    /// Maximum number of entries kept in each history sequence.
    pub history_limit: usize,
    /// Number of utilization samples kept per host.
    pub utilization_history_length: usize,
    /// Configurations of physical hosts.
    pub hosts: Vec<HostConfig>,
    /// Configurations of initial VMs.
    pub vms: Vec<VmConfig>,
}

impl ConsolidationConfig {
    /// Creates config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let raw: RawConsolidationConfig = serde_yaml::from_str(
            &std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|_| panic!("Can't parse YAML from file {}", file_name));
        Self::from_raw(raw)
    }

    /// Creates config from YAML string.
    ///
    /// Panics if the scheduling interval is not positive.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let raw: RawConsolidationConfig = serde_yaml::from_str(yaml)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConsolidationConfig) -> Self {
        let scheduling_interval = raw.scheduling_interval.unwrap_or(300.);
        if !(scheduling_interval > 0.) {
            panic!("Scheduling interval should be positive, got {}", scheduling_interval);
        }
        let clustering = raw.clustering.unwrap_or_default();
        let default_clustering = ClusteringConfig::default();
        Self {
            scheduling_interval,
            simulation_length: raw.simulation_length.unwrap_or(86400.),
            overload_detection: raw
                .overload_detection
                .unwrap_or_else(|| "StaticThreshold[threshold=0.8]".to_string()),
            vm_selection: raw.vm_selection.unwrap_or_else(|| "MinimumMigrationTime".to_string()),
            overload_placement: raw.overload_placement.unwrap_or_else(|| "MinPowerIncrease".to_string()),
            underload_placement: raw.underload_placement.unwrap_or_else(|| "MaxPowerIncrease".to_string()),
            clustering: ClusteringConfig {
                enabled: clustering.enabled.unwrap_or(default_clustering.enabled),
                max_iterations: clustering.max_iterations.unwrap_or(default_clustering.max_iterations),
                tolerance: clustering.tolerance.unwrap_or(default_clustering.tolerance),
            },
            history_limit: raw.history_limit.unwrap_or(1000),
            utilization_history_length: raw.utilization_history_length.unwrap_or(30),
            hosts: raw.hosts.unwrap_or_default(),
            vms: raw.vms.unwrap_or_default(),
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self::from_raw(RawConsolidationConfig::default())
    }
}
