//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawSimulationConfig {
    pub alpha: Option<f64>,
    pub low_usage_threshold: Option<f64>,
    pub target_util: Option<f64>,
    pub hi_watermark: Option<f64>,
    pub dt_hours: Option<f64>,
    pub cycles: Option<u64>,
    pub host_count: Option<u32>,
    pub vm_count: Option<u32>,
    pub seed: Option<u64>,
    pub hosts: Option<Vec<HostConfig>>,
    pub demand: Option<DemandConfig>,
    pub initial_usage: Option<InitialUsageConfig>,
    pub feedback: Option<FeedbackConfig>,
}

/// Holds configuration of a single physical host or a set of identical hosts.
///
/// Capacities are expressed in percentage units, a VM using 25% of CPU consumes 25 units.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    /// Host CPU capacity.
    pub cpu_capacity: f64,
    /// Host memory capacity.
    pub memory_capacity: f64,
    /// Power draw in watts of idle host.
    pub idle_power: f64,
    /// Power draw in watts of fully loaded host.
    /// Currently it is not used by the energy accounting.
    pub peak_power: f64,
    /// Number of such hosts.
    pub count: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cpu_capacity: 100.,
            memory_capacity: 100.,
            idle_power: 120.,
            peak_power: 300.,
            count: 1,
        }
    }
}

/// Parameters of synthetic demand drift.
///
/// Each cycle the CPU usage of a VM changes by `amplitude * sin(2 * pi * (cycle mod period) / period) + U(-noise, noise)`
/// and its memory usage changes by `memory_ratio` times the same delta.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DemandConfig {
    pub amplitude: f64,
    pub noise: f64,
    pub period: u64,
    pub memory_ratio: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            amplitude: 10.,
            noise: 8.,
            period: 24,
            memory_ratio: 0.8,
        }
    }
}

/// Distribution of VM usage at the start of the run.
///
/// CPU usage is drawn uniformly from `[cpu_min, cpu_max]`,
/// memory usage is `clamp(memory_ratio * cpu, memory_min, memory_max)`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InitialUsageConfig {
    pub cpu_min: f64,
    pub cpu_max: f64,
    pub memory_ratio: f64,
    pub memory_min: f64,
    pub memory_max: f64,
}

impl Default for InitialUsageConfig {
    fn default() -> Self {
        Self {
            cpu_min: 10.,
            cpu_max: 60.,
            memory_ratio: 0.8,
            memory_min: 5.,
            memory_max: 80.,
        }
    }
}

/// Parameters of the target utilization feedback.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Amount subtracted from target utilization after each cycle with watermark breach.
    pub step: f64,
    /// Lower bound of target utilization.
    pub min_target_util: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            step: 0.02,
            min_target_util: 0.7,
        }
    }
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Smoothing factor of exponential moving average used to predict VM usage.
    pub alpha: f64,
    /// VMs with predicted CPU usage not above this value (in percents) are migration candidates.
    pub low_usage_threshold: f64,
    /// Initial fraction of host capacity which can be filled by migrations.
    pub target_util: f64,
    /// Fraction of host CPU capacity above which the host is considered overloaded.
    pub hi_watermark: f64,
    /// Duration of a single cycle in hours.
    pub dt_hours: f64,
    /// Number of cycles to simulate.
    pub cycles: u64,
    /// Number of VMs.
    pub vm_count: u32,
    /// Random seed.
    pub seed: u64,
    /// Configurations of physical hosts.
    pub hosts: Vec<HostConfig>,
    pub demand: DemandConfig,
    pub initial_usage: InitialUsageConfig,
    pub feedback: FeedbackConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::from_raw(RawSimulationConfig::default())
    }
}

impl SimulationConfig {
    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::parse(&data, file_name)
    }

    /// Creates simulation config from YAML string.
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        Self::parse(data, "<string>")
    }

    fn parse(data: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(data).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawSimulationConfig) -> Self {
        let hosts = raw.hosts.unwrap_or_else(|| {
            vec![HostConfig {
                count: raw.host_count.unwrap_or(20),
                ..HostConfig::default()
            }]
        });
        Self {
            alpha: raw.alpha.unwrap_or(0.6),
            low_usage_threshold: raw.low_usage_threshold.unwrap_or(30.),
            target_util: raw.target_util.unwrap_or(0.8),
            hi_watermark: raw.hi_watermark.unwrap_or(0.9),
            dt_hours: raw.dt_hours.unwrap_or(1.),
            cycles: raw.cycles.unwrap_or(24),
            vm_count: raw.vm_count.unwrap_or(120),
            seed: raw.seed.unwrap_or(7),
            hosts,
            demand: raw.demand.unwrap_or_default(),
            initial_usage: raw.initial_usage.unwrap_or_default(),
            feedback: raw.feedback.unwrap_or_default(),
        }
    }

    /// Returns the total number of hosts.
    pub fn host_count(&self) -> u32 {
        self.hosts.iter().map(|h| h.count).sum()
    }

    /// Replaces host configurations with `count` hosts of the first configured kind.
    pub fn set_host_count(&mut self, count: u32) {
        let template = self.hosts.first().cloned().unwrap_or_default();
        self.hosts = vec![HostConfig { count, ..template }];
    }

    /// Checks that all parameters are within their admissible ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("alpha", self.alpha, (0. ..=1.).contains(&self.alpha), "a value in [0, 1]")?;
        check_non_negative("low_usage_threshold", self.low_usage_threshold)?;
        check_positive("target_util", self.target_util)?;
        check_positive("hi_watermark", self.hi_watermark)?;
        check_non_negative("dt_hours", self.dt_hours)?;

        for host in &self.hosts {
            check_non_negative("hosts.cpu_capacity", host.cpu_capacity)?;
            check_non_negative("hosts.memory_capacity", host.memory_capacity)?;
            check_non_negative("hosts.idle_power", host.idle_power)?;
            check_non_negative("hosts.peak_power", host.peak_power)?;
        }
        if self.vm_count > 0 && self.host_count() == 0 {
            return Err(ConfigError::NoHosts {
                vm_count: self.vm_count,
            });
        }

        let demand = &self.demand;
        check("demand.amplitude", demand.amplitude, demand.amplitude.is_finite(), "a finite value")?;
        check_non_negative("demand.noise", demand.noise)?;
        check("demand.period", demand.period as f64, demand.period > 0, "a positive value")?;
        check(
            "demand.memory_ratio",
            demand.memory_ratio,
            demand.memory_ratio.is_finite(),
            "a finite value",
        )?;

        let usage = &self.initial_usage;
        check_non_negative("initial_usage.cpu_min", usage.cpu_min)?;
        check(
            "initial_usage.cpu_max",
            usage.cpu_max,
            usage.cpu_max.is_finite() && usage.cpu_max >= usage.cpu_min,
            "a finite value not less than cpu_min",
        )?;
        check_non_negative("initial_usage.memory_ratio", usage.memory_ratio)?;
        check_non_negative("initial_usage.memory_min", usage.memory_min)?;
        check(
            "initial_usage.memory_max",
            usage.memory_max,
            usage.memory_max.is_finite() && usage.memory_max >= usage.memory_min,
            "a finite value not less than memory_min",
        )?;

        check_non_negative("feedback.step", self.feedback.step)?;
        check_positive("feedback.min_target_util", self.feedback.min_target_util)?;
        Ok(())
    }
}

fn check(name: &'static str, value: f64, ok: bool, expected: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value, expected })
    }
}

pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check(name, value, value.is_finite() && value >= 0., "a finite non-negative value")
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check(name, value, value.is_finite() && value > 0., "a finite positive value")
}
