//! Representation of physical host and its power state.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::config::{check_non_negative, HostConfig};
use crate::error::ConfigError;

/// Power state of physical host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "ON"),
            PowerState::Off => write!(f, "OFF"),
        }
    }
}

/// Represents physical host.
///
// Hosts exist for the whole run, only their power state changes and only from ON to OFF.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Host {
    pub id: u32,
    pub cpu_capacity: f64,
    pub memory_capacity: f64,
    pub idle_power: f64,
    pub peak_power: f64,
    power_state: PowerState,
}

impl Host {
    /// Creates powered on host with specified parameters.
    pub fn new(id: u32, cpu_capacity: f64, memory_capacity: f64, idle_power: f64, peak_power: f64) -> Self {
        Self {
            id,
            cpu_capacity,
            memory_capacity,
            idle_power,
            peak_power,
            power_state: PowerState::On,
        }
    }

    /// Creates powered on host using parameters from host config.
    pub fn from_config(id: u32, config: &HostConfig) -> Self {
        Self::new(
            id,
            config.cpu_capacity,
            config.memory_capacity,
            config.idle_power,
            config.peak_power,
        )
    }

    /// Checks that capacities and power draws are finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("hosts.cpu_capacity", self.cpu_capacity)?;
        check_non_negative("hosts.memory_capacity", self.memory_capacity)?;
        check_non_negative("hosts.idle_power", self.idle_power)?;
        check_non_negative("hosts.peak_power", self.peak_power)
    }

    /// Returns the current power state.
    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    pub fn is_on(&self) -> bool {
        self.power_state == PowerState::On
    }

    /// Turns the host off. Returns `true` if the host was on before the call.
    ///
    /// There is no way to turn the host back on.
    pub fn power_off(&mut self) -> bool {
        let was_on = self.is_on();
        self.power_state = PowerState::Off;
        was_on
    }
}

/// Builds hosts described by the list of host configs, assigning IDs in declaration order.
pub fn hosts_from_config(configs: &[HostConfig]) -> Vec<Host> {
    configs
        .iter()
        .flat_map(|config| std::iter::repeat(config).take(config.count as usize))
        .enumerate()
        .map(|(id, config)| Host::from_config(id as u32, config))
        .collect()
}
