//! Energy accountant calculates the energy saved by powered off hosts.

use crate::host::Host;

/// Accumulates idle power of powered off hosts over time.
///
/// Only hosts which are off contribute, the active power of running hosts is not modeled.
/// So the accumulated value is the energy saved by consolidation, not the energy consumed.
#[derive(Debug, Clone, Default)]
pub struct EnergyAccountant {
    energy_saved: f64,
}

impl EnergyAccountant {
    /// Creates component.
    pub fn new() -> Self {
        Self { energy_saved: 0. }
    }

    /// Accounts a cycle of `dt_hours` duration. Returns the energy in kWh saved during this cycle.
    pub fn account(&mut self, hosts: &[Host], dt_hours: f64) -> f64 {
        let idle_power: f64 = hosts.iter().filter(|h| !h.is_on()).map(|h| h.idle_power).sum();
        let energy = idle_power * dt_hours / 1000.;
        self.energy_saved += energy;
        energy
    }

    /// Returns the total energy saved in kWh.
    pub fn energy_saved(&self) -> f64 {
        self.energy_saved
    }
}
