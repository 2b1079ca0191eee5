//! Per-cycle statistics of the simulation run.

use std::fs::File;

use serde::Serialize;

/// Statistics of a single consolidation cycle, recorded after the feedback step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleStats {
    pub cycle: u64,
    /// Number of VMs selected as migration candidates.
    pub candidates: usize,
    pub migrations: u64,
    pub hosts_powered_off: usize,
    /// Number of hosts which are on after the shutdown step.
    pub hosts_on: usize,
    /// Energy in kWh saved during this cycle.
    pub energy_kwh: f64,
    pub energy_kwh_total: f64,
    pub migrations_total: u64,
    pub breach: bool,
    pub breaches_total: u64,
    /// Target utilization after the feedback step.
    pub target_util: f64,
}

#[derive(Clone, Debug, Default)]
pub struct CycleLog {
    entries: Vec<CycleStats>,
}

impl CycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stats: CycleStats) {
        self.entries.push(stats);
    }

    pub fn entries(&self) -> &[CycleStats] {
        &self.entries
    }

    pub fn last(&self) -> Option<&CycleStats> {
        self.entries.last()
    }

    /// Saves the log to CSV file.
    pub fn save_csv(&self, path: &str) -> Result<(), csv::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for entry in &self.entries {
            wtr.serialize(entry)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
