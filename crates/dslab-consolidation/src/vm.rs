//! Representation of virtual machine and its usage history.

use serde::Serialize;

/// Recent observations of VM resource usage.
///
/// Usage history is an append-only log of observations, but only the two most recent entries are ever read,
/// so only these are stored. The history always holds at least two observations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UsageHistory {
    previous: f64,
    latest: f64,
    len: usize,
}

impl UsageHistory {
    /// Creates history seeded with two identical observations.
    pub fn new(initial: f64) -> Self {
        Self {
            previous: initial,
            latest: initial,
            len: 2,
        }
    }

    /// Appends new observation.
    pub fn record(&mut self, value: f64) {
        self.previous = self.latest;
        self.latest = value;
        self.len += 1;
    }

    /// Returns the most recent observation.
    pub fn latest(&self) -> f64 {
        self.latest
    }

    /// Returns the observation preceding the most recent one.
    pub fn previous(&self) -> f64 {
        self.previous
    }

    /// Returns the number of observations recorded so far, including the two initial ones.
    pub fn count(&self) -> usize {
        self.len
    }
}

/// Represents virtual machine (VM).
///
// VM is characterized by its ID, the host it is placed on, CPU and memory usage histories (in percents of host
// capacity) and the usage predicted for the next cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VirtualMachine {
    pub id: u32,
    host_id: u32,
    cpu_history: UsageHistory,
    memory_history: UsageHistory,
    predicted_cpu: f64,
    predicted_memory: f64,
}

impl VirtualMachine {
    /// Creates VM placed on the specified host with specified initial usage.
    pub fn new(id: u32, host_id: u32, cpu_usage: f64, memory_usage: f64) -> Self {
        Self {
            id,
            host_id,
            cpu_history: UsageHistory::new(cpu_usage),
            memory_history: UsageHistory::new(memory_usage),
            predicted_cpu: cpu_usage,
            predicted_memory: memory_usage,
        }
    }

    /// Returns ID of the host the VM is placed on.
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Moves VM to another host.
    pub fn set_host(&mut self, host_id: u32) {
        self.host_id = host_id;
    }

    pub fn cpu_history(&self) -> &UsageHistory {
        &self.cpu_history
    }

    pub fn memory_history(&self) -> &UsageHistory {
        &self.memory_history
    }

    /// Appends new CPU and memory usage observations.
    pub fn record_usage(&mut self, cpu_usage: f64, memory_usage: f64) {
        self.cpu_history.record(cpu_usage);
        self.memory_history.record(memory_usage);
    }

    /// Returns CPU usage predicted for the next cycle.
    pub fn predicted_cpu(&self) -> f64 {
        self.predicted_cpu
    }

    /// Returns memory usage predicted for the next cycle.
    pub fn predicted_memory(&self) -> f64 {
        self.predicted_memory
    }

    pub fn set_prediction(&mut self, cpu_usage: f64, memory_usage: f64) {
        self.predicted_cpu = cpu_usage;
        self.predicted_memory = memory_usage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_two_latest_values() {
        let mut history = UsageHistory::new(40.);
        assert_eq!(history.count(), 2);
        assert_eq!(history.previous(), 40.);
        assert_eq!(history.latest(), 40.);

        history.record(45.);
        history.record(30.);
        assert_eq!(history.count(), 4);
        assert_eq!(history.previous(), 45.);
        assert_eq!(history.latest(), 30.);
    }
}
