//! Context used to tag log records with the emitting component and the current cycle.

/// Identifies the component which performs some work and the consolidation cycle it belongs to.
///
/// The context is passed to the logging macros, see [`log_info!`](crate::log_info!).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleContext {
    name: &'static str,
    cycle: u64,
}

impl CycleContext {
    /// Creates context for the specified component and cycle.
    pub fn new(name: &'static str, cycle: u64) -> Self {
        Self { name, cycle }
    }

    /// Returns the component name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the index of the current cycle.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns context of another component within the same cycle.
    pub fn component(&self, name: &'static str) -> Self {
        Self { name, cycle: self.cycle }
    }
}
