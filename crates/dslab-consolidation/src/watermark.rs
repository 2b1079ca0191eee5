//! Detection of overloaded hosts and feedback on the packing target.

use crate::host::Host;
use crate::load::HostLoads;
use crate::metrics::round_to;

/// Detects powered on hosts whose predicted CPU load exceeds the high watermark.
#[derive(Clone, Debug)]
pub struct WatermarkMonitor {
    hi_watermark: f64,
}

impl WatermarkMonitor {
    pub fn new(hi_watermark: f64) -> Self {
        Self { hi_watermark }
    }

    /// Returns IDs of overloaded hosts.
    ///
    /// Hosts with zero capacity or without tracked load are never considered overloaded.
    pub fn overloaded_hosts(&self, hosts: &[Host], loads: &HostLoads) -> Vec<u32> {
        hosts
            .iter()
            .filter(|h| h.is_on() && h.cpu_capacity > 0.)
            .filter(|h| {
                loads
                    .get(h.id)
                    .map_or(false, |load| load.cpu > h.cpu_capacity * self.hi_watermark)
            })
            .map(|h| h.id)
            .collect()
    }
}

/// Relaxes target utilization after cycles with watermark breach.
///
/// Target utilization is only decreased and never drops below the configured minimum.
#[derive(Clone, Debug)]
pub struct FeedbackController {
    step: f64,
    min_target_util: f64,
}

impl FeedbackController {
    pub fn new(step: f64, min_target_util: f64) -> Self {
        Self { step, min_target_util }
    }

    /// Returns target utilization to use after a breach.
    pub fn adjust(&self, target_util: f64) -> f64 {
        let lowered = round_to(target_util - self.step, 3).max(self.min_target_util);
        lowered.min(target_util)
    }
}
