//! Summary statistics of the simulation run.

use serde::{Deserialize, Serialize};

use crate::host::Host;
use crate::load::HostLoads;
use crate::vm::VirtualMachine;

/// Number of quantile intervals used to compute the 95th percentile.
const P95_QUANTILES: usize = 20;

/// Summary of the simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Total energy in kWh saved by powered off hosts.
    pub energy_kwh_total: f64,
    pub migrations_total: u64,
    pub hosts_off_final: u32,
    /// Mean predicted CPU utilization of powered on hosts at the end of the run.
    pub util_mean_final: f64,
    /// 95th percentile of predicted CPU utilization of powered on hosts at the end of the run.
    pub util_p95_final: f64,
    /// Number of cycles in which some host exceeded the high watermark.
    pub hi_watermark_breaches: u64,
    pub final_target_util: f64,
}

/// Run-wide counters accumulated by the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunTotals {
    pub energy_kwh: f64,
    pub migrations: u64,
    pub breaches: u64,
    pub target_util: f64,
}

/// Computes the run summary from the final state of hosts and VMs.
pub fn summarize(hosts: &[Host], vms: &[VirtualMachine], totals: &RunTotals) -> SimulationSummary {
    let utils = host_utilizations(hosts, vms);
    let util_mean = mean(&utils).unwrap_or(0.);
    let util_p95 = if utils.is_empty() {
        0.
    } else if utils.len() >= P95_QUANTILES {
        quantiles(&utils, P95_QUANTILES).last().copied().unwrap_or(0.)
    } else {
        // not enough hosts for quantile resolution
        utils.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    };

    SimulationSummary {
        energy_kwh_total: round_to(totals.energy_kwh, 3),
        migrations_total: totals.migrations,
        hosts_off_final: hosts.iter().filter(|h| !h.is_on()).count() as u32,
        util_mean_final: round_to(util_mean, 4),
        util_p95_final: round_to(util_p95, 4),
        hi_watermark_breaches: totals.breaches,
        final_target_util: round_to(totals.target_util, 3),
    }
}

/// Returns predicted CPU utilization (load to capacity ratio) of powered on hosts with non-zero capacity,
/// in ascending host ID order. Host IDs are expected to match their positions.
pub fn host_utilizations(hosts: &[Host], vms: &[VirtualMachine]) -> Vec<f64> {
    HostLoads::predicted(hosts, vms)
        .iter()
        .filter_map(|(id, load)| {
            hosts
                .get(*id as usize)
                .filter(|h| h.id == *id && h.cpu_capacity > 0.)
                .map(|h| load.cpu / h.cpu_capacity)
        })
        .collect()
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Divides data into `n` intervals with equal probability and returns `n - 1` cut points.
///
/// Uses the exclusive method: data is treated as a sample from a larger population, the cut point `i` is interpolated
/// at position `i * (len + 1) / n` of the sorted data. Returns an empty vector if there are less than two data points
/// or `n < 2`.
pub fn quantiles(data: &[f64], n: usize) -> Vec<f64> {
    let len = data.len();
    if len < 2 || n < 2 {
        return Vec::new();
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (m, n) = (len as i64 + 1, n as i64);
    (1..n)
        .map(|i| {
            let j = (i * m / n).clamp(1, len as i64 - 1);
            let delta = (i * m - j * n) as f64;
            let (lo, hi) = (sorted[j as usize - 1], sorted[j as usize]);
            (lo * (n as f64 - delta) + hi * delta) / n as f64
        })
        .collect()
}

/// Rounds value to the specified number of decimal places.
pub fn round_to(value: f64, digits: usize) -> f64 {
    format!("{:.*}", digits, value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_of_twenty_values() {
        // m = 21, last cut i = 19: j = 399 / 20 = 19, delta = 399 - 380 = 19,
        // value = (x[18] * 1 + x[19] * 19) / 20 = (19 + 380) / 20 = 19.95
        let data: Vec<f64> = (1..=20).rev().map(|x| x as f64).collect();
        let cuts = quantiles(&data, 20);
        assert_eq!(cuts.len(), 19);
        assert_eq!(cuts[18], 19.95);
        // i = 10: j = 210 / 20 = 10, delta = 10, value = (10 * 10 + 11 * 10) / 20
        assert_eq!(cuts[9], 10.5);
    }

    #[test]
    fn quantiles_clamp_position() {
        // m = 4, i = 3: j = 12 / 4 = 3 is clamped to 2, delta = 12 - 8 = 4 => value = x[2]
        let cuts = quantiles(&[1., 2., 3.], 4);
        assert_eq!(cuts, vec![1., 2., 3.]);
    }

    fn summary_of(host_count: u32) -> SimulationSummary {
        let hosts: Vec<Host> = (0..host_count).map(|id| Host::new(id, 100., 100., 120., 300.)).collect();
        let vms: Vec<VirtualMachine> = (0..host_count)
            .map(|id| VirtualMachine::new(id, id, (id + 1) as f64, 1.))
            .collect();
        summarize(&hosts, &vms, &RunTotals::default())
    }

    #[test]
    fn summary_of_twenty_hosts_uses_quantiles() {
        // utilizations 0.01 .. 0.20, the last cut is (0.19 * 1 + 0.20 * 19) / 20
        let summary = summary_of(20);
        assert_eq!(summary.util_mean_final, 0.105);
        assert_eq!(summary.util_p95_final, 0.1995);
        assert_eq!(summary.hosts_off_final, 0);
    }

    #[test]
    fn summary_of_fewer_hosts_uses_max() {
        let summary = summary_of(19);
        assert_eq!(summary.util_mean_final, 0.1);
        assert_eq!(summary.util_p95_final, 0.19);
    }

    #[test]
    fn summary_skips_powered_off_hosts() {
        let mut hosts = vec![Host::new(0, 100., 100., 120., 300.), Host::new(1, 100., 100., 120., 300.)];
        hosts[1].power_off();
        let vms = vec![VirtualMachine::new(0, 0, 40., 1.)];
        let summary = summarize(&hosts, &vms, &RunTotals::default());
        assert_eq!(summary.util_mean_final, 0.4);
        assert_eq!(summary.util_p95_final, 0.4);
        assert_eq!(summary.hosts_off_final, 1);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.78, 3), 0.78);
        assert_eq!(round_to(0.7799999999, 3), 0.78);
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(2.0, 3), 2.);
    }

    #[test]
    fn mean_of_empty_data() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.5, 0.25]), Some(0.375));
    }
}
