//! Consolidation planner, which proposes migrations of lightly loaded VMs.

use std::cmp::Ordering;

use serde::Serialize;

use crate::context::CycleContext;
use crate::host::Host;
use crate::load::{HostLoad, HostLoads};
use crate::vm::VirtualMachine;
use crate::{log_debug, log_info};

/// Planned move of VM between hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub vm_id: u32,
    pub source_host: u32,
    pub target_host: u32,
}

/// Result of planning: the number of considered candidates and migrations in the order they were planned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationPlan {
    pub candidates: usize,
    pub migrations: Vec<Migration>,
}

/// Checks whether VM fits on the host with given load without exceeding `target_util` fraction of host capacity.
pub fn fits(vm: &VirtualMachine, host: &Host, load: HostLoad, target_util: f64) -> bool {
    load.cpu + vm.predicted_cpu() <= host.cpu_capacity * target_util
        && load.memory + vm.predicted_memory() <= host.memory_capacity * target_util
}

/// Trait for implementation of VM placement algorithms used by planner.
///
/// The algorithm is defined as a function of VM, powered on hosts (in ascending ID order) and their current predicted
/// loads, which returns an ID of host selected for VM or `None` if there is no suitable host.
/// The returned host may be the one VM is currently placed on.
pub trait PlacementAlgorithm {
    fn select_host(&self, vm: &VirtualMachine, hosts: &[&Host], loads: &HostLoads, target_util: f64) -> Option<u32>;
}

/// Uses the first suitable host.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for FirstFit {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementAlgorithm for FirstFit {
    fn select_host(&self, vm: &VirtualMachine, hosts: &[&Host], loads: &HostLoads, target_util: f64) -> Option<u32> {
        hosts
            .iter()
            .find(|host| fits(vm, host, loads.get(host.id).unwrap_or_default(), target_util))
            .map(|host| host.id)
    }
}

/// Greedy single pass planner.
///
/// VMs with predicted CPU usage not above the low usage threshold are considered in descending order of predicted CPU
/// usage. Each of them is assigned to a host selected by placement algorithm, and the load of selected host is updated
/// immediately so that subsequent VMs see it. Moves to the current host of VM are not recorded.
pub struct ConsolidationPlanner {
    low_usage_threshold: f64,
    algorithm: Box<dyn PlacementAlgorithm>,
}

impl ConsolidationPlanner {
    /// Creates planner using First Fit placement.
    pub fn new(low_usage_threshold: f64) -> Self {
        Self::with_algorithm(low_usage_threshold, Box::new(FirstFit::new()))
    }

    pub fn with_algorithm(low_usage_threshold: f64, algorithm: Box<dyn PlacementAlgorithm>) -> Self {
        Self {
            low_usage_threshold,
            algorithm,
        }
    }

    /// Returns migration candidates sorted by predicted CPU usage in descending order
    /// (VMs with equal usage keep their relative order).
    pub fn select_candidates<'a>(&self, vms: &'a [VirtualMachine]) -> Vec<&'a VirtualMachine> {
        let mut candidates: Vec<&VirtualMachine> = vms
            .iter()
            .filter(|vm| vm.predicted_cpu() <= self.low_usage_threshold)
            .collect();
        candidates.sort_by(|a, b| {
            b.predicted_cpu()
                .partial_cmp(&a.predicted_cpu())
                .unwrap_or(Ordering::Equal)
        });
        candidates
    }

    /// Plans migrations to powered on hosts. VM state is not changed.
    pub fn plan(&self, ctx: &CycleContext, hosts: &[Host], vms: &[VirtualMachine], target_util: f64) -> MigrationPlan {
        let on_hosts: Vec<&Host> = hosts.iter().filter(|h| h.is_on()).collect();
        let mut loads = HostLoads::predicted(hosts, vms);
        let candidates = self.select_candidates(vms);
        log_debug!(
            ctx,
            "{} candidates for migration, {} hosts are on, target utilization {}",
            candidates.len(),
            on_hosts.len(),
            target_util
        );

        let mut migrations = Vec::new();
        for vm in candidates.iter() {
            match self.algorithm.select_host(vm, &on_hosts, &loads, target_util) {
                Some(target_host) if target_host != vm.host_id() => {
                    log_info!(
                        ctx,
                        "migrate vm {} from host {} to host {}",
                        vm.id,
                        vm.host_id(),
                        target_host
                    );
                    loads.add(target_host, vm.predicted_cpu(), vm.predicted_memory());
                    migrations.push(Migration {
                        vm_id: vm.id,
                        source_host: vm.host_id(),
                        target_host,
                    });
                }
                Some(_) => {}
                None => {
                    log_debug!(ctx, "no suitable target to migrate vm {} from host {}", vm.id, vm.host_id());
                }
            }
        }

        MigrationPlan {
            candidates: candidates.len(),
            migrations,
        }
    }
}
