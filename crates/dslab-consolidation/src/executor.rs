//! Execution of planned migrations and shutdown of idle hosts.

use std::collections::BTreeSet;

use crate::context::CycleContext;
use crate::host::Host;
use crate::planner::Migration;
use crate::vm::VirtualMachine;
use crate::{log_info, log_warn};

/// Applies migrations and powers off hosts left without VMs.
///
/// Migration is pure bookkeeping: VM is reassigned to the target host instantly and without cost.
#[derive(Clone, Debug, Default)]
pub struct MigrationExecutor;

impl MigrationExecutor {
    pub fn new() -> Self {
        Self {}
    }

    /// Reassigns VMs according to the plan. Returns the number of applied migrations.
    ///
    /// VMs are looked up by ID, which must match their position in `vms`.
    pub fn apply(&self, ctx: &CycleContext, vms: &mut [VirtualMachine], plan: &[Migration]) -> u64 {
        let mut applied = 0;
        for migration in plan {
            match vms.get_mut(migration.vm_id as usize) {
                Some(vm) if vm.id == migration.vm_id => {
                    vm.set_host(migration.target_host);
                    applied += 1;
                }
                _ => {
                    log_warn!(ctx, "cannot migrate unknown vm {}", migration.vm_id);
                }
            }
        }
        applied
    }

    /// Powers off every powered on host which has no VMs. Returns IDs of hosts turned off.
    pub fn shutdown_idle_hosts(&self, ctx: &CycleContext, hosts: &mut [Host], vms: &[VirtualMachine]) -> Vec<u32> {
        let occupied: BTreeSet<u32> = vms.iter().map(|vm| vm.host_id()).collect();
        let mut turned_off = Vec::new();
        for host in hosts.iter_mut().filter(|h| h.is_on()) {
            if !occupied.contains(&host.id) && host.power_off() {
                log_info!(ctx, "host {} has no vms and is turned off", host.id);
                turned_off.push(host.id);
            }
        }
        turned_off
    }
}
