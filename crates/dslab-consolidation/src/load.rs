//! Predicted load of powered on hosts.

use std::collections::btree_map::Iter;
use std::collections::BTreeMap;

use crate::host::Host;
use crate::vm::VirtualMachine;

/// Sum of predicted usage of VMs placed on a host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HostLoad {
    pub cpu: f64,
    pub memory: f64,
}

/// Predicted CPU and memory load of every powered on host.
///
/// Hosts which are off are not tracked, VMs referencing them do not contribute to any load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostLoads {
    loads: BTreeMap<u32, HostLoad>,
}

impl HostLoads {
    /// Computes loads of powered on hosts from the current VM predictions.
    pub fn predicted(hosts: &[Host], vms: &[VirtualMachine]) -> Self {
        let mut loads: BTreeMap<u32, HostLoad> =
            hosts.iter().filter(|h| h.is_on()).map(|h| (h.id, HostLoad::default())).collect();
        for vm in vms {
            if let Some(load) = loads.get_mut(&vm.host_id()) {
                load.cpu += vm.predicted_cpu();
                load.memory += vm.predicted_memory();
            }
        }
        Self { loads }
    }

    /// Returns load of the specified host or `None` if the host is not tracked.
    pub fn get(&self, host_id: u32) -> Option<HostLoad> {
        self.loads.get(&host_id).copied()
    }

    /// Adds usage to the load of the specified host, if the host is tracked.
    pub fn add(&mut self, host_id: u32, cpu: f64, memory: f64) {
        if let Some(load) = self.loads.get_mut(&host_id) {
            load.cpu += cpu;
            load.memory += memory;
        }
    }

    /// Returns an iterator of IDs and loads of tracked hosts in ascending ID order.
    pub fn iter(&self) -> Iter<'_, u32, HostLoad> {
        self.loads.iter()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }
}
