//! Minimum utilization selection.

use crate::core::datacenter::Datacenter;
use crate::core::vm_selection_policy::{migratable_vms, VmSelectionPolicy};

/// Selects VM with the smallest CPU currently allocated on the host.
#[derive(Clone, Default)]
pub struct MinimumUtilization;

impl MinimumUtilization {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmSelectionPolicy for MinimumUtilization {
    fn select_vm(&mut self, host_id: u32, dc: &Datacenter) -> Option<u32> {
        let host = dc.get_host(host_id)?;
        let mut result: Option<u32> = None;
        let mut min_cpu = f64::INFINITY;
        for vm_id in migratable_vms(host_id, dc) {
            let cpu = host.allocation(vm_id).map_or(0., |alloc| alloc.cpu_usage);
            if cpu < min_cpu {
                min_cpu = cpu;
                result = Some(vm_id);
            }
        }
        result
    }
}
