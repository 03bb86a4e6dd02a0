//! Minimum migration time selection.

use crate::core::datacenter::Datacenter;
use crate::core::vm_selection_policy::{migratable_vms, VmSelectionPolicy};

/// Selects VM with the smallest memory footprint, which is the fastest one to migrate.
#[derive(Clone, Default)]
pub struct MinimumMigrationTime;

impl MinimumMigrationTime {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmSelectionPolicy for MinimumMigrationTime {
    fn select_vm(&mut self, host_id: u32, dc: &Datacenter) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_memory = u64::MAX;
        for vm_id in migratable_vms(host_id, dc) {
            let memory = dc.vm(vm_id).memory_usage;
            if memory < min_memory {
                min_memory = memory;
                result = Some(vm_id);
            }
        }
        result
    }
}
