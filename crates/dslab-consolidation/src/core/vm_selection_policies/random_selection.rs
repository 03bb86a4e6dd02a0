//! Random selection.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::datacenter::Datacenter;
use crate::core::vm_selection_policy::{migratable_vms, VmSelectionPolicy};

/// Selects uniformly random migratable VM. The generator is seeded, so runs are reproducible.
#[derive(Clone)]
pub struct RandomSelection {
    rand: Pcg64,
}

impl RandomSelection {
    pub fn new(seed: u64) -> Self {
        Self {
            rand: Pcg64::seed_from_u64(seed),
        }
    }
}

impl VmSelectionPolicy for RandomSelection {
    fn select_vm(&mut self, host_id: u32, dc: &Datacenter) -> Option<u32> {
        migratable_vms(host_id, dc).choose(&mut self.rand).cloned()
    }
}
