//! Saving and restoring of VM placement around trial mutations.

use crate::core::common::AllocationPair;
use crate::core::datacenter::Datacenter;
use crate::log_error;

/// Placement of VMs residing on hosts, excluding VMs migrating in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationSnapshot {
    entries: Vec<AllocationPair>,
}

impl AllocationSnapshot {
    pub fn capture(dc: &Datacenter) -> Self {
        let mut entries = Vec::new();
        for host in dc.hosts() {
            for alloc in host.allocations() {
                if host.is_migrating_in(alloc.vm_id) {
                    continue;
                }
                entries.push(AllocationPair {
                    host_id: host.id,
                    allocation: alloc.clone(),
                });
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[AllocationPair] {
        &self.entries
    }

    /// Detaches everything from all hosts, re-reserves VMs migrating in and re-attaches the saved placement.
    ///
    /// # Panics
    ///
    /// Panics if a saved allocation can not be re-attached, since the datacenter state is then corrupted.
    pub fn restore(&self, dc: &mut Datacenter) {
        for host_id in dc.host_ids() {
            dc.detach_all(host_id);
            dc.reattach_pending_inbound(host_id);
        }
        let ctx = dc.create_context("snapshot");
        for entry in &self.entries {
            let verdict = dc.attach_allocation(entry.host_id, entry.allocation.clone());
            if !verdict.is_success() {
                log_error!(
                    ctx,
                    "couldn't restore vm #{} on host #{}: {:?}",
                    entry.allocation.vm_id,
                    entry.host_id,
                    verdict
                );
                panic!(
                    "Can't restore vm #{} on host #{}: {:?}",
                    entry.allocation.vm_id, entry.host_id, verdict
                );
            }
        }
    }
}
