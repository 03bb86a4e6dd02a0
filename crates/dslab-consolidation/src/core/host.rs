//! Physical host state.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::core::common::{Allocation, AllocationVerdict};
use crate::core::power_model::PowerModel;

/// Tolerance used when comparing allocated CPU against the host capacity.
pub const CPU_EPSILON: f64 = 1e-9;

/// Stores host properties (capacity, power model) and state (current allocations, inbound migrations,
/// recent CPU utilization).
///
/// Allocations are kept in the order VMs were attached to the host. A VM migrating in has its allocation reserved
/// on the destination host while it still resides on the source host.
#[derive(Clone)]
pub struct Host {
    pub id: u32,
    pub name: String,

    cpu_total: f64,
    memory_total: u64,

    cpu_allocated: f64,
    memory_allocated: u64,

    allocations: IndexMap<u32, Allocation>,
    vms_migrating_in: IndexMap<u32, Allocation>,
    power_model: Box<dyn PowerModel>,

    utilization_history: VecDeque<f64>,
    utilization_history_length: usize,
    last_utilization_time: Option<f64>,
}

impl Host {
    pub fn new(id: u32, name: &str, cpu_total: f64, memory_total: u64, power_model: Box<dyn PowerModel>) -> Self {
        Self {
            id,
            name: name.to_string(),
            cpu_total,
            memory_total,
            cpu_allocated: 0.,
            memory_allocated: 0,
            allocations: IndexMap::new(),
            vms_migrating_in: IndexMap::new(),
            power_model,
            utilization_history: VecDeque::new(),
            utilization_history_length: 30,
            last_utilization_time: None,
        }
    }

    /// Sets the number of recent utilization samples kept for overload detection.
    pub fn set_utilization_history_length(&mut self, length: usize) {
        self.utilization_history_length = length;
        while self.utilization_history.len() > length {
            self.utilization_history.pop_front();
        }
    }

    /// Checks whether the host has enough free resources for the allocation.
    pub fn can_allocate(&self, alloc: &Allocation) -> AllocationVerdict {
        if self.allocations.contains_key(&alloc.vm_id) {
            return AllocationVerdict::AlreadyAllocated;
        }
        if self.cpu_available() + CPU_EPSILON < alloc.cpu_usage {
            return AllocationVerdict::NotEnoughCPU;
        }
        if self.memory_available() < alloc.memory_usage {
            return AllocationVerdict::NotEnoughMemory;
        }
        AllocationVerdict::Success
    }

    /// Reserves resources for the allocation if they are available.
    pub fn allocate(&mut self, alloc: Allocation) -> AllocationVerdict {
        let verdict = self.can_allocate(&alloc);
        if verdict.is_success() {
            self.force_allocate(alloc);
        }
        verdict
    }

    fn force_allocate(&mut self, alloc: Allocation) {
        self.memory_allocated += alloc.memory_usage;
        self.allocations.insert(alloc.vm_id, alloc);
        self.recompute_cpu_allocated();
    }

    // Summing in attachment order keeps the value bit-identical after a trial allocate/release pair.
    fn recompute_cpu_allocated(&mut self) {
        self.cpu_allocated = self.allocations.values().map(|alloc| alloc.cpu_usage).sum();
    }

    /// Releases resources of the specified VM, returns the removed allocation.
    pub fn release(&mut self, vm_id: u32) -> Option<Allocation> {
        let alloc = self.allocations.shift_remove(&vm_id)?;
        self.memory_allocated -= alloc.memory_usage;
        self.recompute_cpu_allocated();
        Some(alloc)
    }

    /// Releases all allocations including the ones reserved for VMs migrating in.
    pub fn release_all(&mut self) -> Vec<Allocation> {
        self.cpu_allocated = 0.;
        self.memory_allocated = 0;
        self.allocations.drain(..).map(|(_, alloc)| alloc).collect()
    }

    /// Changes the CPU allocated to the VM, returns false if the VM is not allocated on this host.
    pub(crate) fn update_cpu_allocation(&mut self, vm_id: u32, cpu_usage: f64) -> bool {
        match self.allocations.get_mut(&vm_id) {
            Some(alloc) => {
                alloc.cpu_usage = cpu_usage;
                self.recompute_cpu_allocated();
                true
            }
            None => false,
        }
    }

    /// Registers a VM migrating in and reserves its resources.
    pub(crate) fn add_migrating_in(&mut self, alloc: Allocation) -> AllocationVerdict {
        let verdict = self.allocate(alloc.clone());
        if verdict.is_success() {
            self.vms_migrating_in.insert(alloc.vm_id, alloc);
        }
        verdict
    }

    /// Unregisters a VM migrating in, its allocation stays on the host.
    pub(crate) fn remove_migrating_in(&mut self, vm_id: u32) -> bool {
        self.vms_migrating_in.shift_remove(&vm_id).is_some()
    }

    /// Re-reserves resources for all VMs migrating in (used after [`release_all`](Self::release_all)).
    pub fn reallocate_migrating_in_vms(&mut self) {
        let pending: Vec<Allocation> = self.vms_migrating_in.values().cloned().collect();
        for alloc in pending {
            if !self.allocations.contains_key(&alloc.vm_id) {
                self.force_allocate(alloc);
            }
        }
    }

    /// Returns IDs of all VMs with allocations on this host, in the order they were attached.
    pub fn vm_ids(&self) -> Vec<u32> {
        self.allocations.keys().cloned().collect()
    }

    /// Returns IDs of VMs residing on this host, i.e. excluding VMs migrating in.
    pub fn resident_vm_ids(&self) -> Vec<u32> {
        self.allocations
            .keys()
            .filter(|vm_id| !self.vms_migrating_in.contains_key(*vm_id))
            .cloned()
            .collect()
    }

    pub fn allocation(&self, vm_id: u32) -> Option<&Allocation> {
        self.allocations.get(&vm_id)
    }

    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    pub fn contains_vm(&self, vm_id: u32) -> bool {
        self.allocations.contains_key(&vm_id)
    }

    pub fn vm_count(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_migrating_in(&self, vm_id: u32) -> bool {
        self.vms_migrating_in.contains_key(&vm_id)
    }

    pub fn vms_migrating_in(&self) -> Vec<u32> {
        self.vms_migrating_in.keys().cloned().collect()
    }

    pub fn cpu_total(&self) -> f64 {
        self.cpu_total
    }

    pub fn memory_total(&self) -> u64 {
        self.memory_total
    }

    pub fn cpu_allocated(&self) -> f64 {
        self.cpu_allocated
    }

    pub fn memory_allocated(&self) -> u64 {
        self.memory_allocated
    }

    pub fn cpu_available(&self) -> f64 {
        (self.cpu_total - self.cpu_allocated).max(0.)
    }

    pub fn memory_available(&self) -> u64 {
        self.memory_total.saturating_sub(self.memory_allocated)
    }

    /// Returns the current CPU utilization (ratio of allocated to total MIPS).
    pub fn cpu_load(&self) -> f64 {
        self.cpu_allocated / self.cpu_total
    }

    /// Returns true if the host has no CPU load and is therefore considered switched off.
    pub fn is_switched_off(&self) -> bool {
        self.cpu_allocated == 0.
    }

    /// Returns the power consumption at the given CPU load. A host without load is powered off and consumes nothing.
    pub fn power_at(&self, cpu_load: f64) -> f64 {
        if cpu_load == 0. {
            return 0.;
        }
        self.power_model.get_power(cpu_load)
    }

    /// Returns the current power consumption.
    pub fn get_power(&self) -> f64 {
        self.power_at(self.cpu_load())
    }

    pub fn max_power(&self) -> f64 {
        self.power_model.max_power()
    }

    /// Returns the power headroom: rated maximum minus the current consumption.
    pub fn available_power(&self) -> f64 {
        self.max_power() - self.get_power()
    }

    /// Appends the current CPU utilization to the bounded utilization history.
    /// At most one sample is kept per timestamp.
    pub(crate) fn record_utilization(&mut self, time: f64) {
        if self.utilization_history_length == 0 || self.last_utilization_time == Some(time) {
            return;
        }
        self.last_utilization_time = Some(time);
        if self.utilization_history.len() == self.utilization_history_length {
            self.utilization_history.pop_front();
        }
        self.utilization_history.push_back(self.cpu_load());
    }

    /// Returns recent CPU utilization samples, oldest first.
    pub fn utilization_history(&self) -> Vec<f64> {
        self.utilization_history.iter().cloned().collect()
    }
}
