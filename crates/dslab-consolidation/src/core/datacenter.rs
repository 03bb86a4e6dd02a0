//! In-memory datacenter: the host/VM substrate the migration optimizer works on.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use indexmap::IndexMap;
use sugars::{cell, rc};

use crate::context::SimulationContext;
use crate::core::common::{Allocation, AllocationVerdict, MigrationEntry};
use crate::core::config::ConsolidationConfig;
use crate::core::host::Host;
use crate::core::load_model::{load_model_resolver, LoadModel};
use crate::core::power_model::{power_model_resolver, PowerModel};
use crate::core::vm::VirtualMachine;
use crate::{log_debug, log_trace, log_warn};

/// Owns hosts, VMs and the current VM placement, and provides the lifecycle operations used by the optimizer:
/// trial attach/detach of VMs, host clean-up and re-attachment of VMs migrating in.
///
/// Each VM resides on at most one host. While a migration is in progress the VM still resides on its source host
/// and its resources are additionally reserved on the destination host.
pub struct Datacenter {
    clock: Rc<Cell<f64>>,
    ctx: SimulationContext,
    hosts: IndexMap<u32, Host>,
    vms: BTreeMap<u32, VirtualMachine>,
    placement: HashMap<u32, u32>,
    migrations: BTreeMap<u32, u32>,
    utilization_history_length: usize,
    next_host_id: u32,
    next_vm_id: u32,
}

impl Datacenter {
    /// Creates empty datacenter with the clock set to zero.
    pub fn new() -> Self {
        let clock = rc!(cell!(0.));
        let ctx = SimulationContext::new("datacenter", clock.clone());
        Self {
            clock,
            ctx,
            hosts: IndexMap::new(),
            vms: BTreeMap::new(),
            placement: HashMap::new(),
            migrations: BTreeMap::new(),
            utilization_history_length: 30,
            next_host_id: 0,
            next_vm_id: 0,
        }
    }

    /// Creates datacenter with hosts described in the config.
    pub fn from_config(config: &ConsolidationConfig) -> Self {
        let mut dc = Self::new();
        dc.set_utilization_history_length(config.utilization_history_length);
        for host_config in &config.hosts {
            let count = host_config.count.unwrap_or(1);
            for i in 0..count {
                let name = match (&host_config.name, &host_config.name_prefix) {
                    (Some(name), _) if count == 1 => name.clone(),
                    (_, Some(prefix)) => format!("{}{}", prefix, i + 1),
                    (Some(name), None) => format!("{}{}", name, i + 1),
                    (None, None) => format!("host{}", dc.next_host_id),
                };
                let power_model = power_model_resolver(&host_config.power_model);
                dc.add_host(&name, host_config.cpus, host_config.memory, power_model);
            }
        }
        for vm_config in &config.vms {
            for _ in 0..vm_config.count.unwrap_or(1) {
                let load_model = load_model_resolver(&vm_config.load_model);
                let vm_id = dc.add_vm(vm_config.cpu_usage, vm_config.memory, load_model);
                if let Some(host_name) = &vm_config.host {
                    match dc.host_by_name(host_name).map(|host| host.id) {
                        Some(host_id) => {
                            dc.place_vm(vm_id, host_id);
                        }
                        None => log_warn!(dc.ctx, "unknown host {} for vm #{}", host_name, vm_id),
                    }
                }
            }
        }
        dc
    }

    /// Creates a context for a component sharing the datacenter clock.
    pub fn create_context(&self, name: &str) -> SimulationContext {
        SimulationContext::new(name, self.clock.clone())
    }

    pub fn current_time(&self) -> f64 {
        self.clock.get()
    }

    /// Advances the clock. Time never goes backwards.
    pub fn set_time(&mut self, time: f64) {
        if time < self.clock.get() {
            log_warn!(self.ctx, "ignoring attempt to move clock back to {:.3}", time);
            return;
        }
        self.clock.set(time);
    }

    /// Sets the number of utilization samples each host keeps for overload detection.
    pub fn set_utilization_history_length(&mut self, length: usize) {
        self.utilization_history_length = length;
        for host in self.hosts.values_mut() {
            host.set_utilization_history_length(length);
        }
    }

    pub fn add_host(&mut self, name: &str, cpu_total: f64, memory_total: u64, power_model: Box<dyn PowerModel>) -> u32 {
        let id = self.next_host_id;
        self.next_host_id += 1;
        let mut host = Host::new(id, name, cpu_total, memory_total, power_model);
        host.set_utilization_history_length(self.utilization_history_length);
        self.hosts.insert(id, host);
        id
    }

    pub fn add_vm(&mut self, cpu_usage: f64, memory_usage: u64, cpu_load_model: Box<dyn LoadModel>) -> u32 {
        let id = self.next_vm_id;
        self.next_vm_id += 1;
        self.vms
            .insert(id, VirtualMachine::new(id, cpu_usage, memory_usage, cpu_load_model));
        id
    }

    pub fn host(&self, host_id: u32) -> &Host {
        &self.hosts[&host_id]
    }

    pub fn get_host(&self, host_id: u32) -> Option<&Host> {
        self.hosts.get(&host_id)
    }

    /// Returns hosts in the order they were added.
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_ids(&self) -> Vec<u32> {
        self.hosts.keys().cloned().collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn host_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts.values().find(|host| host.name == name)
    }

    pub fn vm(&self, vm_id: u32) -> &VirtualMachine {
        &self.vms[&vm_id]
    }

    pub fn get_vm(&self, vm_id: u32) -> Option<&VirtualMachine> {
        self.vms.get(&vm_id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn vm_ids(&self) -> Vec<u32> {
        self.vms.keys().cloned().collect()
    }

    /// Returns the host where VM currently resides.
    pub fn vm_host(&self, vm_id: u32) -> Option<u32> {
        self.placement.get(&vm_id).cloned()
    }

    /// Returns the allocation VM would request on a host at the current time.
    pub fn requested_allocation(&self, vm_id: u32) -> Option<Allocation> {
        let vm = self.vms.get(&vm_id)?;
        Some(Allocation {
            vm_id,
            cpu_usage: vm.current_requested_mips(self.current_time()),
            memory_usage: vm.memory_usage,
        })
    }

    /// Attaches the VM to the host using its current CPU demand.
    ///
    /// Fails if the VM already resides on some host or the host lacks resources.
    pub fn try_attach(&mut self, vm_id: u32, host_id: u32) -> AllocationVerdict {
        match self.requested_allocation(vm_id) {
            Some(alloc) => self.attach_allocation(host_id, alloc),
            None => AllocationVerdict::VmNotFound,
        }
    }

    /// Attaches the VM to the host with exactly the given allocation.
    pub fn attach_allocation(&mut self, host_id: u32, alloc: Allocation) -> AllocationVerdict {
        if !self.vms.contains_key(&alloc.vm_id) {
            return AllocationVerdict::VmNotFound;
        }
        if self.placement.contains_key(&alloc.vm_id) {
            return AllocationVerdict::AlreadyAllocated;
        }
        let vm_id = alloc.vm_id;
        let verdict = match self.hosts.get_mut(&host_id) {
            Some(host) => host.allocate(alloc),
            None => AllocationVerdict::HostNotFound,
        };
        if verdict.is_success() {
            self.placement.insert(vm_id, host_id);
        }
        log_trace!(self.ctx, "attach vm #{} to host #{}: {:?}", vm_id, host_id, verdict);
        verdict
    }

    /// Temporarily allocates resources on the host, runs the probe against the modified host and releases them.
    ///
    /// The host state after the call is identical to the state before it, whatever the probe returns.
    pub fn with_trial_allocation<R>(
        &mut self,
        host_id: u32,
        alloc: Allocation,
        probe: impl FnOnce(&Host) -> R,
    ) -> Result<R, AllocationVerdict> {
        let host = self.hosts.get_mut(&host_id).ok_or(AllocationVerdict::HostNotFound)?;
        let vm_id = alloc.vm_id;
        let verdict = host.allocate(alloc);
        if !verdict.is_success() {
            return Err(verdict);
        }
        let result = probe(host);
        host.release(vm_id);
        Ok(result)
    }

    /// Detaches the VM from the host, returns the released allocation.
    pub fn detach(&mut self, vm_id: u32, host_id: u32) -> Option<Allocation> {
        let alloc = self.hosts.get_mut(&host_id)?.release(vm_id)?;
        if self.placement.get(&vm_id) == Some(&host_id) {
            self.placement.remove(&vm_id);
        }
        log_trace!(self.ctx, "detach vm #{} from host #{}", vm_id, host_id);
        Some(alloc)
    }

    /// Detaches all VMs from the host, including the reservations of VMs migrating in.
    pub fn detach_all(&mut self, host_id: u32) {
        if let Some(host) = self.hosts.get_mut(&host_id) {
            for alloc in host.release_all() {
                if self.placement.get(&alloc.vm_id) == Some(&host_id) {
                    self.placement.remove(&alloc.vm_id);
                }
            }
        }
    }

    /// Restores the reservations of VMs migrating in to the host.
    pub fn reattach_pending_inbound(&mut self, host_id: u32) {
        if let Some(host) = self.hosts.get_mut(&host_id) {
            host.reallocate_migrating_in_vms();
        }
    }

    /// Places a new VM on the host.
    pub fn place_vm(&mut self, vm_id: u32, host_id: u32) -> AllocationVerdict {
        let verdict = self.try_attach(vm_id, host_id);
        if verdict.is_success() {
            log_debug!(self.ctx, "vm #{} placed on host #{}", vm_id, host_id);
        } else {
            log_debug!(self.ctx, "failed to place vm #{} on host #{}: {:?}", vm_id, host_id, verdict);
        }
        verdict
    }

    /// Advances the clock to `time`, refreshes CPU allocations of resident VMs from their load models
    /// and records host utilization samples.
    ///
    /// When VMs demand more CPU than the host has, the capacity is shared proportionally to the demand.
    pub fn update_loads(&mut self, time: f64) {
        self.set_time(time);
        let time = self.current_time();
        for host in self.hosts.values_mut() {
            let demands: Vec<(u32, f64)> = host
                .resident_vm_ids()
                .into_iter()
                .map(|vm_id| (vm_id, self.vms[&vm_id].current_requested_mips(time)))
                .collect();
            for (vm_id, _) in &demands {
                host.update_cpu_allocation(*vm_id, 0.);
            }
            let total_demand: f64 = demands.iter().map(|(_, demand)| demand).sum();
            let capacity = host.cpu_available();
            let scale = if total_demand > capacity && total_demand > 0. {
                capacity / total_demand
            } else {
                1.
            };
            for (vm_id, demand) in demands {
                host.update_cpu_allocation(vm_id, demand * scale);
            }
            host.record_utilization(time);
        }
    }

    /// Starts migration of the VM to the target host by reserving its resources there.
    pub fn start_migration(&mut self, vm_id: u32, target_host: u32) -> AllocationVerdict {
        let source_host = match self.vm_host(vm_id) {
            Some(host_id) => host_id,
            None => return AllocationVerdict::VmNotFound,
        };
        if source_host == target_host || self.vms[&vm_id].is_in_migration() {
            return AllocationVerdict::AlreadyAllocated;
        }
        let alloc = match self.requested_allocation(vm_id) {
            Some(alloc) => alloc,
            None => return AllocationVerdict::VmNotFound,
        };
        let verdict = match self.hosts.get_mut(&target_host) {
            Some(host) => host.add_migrating_in(alloc),
            None => AllocationVerdict::HostNotFound,
        };
        if verdict.is_success() {
            if let Some(vm) = self.vms.get_mut(&vm_id) {
                vm.set_in_migration(true);
            }
            self.migrations.insert(vm_id, target_host);
            log_debug!(
                self.ctx,
                "migration of vm #{} from host #{} to host #{} started",
                vm_id,
                source_host,
                target_host
            );
        } else {
            log_debug!(
                self.ctx,
                "migration of vm #{} to host #{} rejected: {:?}",
                vm_id,
                target_host,
                verdict
            );
        }
        verdict
    }

    /// Completes the migration of the VM: releases the source host and makes the target host its new home.
    pub fn finish_migration(&mut self, vm_id: u32) -> bool {
        let target_host = match self.migrations.remove(&vm_id) {
            Some(host_id) => host_id,
            None => return false,
        };
        if let Some(source_host) = self.vm_host(vm_id) {
            self.detach(vm_id, source_host);
        }
        if let Some(host) = self.hosts.get_mut(&target_host) {
            host.remove_migrating_in(vm_id);
        }
        self.placement.insert(vm_id, target_host);
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.set_in_migration(false);
        }
        log_debug!(self.ctx, "vm #{} migrated to host #{}", vm_id, target_host);
        true
    }

    /// Completes all migrations in progress.
    pub fn finish_migrations(&mut self) -> usize {
        let pending: Vec<u32> = self.migrations.keys().cloned().collect();
        pending.into_iter().filter(|vm_id| self.finish_migration(*vm_id)).count()
    }

    /// Returns the migrations in progress as (VM, target host) pairs.
    pub fn migrations_in_progress(&self) -> Vec<(u32, u32)> {
        self.migrations.iter().map(|(vm_id, host_id)| (*vm_id, *host_id)).collect()
    }

    /// Starts migrations for all entries of the plan, returns the number of started migrations.
    pub fn apply_plan(&mut self, plan: &[MigrationEntry]) -> usize {
        plan.iter()
            .filter(|entry| self.start_migration(entry.vm_id, entry.host_id).is_success())
            .count()
    }

    /// Returns the current total power consumption of all hosts.
    pub fn total_power(&self) -> f64 {
        self.hosts.values().map(|host| host.get_power()).sum()
    }

    /// Returns the number of hosts with non-zero load.
    pub fn active_host_count(&self) -> usize {
        self.hosts.values().filter(|host| !host.is_switched_off()).count()
    }
}

impl Default for Datacenter {
    fn default() -> Self {
        Self::new()
    }
}
