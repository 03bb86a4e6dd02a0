//! Representation of virtual machine.

use crate::core::load_model::LoadModel;

/// Represents virtual machine (VM).
///
/// VM is characterized by its ID and requested resources (CPU in MIPS and memory in MB). The load model defines which
/// fraction of the requested CPU is actually demanded at the moment, so the current demand fluctuates over time.
#[derive(Clone)]
pub struct VirtualMachine {
    pub id: u32,
    pub cpu_usage: f64,
    pub memory_usage: u64,
    in_migration: bool,
    cpu_load_model: Box<dyn LoadModel>,
}

impl VirtualMachine {
    pub fn new(id: u32, cpu_usage: f64, memory_usage: u64, cpu_load_model: Box<dyn LoadModel>) -> Self {
        Self {
            id,
            cpu_usage,
            memory_usage,
            in_migration: false,
            cpu_load_model,
        }
    }

    /// Returns true if the VM is currently being migrated between hosts.
    pub fn is_in_migration(&self) -> bool {
        self.in_migration
    }

    pub(crate) fn set_in_migration(&mut self, in_migration: bool) {
        self.in_migration = in_migration;
    }

    /// Returns the current CPU load of VM as a fraction of the requested CPU.
    pub fn get_cpu_load(&self, time: f64) -> f64 {
        self.cpu_load_model.get_resource_load(time).clamp(0., 1.)
    }

    /// Returns the CPU currently demanded by VM in MIPS.
    pub fn current_requested_mips(&self, time: f64) -> f64 {
        self.cpu_usage * self.get_cpu_load(time)
    }
}
