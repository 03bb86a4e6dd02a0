use serde::Serialize;

/// Resources reserved for a single VM on a host.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Allocation {
    pub vm_id: u32,
    /// Allocated CPU in MIPS.
    pub cpu_usage: f64,
    /// Allocated memory in MB.
    pub memory_usage: u64,
}

/// Outcome of checking or applying a placement of VM on host.
///
/// Infeasible placements are reported with this value instead of being raised as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationVerdict {
    NotEnoughCPU,
    NotEnoughMemory,
    Success,
    HostNotFound,
    VmNotFound,
    AlreadyAllocated,
    /// The host would be classified as over-utilized after the placement.
    Overloaded,
}

impl AllocationVerdict {
    pub fn is_success(&self) -> bool {
        *self == AllocationVerdict::Success
    }
}

/// Single decision of a migration plan: move VM to the destination host.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationEntry {
    pub vm_id: u32,
    pub host_id: u32,
}

/// Ordered list of migration decisions produced by one optimization pass.
pub type MigrationPlan = Vec<MigrationEntry>;

/// Actual (pre-optimization) assignment of VM to host captured by allocation snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationPair {
    pub host_id: u32,
    pub allocation: Allocation,
}
