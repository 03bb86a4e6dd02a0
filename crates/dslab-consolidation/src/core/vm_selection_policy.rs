//! Policies choosing which VM leaves an overloaded host.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::options::{option_or, parse_config_value, parse_optional_options};
use crate::core::datacenter::Datacenter;
use crate::core::vm_selection_policies::minimum_migration_time::MinimumMigrationTime;
use crate::core::vm_selection_policies::minimum_utilization::MinimumUtilization;
use crate::core::vm_selection_policies::random_selection::RandomSelection;

/// Trait for implementation of VM selection policies.
///
/// The policy is called repeatedly for the same host while the optimizer detaches the returned VMs,
/// so it must return only VMs still residing on the host. Returns `None` when nothing should be evicted.
pub trait VmSelectionPolicy: DynClone {
    fn select_vm(&mut self, host_id: u32, dc: &Datacenter) -> Option<u32>;
}

clone_trait_object!(VmSelectionPolicy);

pub fn vm_selection_resolver(config_str: &str) -> Box<dyn VmSelectionPolicy> {
    let (policy_name, options_str) = parse_config_value(config_str);
    let options = parse_optional_options(&options_str);
    match policy_name.as_str() {
        "MinimumMigrationTime" => Box::new(MinimumMigrationTime::new()),
        "MinimumUtilization" => Box::new(MinimumUtilization::new()),
        "RandomSelection" => Box::new(RandomSelection::new(option_or(&options, "seed", 123))),
        _ => panic!("Can't resolve: {}", config_str),
    }
}

/// Returns VMs residing on the host which are not being migrated, in attachment order.
pub fn migratable_vms(host_id: u32, dc: &Datacenter) -> Vec<u32> {
    match dc.get_host(host_id) {
        Some(host) => host
            .resident_vm_ids()
            .into_iter()
            .filter(|vm_id| dc.get_vm(*vm_id).map_or(false, |vm| !vm.is_in_migration()))
            .collect(),
        None => Vec::new(),
    }
}
