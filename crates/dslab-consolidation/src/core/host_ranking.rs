//! Destination host selection for migrating VMs.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::common::AllocationVerdict;
use crate::core::config::options::parse_config_value;
use crate::core::datacenter::Datacenter;
use crate::core::host_ranking_strategies::first_fit_available_power::FirstFitAvailablePower;
use crate::core::host_ranking_strategies::power_delta_fit::{Extremum, PowerDeltaFit};
use crate::core::utilization_classifier::UtilizationClassifier;

/// Estimated power consumption of a host if the VM was placed on it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerEstimate {
    pub power_before: f64,
    pub power_after: f64,
}

impl PowerEstimate {
    pub fn delta(&self) -> f64 {
        self.power_after - self.power_before
    }
}

/// Checks whether the VM can be placed on the host and estimates the resulting power consumption.
///
/// The host is feasible if it has enough free resources and is not overloaded after placing the VM. The overload check
/// is skipped for hosts without load, so that empty hosts can always be used. Nothing is changed in the datacenter.
pub fn try_place(
    vm_id: u32,
    host_id: u32,
    dc: &mut Datacenter,
    classifier: &dyn UtilizationClassifier,
) -> Result<PowerEstimate, AllocationVerdict> {
    let alloc = dc.requested_allocation(vm_id).ok_or(AllocationVerdict::VmNotFound)?;
    let host = dc.get_host(host_id).ok_or(AllocationVerdict::HostNotFound)?;
    let verdict = host.can_allocate(&alloc);
    if !verdict.is_success() {
        return Err(verdict);
    }
    let power_before = host.get_power();
    let power_after = host.power_at((host.cpu_allocated() + alloc.cpu_usage) / host.cpu_total());
    if host.cpu_allocated() != 0. {
        let overloaded = dc.with_trial_allocation(host_id, alloc, |host| classifier.is_overloaded(host))?;
        if overloaded {
            return Err(AllocationVerdict::Overloaded);
        }
    }
    Ok(PowerEstimate {
        power_before,
        power_after,
    })
}

/// Trait for implementation of host ranking strategies.
///
/// The strategy returns the destination host for the VM among the candidate hosts or `None` if no candidate is
/// feasible. Candidates are given in the datacenter host order.
pub trait HostRankingStrategy: DynClone {
    fn select_host(
        &self,
        vm_id: u32,
        candidates: &[u32],
        dc: &mut Datacenter,
        classifier: &dyn UtilizationClassifier,
    ) -> Option<u32>;
}

clone_trait_object!(HostRankingStrategy);

pub fn ranking_strategy_resolver(config_str: &str) -> Box<dyn HostRankingStrategy> {
    let (strategy_name, _) = parse_config_value(config_str);
    match strategy_name.as_str() {
        "MinPowerIncrease" => Box::new(PowerDeltaFit::new(Extremum::Min)),
        "MaxPowerIncrease" => Box::new(PowerDeltaFit::new(Extremum::Max)),
        "FirstFitAvailablePower" => Box::new(FirstFitAvailablePower::new()),
        _ => panic!("Can't resolve: {}", config_str),
    }
}
