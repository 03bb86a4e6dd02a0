//! First fit decreasing by available power.

use std::cmp::Ordering;

use crate::core::datacenter::Datacenter;
use crate::core::host_ranking::{try_place, HostRankingStrategy};
use crate::core::utilization_classifier::UtilizationClassifier;

/// Orders hosts by available power (rated maximum minus current consumption), the largest first,
/// and returns the first feasible host which stays below its rated maximum power after the placement.
#[derive(Clone, Default)]
pub struct FirstFitAvailablePower;

impl FirstFitAvailablePower {
    pub fn new() -> Self {
        Self {}
    }
}

impl HostRankingStrategy for FirstFitAvailablePower {
    fn select_host(
        &self,
        vm_id: u32,
        candidates: &[u32],
        dc: &mut Datacenter,
        classifier: &dyn UtilizationClassifier,
    ) -> Option<u32> {
        let mut ordered: Vec<(u32, f64)> = candidates
            .iter()
            .map(|&host_id| (host_id, dc.host(host_id).available_power()))
            .collect();
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        for (host_id, _) in ordered {
            if let Ok(estimate) = try_place(vm_id, host_id, dc, classifier) {
                if estimate.power_after < dc.host(host_id).max_power() {
                    return Some(host_id);
                }
            }
        }
        None
    }
}
