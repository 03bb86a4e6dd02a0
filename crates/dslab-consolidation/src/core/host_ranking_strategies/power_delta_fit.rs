//! Best fit and worst fit by power increase.

use crate::core::datacenter::Datacenter;
use crate::core::host_ranking::{try_place, HostRankingStrategy};
use crate::core::utilization_classifier::UtilizationClassifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Selects the feasible host with the minimal (best fit) or maximal (worst fit) power increase
/// caused by the VM placement. Among equal candidates the first one wins.
#[derive(Clone)]
pub struct PowerDeltaFit {
    extremum: Extremum,
}

impl PowerDeltaFit {
    pub fn new(extremum: Extremum) -> Self {
        Self { extremum }
    }

    fn is_better(&self, delta: f64, best: f64) -> bool {
        match self.extremum {
            Extremum::Min => delta < best,
            Extremum::Max => delta > best,
        }
    }
}

impl HostRankingStrategy for PowerDeltaFit {
    fn select_host(
        &self,
        vm_id: u32,
        candidates: &[u32],
        dc: &mut Datacenter,
        classifier: &dyn UtilizationClassifier,
    ) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut best_delta = match self.extremum {
            Extremum::Min => f64::INFINITY,
            Extremum::Max => f64::NEG_INFINITY,
        };
        for &host_id in candidates {
            if let Ok(estimate) = try_place(vm_id, host_id, dc, classifier) {
                if self.is_better(estimate.delta(), best_delta) {
                    best_delta = estimate.delta();
                    result = Some(host_id);
                }
            }
        }
        result
    }
}
