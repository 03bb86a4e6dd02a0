//! Migration optimizer: builds VM migration plan from the current datacenter state.

use std::collections::HashSet;
use std::time::Instant;

use crate::context::SimulationContext;
use crate::core::clustering::VmClusterer;
use crate::core::common::{Allocation, MigrationEntry, MigrationPlan};
use crate::core::config::ConsolidationConfig;
use crate::core::datacenter::Datacenter;
use crate::core::history::{HistoryRecorder, PhaseTimings};
use crate::core::host::Host;
use crate::core::host_ranking::{ranking_strategy_resolver, HostRankingStrategy};
use crate::core::host_ranking_strategies::first_fit_available_power::FirstFitAvailablePower;
use crate::core::snapshot::AllocationSnapshot;
use crate::core::utilization_classifier::{classifier_resolver, UtilizationClassifier};
use crate::core::vm_selection_policy::{migratable_vms, vm_selection_resolver, VmSelectionPolicy};
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DrainState {
    Scanning,
    Draining(u32),
    Done,
}

/// Decides which VMs should be migrated and where.
///
/// One call of [`optimize_allocation`](Self::optimize_allocation) evicts VMs from overloaded hosts, places them on
/// other hosts and then tries to drain underloaded hosts completely so that they can be switched off. All placements
/// are made on the live datacenter state and rolled back before returning, so the datacenter is left unchanged and
/// the caller applies the returned plan.
pub struct MigrationOptimizer {
    ctx: SimulationContext,
    classifier: Box<dyn UtilizationClassifier>,
    vm_selection: Box<dyn VmSelectionPolicy>,
    overload_placement: Box<dyn HostRankingStrategy>,
    underload_placement: Box<dyn HostRankingStrategy>,
    default_placement: FirstFitAvailablePower,
    clusterer: VmClusterer,
    history: HistoryRecorder,
}

impl MigrationOptimizer {
    pub fn new(
        ctx: SimulationContext,
        classifier: Box<dyn UtilizationClassifier>,
        vm_selection: Box<dyn VmSelectionPolicy>,
        overload_placement: Box<dyn HostRankingStrategy>,
        underload_placement: Box<dyn HostRankingStrategy>,
        clusterer: VmClusterer,
        history_limit: usize,
    ) -> Self {
        Self {
            ctx,
            classifier,
            vm_selection,
            overload_placement,
            underload_placement,
            default_placement: FirstFitAvailablePower::new(),
            clusterer,
            history: HistoryRecorder::new(history_limit),
        }
    }

    /// Creates optimizer with strategies resolved from the config.
    pub fn from_config(config: &ConsolidationConfig, dc: &Datacenter) -> Self {
        Self::new(
            dc.create_context("optimizer"),
            classifier_resolver(&config.overload_detection),
            vm_selection_resolver(&config.vm_selection),
            ranking_strategy_resolver(&config.overload_placement),
            ranking_strategy_resolver(&config.underload_placement),
            VmClusterer::new(config.clustering.clone()),
            config.history_limit,
        )
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn classifier(&self) -> &dyn UtilizationClassifier {
        self.classifier.as_ref()
    }

    /// Returns true if the host is classified as overloaded.
    pub fn is_host_overloaded(&self, host: &Host) -> bool {
        self.classifier.is_overloaded(host)
    }

    /// Builds migration plan for the current datacenter state. The datacenter is restored before returning.
    pub fn optimize_allocation(&mut self, dc: &mut Datacenter) -> MigrationPlan {
        let total_start = Instant::now();

        let phase_start = Instant::now();
        let overloaded = self.overloaded_hosts(dc);
        let host_selection = phase_start.elapsed().as_secs_f64();
        if !overloaded.is_empty() {
            log_info!(self.ctx, "overloaded hosts: {:?}", overloaded);
        }

        let snapshot = AllocationSnapshot::capture(dc);

        let phase_start = Instant::now();
        let vms_to_migrate = self.evict_vms(&overloaded, dc);
        let vm_selection = phase_start.elapsed().as_secs_f64();

        let phase_start = Instant::now();
        let excluded: HashSet<u32> = overloaded.iter().cloned().collect();
        let mut plan = self.place_evicted_vms(&vms_to_migrate, &excluded, dc);
        let vm_reallocation = phase_start.elapsed().as_secs_f64();

        let drain_plan = self.drain_underloaded_hosts(&overloaded, &plan, dc);
        plan.extend(drain_plan);

        snapshot.restore(dc);

        self.history.add_timings(PhaseTimings {
            host_selection,
            vm_selection,
            vm_reallocation,
            total: total_start.elapsed().as_secs_f64(),
        });
        log_info!(
            self.ctx,
            "migration plan: {} migrations, {} overloaded hosts",
            plan.len(),
            overloaded.len()
        );
        plan
    }

    /// Finds destination for the VM among all hosts except its current one.
    pub fn find_host_for_vm(&self, vm_id: u32, dc: &mut Datacenter) -> Option<u32> {
        let current_host = dc.vm_host(vm_id);
        let candidates: Vec<u32> = dc
            .host_ids()
            .into_iter()
            .filter(|host_id| Some(*host_id) != current_host)
            .collect();
        self.default_placement
            .select_host(vm_id, &candidates, dc, self.classifier.as_ref())
    }

    /// Classifies all hosts, records history samples and returns the overloaded ones.
    fn overloaded_hosts(&mut self, dc: &Datacenter) -> Vec<u32> {
        let time = dc.current_time();
        let mut overloaded = Vec::new();
        for host in dc.hosts() {
            let classification = self.classifier.classify(host);
            self.history
                .add_entry(host.id, time, host.cpu_load(), classification.metric);
            if classification.overloaded {
                overloaded.push(host.id);
            }
        }
        overloaded
    }

    fn evict_vms(&mut self, overloaded: &[u32], dc: &mut Datacenter) -> Vec<u32> {
        let mut evicted = Vec::new();
        for &host_id in overloaded {
            while let Some(vm_id) = self.vm_selection.select_vm(host_id, dc) {
                if dc.detach(vm_id, host_id).is_none() {
                    log_warn!(self.ctx, "selected vm #{} is not on host #{}", vm_id, host_id);
                    break;
                }
                log_debug!(self.ctx, "vm #{} selected for migration from host #{}", vm_id, host_id);
                evicted.push(vm_id);
                if !self.classifier.is_overloaded(dc.host(host_id)) {
                    break;
                }
            }
        }
        evicted
    }

    fn candidate_hosts(dc: &Datacenter, excluded: &HashSet<u32>) -> Vec<u32> {
        dc.host_ids()
            .into_iter()
            .filter(|host_id| !excluded.contains(host_id))
            .collect()
    }

    /// Places VMs evicted from overloaded hosts. VMs without feasible destination are left out of the plan.
    fn place_evicted_vms(&self, vms: &[u32], excluded: &HashSet<u32>, dc: &mut Datacenter) -> MigrationPlan {
        let candidates = Self::candidate_hosts(dc, excluded);
        let order = self.clusterer.order(vms, &candidates, dc);
        let mut plan = MigrationPlan::new();
        for vm_id in order {
            let destination =
                self.overload_placement
                    .select_host(vm_id, &candidates, dc, self.classifier.as_ref());
            match destination {
                Some(host_id) if dc.try_attach(vm_id, host_id).is_success() => {
                    log_debug!(self.ctx, "vm #{} allocated to host #{}", vm_id, host_id);
                    plan.push(MigrationEntry { vm_id, host_id });
                }
                _ => {
                    log_debug!(self.ctx, "no destination found for vm #{}", vm_id);
                }
            }
        }
        plan
    }

    fn drain_underloaded_hosts(
        &self,
        overloaded: &[u32],
        overload_plan: &[MigrationEntry],
        dc: &mut Datacenter,
    ) -> MigrationPlan {
        let switched_off: Vec<u32> = dc.hosts().filter(|host| host.is_switched_off()).map(|host| host.id).collect();

        let mut excluded_from_scan: HashSet<u32> = overloaded.iter().chain(switched_off.iter()).cloned().collect();
        excluded_from_scan.extend(overload_plan.iter().map(|entry| entry.host_id));
        let mut excluded_from_placement: HashSet<u32> = overloaded.iter().chain(switched_off.iter()).cloned().collect();

        let mut plan = MigrationPlan::new();
        let mut state = DrainState::Scanning;
        loop {
            state = match state {
                DrainState::Scanning => {
                    if excluded_from_scan.len() >= dc.host_count() {
                        DrainState::Done
                    } else {
                        match underloaded_host(dc, &excluded_from_scan) {
                            Some(host_id) => DrainState::Draining(host_id),
                            None => DrainState::Done,
                        }
                    }
                }
                DrainState::Draining(host_id) => {
                    log_debug!(self.ctx, "underloaded host: #{}", host_id);
                    excluded_from_scan.insert(host_id);
                    excluded_from_placement.insert(host_id);
                    let vms = migratable_vms(host_id, dc);
                    if !vms.is_empty() {
                        let entries = self.drain_host(host_id, &vms, &excluded_from_placement, dc);
                        excluded_from_scan.extend(entries.iter().map(|entry| entry.host_id));
                        plan.extend(entries);
                    }
                    DrainState::Scanning
                }
                DrainState::Done => break,
            };
        }
        plan
    }

    /// Moves all VMs from the host to other hosts. If some VM can not be placed, all VMs moved so far are returned
    /// to the host and an empty plan is returned.
    fn drain_host(&self, host_id: u32, vms: &[u32], excluded: &HashSet<u32>, dc: &mut Datacenter) -> MigrationPlan {
        let candidates = Self::candidate_hosts(dc, excluded);
        let order = self.clusterer.order(vms, &candidates, dc);
        let mut plan = MigrationPlan::new();
        let mut moved = Vec::new();
        for vm_id in order {
            let moved_to = self
                .underload_placement
                .select_host(vm_id, &candidates, dc, self.classifier.as_ref())
                .and_then(|dest| move_vm(vm_id, host_id, dest, dc).map(|alloc| (dest, alloc)));
            match moved_to {
                Some((dest, alloc)) => {
                    log_debug!(self.ctx, "vm #{} allocated to host #{}", vm_id, dest);
                    plan.push(MigrationEntry { vm_id, host_id: dest });
                    moved.push((dest, alloc));
                }
                None => {
                    log_debug!(
                        self.ctx,
                        "not all vms can be reallocated from host #{}, reallocation cancelled",
                        host_id
                    );
                    for (dest, alloc) in moved {
                        let vm_id = alloc.vm_id;
                        if dc.detach(vm_id, dest).is_none() {
                            log_error!(self.ctx, "vm #{} is missing on host #{} during rollback", vm_id, dest);
                        }
                        let verdict = dc.attach_allocation(host_id, alloc);
                        if !verdict.is_success() {
                            log_error!(
                                self.ctx,
                                "couldn't return vm #{} to host #{}: {:?}",
                                vm_id,
                                host_id,
                                verdict
                            );
                        }
                    }
                    return MigrationPlan::new();
                }
            }
        }
        plan
    }
}

/// Detaches the VM from one host and attaches it to another, returns the allocation it had on the source host.
/// On failure the VM stays on the source host.
fn move_vm(vm_id: u32, from: u32, to: u32, dc: &mut Datacenter) -> Option<Allocation> {
    let alloc = dc.detach(vm_id, from)?;
    if dc.try_attach(vm_id, to).is_success() {
        Some(alloc)
    } else {
        dc.attach_allocation(from, alloc);
        None
    }
}

/// Returns the host with the lowest positive CPU load among hosts not excluded, skipping hosts
/// where all VMs are migrating out or some VM is migrating in.
pub fn underloaded_host(dc: &Datacenter, excluded: &HashSet<u32>) -> Option<u32> {
    let mut min_load = 1.;
    let mut result = None;
    for host in dc.hosts() {
        if excluded.contains(&host.id) {
            continue;
        }
        let load = host.cpu_load();
        if load > 0. && load < min_load && !all_vms_migrating_out_or_any_migrating_in(host, dc) {
            min_load = load;
            result = Some(host.id);
        }
    }
    result
}

/// Returns true if some VM is migrating in to the host or all VMs of the host are being migrated.
pub fn all_vms_migrating_out_or_any_migrating_in(host: &Host, dc: &Datacenter) -> bool {
    if !host.vms_migrating_in().is_empty() {
        return true;
    }
    host.vm_ids().into_iter().all(|vm_id| dc.vm(vm_id).is_in_migration())
}
