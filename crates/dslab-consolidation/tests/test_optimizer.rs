use std::collections::HashSet;

use dslab_consolidation::core::clustering::VmClusterer;
use dslab_consolidation::core::common::MigrationEntry;
use dslab_consolidation::core::config::ClusteringConfig;
use dslab_consolidation::core::datacenter::Datacenter;
use dslab_consolidation::core::host_ranking_strategies::power_delta_fit::{Extremum, PowerDeltaFit};
use dslab_consolidation::core::load_model::ConstantLoadModel;
use dslab_consolidation::core::optimizer::{all_vms_migrating_out_or_any_migrating_in, underloaded_host, MigrationOptimizer};
use dslab_consolidation::core::power_model::LinearPowerModel;
use dslab_consolidation::core::snapshot::AllocationSnapshot;
use dslab_consolidation::core::utilization_classifiers::static_threshold::StaticThreshold;
use dslab_consolidation::core::vm_selection_policies::minimum_migration_time::MinimumMigrationTime;

fn optimizer(dc: &Datacenter, threshold: f64) -> MigrationOptimizer {
    MigrationOptimizer::new(
        dc.create_context("optimizer"),
        Box::new(StaticThreshold::new(threshold)),
        Box::new(MinimumMigrationTime::new()),
        Box::new(PowerDeltaFit::new(Extremum::Min)),
        Box::new(PowerDeltaFit::new(Extremum::Max)),
        VmClusterer::new(ClusteringConfig::default()),
        100,
    )
}

fn add_host(dc: &mut Datacenter, name: &str, cpu: f64) -> u32 {
    dc.add_host(name, cpu, 4096, Box::new(LinearPowerModel::new(250., 175.)))
}

fn spawn_vm(dc: &mut Datacenter, cpu: f64, memory: u64, host_id: u32) -> u32 {
    let vm_id = dc.add_vm(cpu, memory, Box::new(ConstantLoadModel::new(1.)));
    assert!(dc.place_vm(vm_id, host_id).is_success());
    vm_id
}

fn placement(dc: &Datacenter) -> Vec<(u32, Option<u32>)> {
    dc.vm_ids().into_iter().map(|vm_id| (vm_id, dc.vm_host(vm_id))).collect()
}

fn host_vms(dc: &Datacenter, host_id: u32) -> Vec<u32> {
    dc.host(host_id).vm_ids()
}

#[test]
// Host h2 is loaded by 90% with three equal VMs. Evicting the first one brings the load to 60%,
// and the VM is placed on the empty host h1.
fn test_overloaded_host_evacuation() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let a = spawn_vm(&mut dc, 300., 512, h2);
    let b = spawn_vm(&mut dc, 300., 512, h2);
    let c = spawn_vm(&mut dc, 300., 512, h2);
    let before = placement(&dc);

    let mut optimizer = optimizer(&dc, 0.8);
    let plan = optimizer.optimize_allocation(&mut dc);

    assert_eq!(plan, vec![MigrationEntry { vm_id: a, host_id: h1 }]);
    assert_eq!(placement(&dc), before);
    assert_eq!(host_vms(&dc, h2), vec![a, b, c]);
    assert!(host_vms(&dc, h1).is_empty());
    assert!(dc.host(h1).is_switched_off());
}

#[test]
// With threshold 50% two VMs are evicted from h2, but after the first one lands on h1
// the second would overload h1, so it is left out of the plan.
fn test_unplaceable_vm_is_dropped() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let a = spawn_vm(&mut dc, 300., 512, h2);
    let b = spawn_vm(&mut dc, 300., 512, h2);
    spawn_vm(&mut dc, 300., 512, h2);
    let before = placement(&dc);

    let mut optimizer = optimizer(&dc, 0.5);
    let plan = optimizer.optimize_allocation(&mut dc);

    assert_eq!(plan, vec![MigrationEntry { vm_id: a, host_id: h1 }]);
    assert!(!plan.iter().any(|entry| entry.vm_id == b));
    assert_eq!(placement(&dc), before);
}

#[test]
// Evicted VMs with larger memory footprint go last, and every destination stays below the threshold.
fn test_plan_destinations_are_valid() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let h3 = add_host(&mut dc, "h3", 1000.);
    spawn_vm(&mut dc, 400., 256, h1);
    spawn_vm(&mut dc, 200., 1024, h1);
    spawn_vm(&mut dc, 300., 128, h1);
    spawn_vm(&mut dc, 300., 512, h2);
    spawn_vm(&mut dc, 100., 512, h3);

    let mut optimizer = optimizer(&dc, 0.7);
    let overloaded: HashSet<u32> = dc
        .hosts()
        .filter(|host| optimizer.is_host_overloaded(host))
        .map(|host| host.id)
        .collect();
    assert_eq!(overloaded, HashSet::from([h1]));

    let before = placement(&dc);
    let plan = optimizer.optimize_allocation(&mut dc);
    assert!(!plan.is_empty());

    let mut load: Vec<f64> = dc.hosts().map(|host| host.cpu_allocated()).collect();
    for entry in &plan {
        assert!(!overloaded.contains(&entry.host_id));
        let vm_cpu = dc.vm(entry.vm_id).cpu_usage;
        let source = dc.vm_host(entry.vm_id).unwrap();
        load[source as usize] -= vm_cpu;
        load[entry.host_id as usize] += vm_cpu;
        assert!(load[entry.host_id as usize] / 1000. <= 0.7 + 1e-9);
    }
    assert_eq!(placement(&dc), before);
}

#[test]
// h1 is the least loaded host and its only VM fits on h2, so h1 is drained.
fn test_underloaded_host_drained() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let v1 = spawn_vm(&mut dc, 200., 512, h1);
    let v2 = spawn_vm(&mut dc, 500., 512, h2);

    let mut optimizer = optimizer(&dc, 0.8);
    let plan = optimizer.optimize_allocation(&mut dc);

    assert_eq!(plan, vec![MigrationEntry { vm_id: v1, host_id: h2 }]);
    assert_eq!(dc.vm_host(v1), Some(h1));
    assert_eq!(dc.vm_host(v2), Some(h2));
}

#[test]
// The first VM of h1 fits on h2 but the second one does not, so the drain of h1 is cancelled
// and the moved VM is returned to h1. h2 can not be drained either since h1 is excluded then.
fn test_aborted_drain_is_rolled_back() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let h3 = add_host(&mut dc, "h3", 1000.);
    let v1 = spawn_vm(&mut dc, 100., 512, h1);
    let v2 = spawn_vm(&mut dc, 500., 512, h1);
    let v3 = spawn_vm(&mut dc, 650., 512, h2);

    let mut optimizer = optimizer(&dc, 0.8);
    let plan = optimizer.optimize_allocation(&mut dc);

    assert!(plan.is_empty());
    assert_eq!(host_vms(&dc, h1), vec![v1, v2]);
    assert_eq!(host_vms(&dc, h2), vec![v3]);
    assert!(host_vms(&dc, h3).is_empty());
}

#[test]
// No VM is left without host or attached twice after optimization.
fn test_no_orphan_vms() {
    let mut dc = Datacenter::new();
    let hosts: Vec<u32> = (0..4).map(|i| add_host(&mut dc, &format!("h{}", i), 1000.)).collect();
    for (i, cpu) in [450., 400., 150., 100., 300., 80., 60.].iter().enumerate() {
        spawn_vm(&mut dc, *cpu, 256 * (i as u64 + 1), hosts[i % 3]);
    }
    let mut optimizer = optimizer(&dc, 0.8);
    optimizer.optimize_allocation(&mut dc);

    for vm_id in dc.vm_ids() {
        let owners: Vec<u32> = dc
            .hosts()
            .filter(|host| host.contains_vm(vm_id))
            .map(|host| host.id)
            .collect();
        assert_eq!(owners.len(), 1);
        assert_eq!(dc.vm_host(vm_id), Some(owners[0]));
    }
}

#[test]
// Host whose only VM is migrating in and host whose only VM is migrating out are never drained.
fn test_hosts_with_migrations_are_not_drained() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let v1 = spawn_vm(&mut dc, 200., 512, h2);
    assert!(dc.start_migration(v1, h1).is_success());

    assert!(all_vms_migrating_out_or_any_migrating_in(dc.host(h1), &dc));
    assert!(all_vms_migrating_out_or_any_migrating_in(dc.host(h2), &dc));
    assert_eq!(underloaded_host(&dc, &HashSet::new()), None);

    let mut optimizer = optimizer(&dc, 0.8);
    assert!(optimizer.optimize_allocation(&mut dc).is_empty());
    assert!(dc.host(h1).is_migrating_in(v1));
    assert_eq!(dc.vm_host(v1), Some(h2));
}

#[test]
// Host with a resident VM attached before an inbound one is not drained, though it has the lowest load.
fn test_host_with_resident_and_inbound_vms_not_drained() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let h3 = add_host(&mut dc, "h3", 1000.);
    let v1 = spawn_vm(&mut dc, 100., 512, h1);
    let v2 = spawn_vm(&mut dc, 200., 512, h2);
    spawn_vm(&mut dc, 500., 512, h2);
    spawn_vm(&mut dc, 600., 512, h3);
    assert!(dc.start_migration(v2, h1).is_success());
    assert_eq!(dc.host(h1).vm_ids(), vec![v1, v2]);

    assert!(all_vms_migrating_out_or_any_migrating_in(dc.host(h1), &dc));
    assert!(!all_vms_migrating_out_or_any_migrating_in(dc.host(h2), &dc));
    assert_eq!(underloaded_host(&dc, &HashSet::new()), Some(h3));

    let mut optimizer = optimizer(&dc, 0.8);
    let plan = optimizer.optimize_allocation(&mut dc);
    assert!(plan.iter().all(|entry| entry.vm_id != v1));
    assert_eq!(dc.vm_host(v1), Some(h1));
    assert!(dc.host(h1).is_migrating_in(v2));
}

#[test]
// Host without load is never considered underloaded, even if it has VMs.
fn test_zero_utilization_host_not_underloaded() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let idle = dc.add_vm(500., 512, Box::new(ConstantLoadModel::new(0.)));
    dc.place_vm(idle, h1);
    spawn_vm(&mut dc, 300., 512, h2);

    assert!(dc.host(h1).is_switched_off());
    assert_eq!(underloaded_host(&dc, &HashSet::new()), Some(h2));
    assert_eq!(underloaded_host(&dc, &HashSet::from([h2])), None);
}

#[test]
// Default lookup never returns the current host of the VM.
fn test_find_host_for_vm() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let v1 = spawn_vm(&mut dc, 200., 512, h1);
    let optimizer = optimizer(&dc, 0.8);

    assert_eq!(optimizer.find_host_for_vm(v1, &mut dc), Some(h2));
    let big = dc.add_vm(1200., 512, Box::new(ConstantLoadModel::new(1.)));
    assert_eq!(optimizer.find_host_for_vm(big, &mut dc), None);
}

#[test]
// History gets one sample per host and timestamp, timings are recorded for every call.
fn test_history_recording() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    spawn_vm(&mut dc, 300., 512, h1);
    let mut optimizer = optimizer(&dc, 0.8);

    optimizer.optimize_allocation(&mut dc);
    optimizer.optimize_allocation(&mut dc);
    dc.set_time(300.);
    optimizer.optimize_allocation(&mut dc);

    let history = optimizer.history().host(h1).unwrap();
    assert_eq!(history.time().iter().cloned().collect::<Vec<f64>>(), vec![0., 300.]);
    assert_eq!(history.metric().iter().cloned().collect::<Vec<f64>>(), vec![0.8, 0.8]);
    assert_eq!(optimizer.history().execution_times().len(), 3);
}

#[test]
// Snapshot does not include reservations of VMs migrating in, restore brings them back.
fn test_snapshot_restore() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let v1 = spawn_vm(&mut dc, 300., 512, h1);
    let v2 = spawn_vm(&mut dc, 200., 512, h2);
    assert!(dc.start_migration(v2, h1).is_success());

    let snapshot = AllocationSnapshot::capture(&dc);
    assert_eq!(snapshot.entries().len(), 2);

    dc.detach(v1, h1);
    dc.detach_all(h1);
    dc.detach_all(h2);
    snapshot.restore(&mut dc);

    assert_eq!(dc.vm_host(v1), Some(h1));
    assert_eq!(dc.vm_host(v2), Some(h2));
    assert_eq!(host_vms(&dc, h1), vec![v2, v1]);
    assert!(dc.host(h1).is_migrating_in(v2));
    assert_eq!(dc.host(h1).cpu_allocated(), 500.);
}

#[test]
#[should_panic(expected = "Can't restore vm")]
// Saved VM no longer fits on its host because of a new inbound migration.
fn test_snapshot_restore_failure_panics() {
    let mut dc = Datacenter::new();
    let h1 = add_host(&mut dc, "h1", 1000.);
    let h2 = add_host(&mut dc, "h2", 1000.);
    let v1 = spawn_vm(&mut dc, 600., 512, h1);
    let v2 = spawn_vm(&mut dc, 500., 512, h2);

    let snapshot = AllocationSnapshot::capture(&dc);
    dc.detach(v1, h1);
    assert!(dc.start_migration(v2, h1).is_success());
    snapshot.restore(&mut dc);
}
