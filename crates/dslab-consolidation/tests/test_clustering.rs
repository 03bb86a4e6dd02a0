use std::collections::HashSet;

use approx::assert_abs_diff_eq;

use dslab_consolidation::core::clustering::{
    arrange_by_density, assign, estimate_cluster_count, initial_centroids, recompute, Centroid, Cluster, VmClusterer,
    VmFeatures,
};
use dslab_consolidation::core::config::ClusteringConfig;
use dslab_consolidation::core::datacenter::Datacenter;
use dslab_consolidation::core::load_model::ConstantLoadModel;
use dslab_consolidation::core::power_model::LinearPowerModel;

// Two groups of VMs: three small ones around (105, 100) and two large ones around (1005, 1000).
fn two_groups() -> Vec<VmFeatures> {
    vec![
        VmFeatures::new(0, 100., 100.),
        VmFeatures::new(1, 110., 100.),
        VmFeatures::new(2, 1000., 1000.),
        VmFeatures::new(3, 1010., 1000.),
        VmFeatures::new(4, 105., 100.),
    ]
}

#[test]
// (floor(2000 / 100) + floor(1000 / 500)) / 2 - 1 = (20 + 2) / 2 - 1 = 10.
fn test_cluster_count_estimation() {
    let vms = vec![
        VmFeatures::new(0, 100., 10.),
        VmFeatures::new(1, 200., 10.),
        VmFeatures::new(2, 500., 10.),
    ];
    assert_eq!(estimate_cluster_count(&vms, &[1000., 2000.]), 10);
    assert_eq!(estimate_cluster_count(&vms[..2], &[1000., 2000.]), -1);
    assert_eq!(estimate_cluster_count(&vms, &[]), -1);

    let with_idle_vm = vec![
        VmFeatures::new(0, 0., 10.),
        VmFeatures::new(1, 200., 10.),
        VmFeatures::new(2, 500., 10.),
    ];
    assert_eq!(estimate_cluster_count(&with_idle_vm, &[1000.]), -1);
}

#[test]
// The first centroid is the mean, then the VMs farthest from the mean of chosen centroids are taken.
fn test_farthest_point_initialization() {
    let centroids = initial_centroids(&two_groups(), 3);
    assert_eq!(
        centroids,
        vec![
            Centroid::new(465., 460.),
            Centroid::new(1010., 1000.),
            Centroid::new(100., 100.)
        ]
    );
}

#[test]
// Initialization stops when every distinct point is already a centroid.
fn test_initialization_with_duplicate_points() {
    let vms = vec![
        VmFeatures::new(0, 100., 100.),
        VmFeatures::new(1, 100., 100.),
        VmFeatures::new(2, 300., 100.),
    ];
    let centroids = initial_centroids(&vms, 10);
    assert_eq!(centroids.len(), 3);
    assert_eq!(centroids[1], Centroid::new(300., 100.));
    assert_eq!(centroids[2], Centroid::new(100., 100.));
}

#[test]
// Centroids without members keep their position.
fn test_empty_cluster_keeps_centroid() {
    let vms = two_groups();
    let centroids = vec![
        Centroid::new(100., 100.),
        Centroid::new(5000., 5000.),
        Centroid::new(1000., 1000.),
    ];
    let groups = assign(&vms, &centroids);
    assert_eq!(groups, vec![vec![0, 1, 4], vec![], vec![2, 3]]);
    let next = recompute(&vms, &groups, &centroids);
    assert_eq!(next[1], Centroid::new(5000., 5000.));
    assert_abs_diff_eq!(next[0].cpu, 105., epsilon = 1e-9);
    assert_abs_diff_eq!(next[2].cpu, 1005., epsilon = 1e-9);
}

#[test]
// Capacity 800 gives (8 + 0) / 2 - 1 = 3 clusters, one of which stays empty.
fn test_clustering_run() {
    let clusterer = VmClusterer::new(ClusteringConfig::default());
    let vms = two_groups();
    let outcome = clusterer.cluster(&vms, &[800.]);

    assert_eq!(outcome.estimated_k, 3);
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 2);
    let members: Vec<Vec<u32>> = outcome.clusters.iter().map(|c| c.members.clone()).collect();
    assert_eq!(members, vec![vec![0, 1, 4], vec![2, 3], vec![]]);
    assert_eq!(outcome.clusters[2].centroid, Centroid::new(465., 460.));
}

#[test]
// Every VM belongs to exactly one cluster and repeated runs give the same result.
fn test_partition_and_determinism() {
    let clusterer = VmClusterer::new(ClusteringConfig::default());
    let vms: Vec<VmFeatures> = (0..40)
        .map(|i| VmFeatures::new(i, 100. + ((i * 37) % 11) as f64 * 90., 128. * ((i % 7) + 1) as f64))
        .collect();
    let first = clusterer.cluster(&vms, &[3000., 2500., 4000.]);
    let second = clusterer.cluster(&vms, &[3000., 2500., 4000.]);

    assert!(!first.is_skipped());
    assert!(first.iterations <= 10);
    assert_eq!(first, second);

    let mut seen = HashSet::new();
    let mut total = 0;
    for cluster in &first.clusters {
        for vm_id in &cluster.members {
            assert!(seen.insert(*vm_id));
            total += 1;
        }
    }
    assert_eq!(total, vms.len());
    for window in first.clusters.windows(2) {
        assert!(window[0].members.len() >= window[1].members.len());
    }
}

#[test]
// Iteration cap is respected.
fn test_iteration_cap() {
    let config = ClusteringConfig {
        enabled: true,
        max_iterations: 1,
        tolerance: 0.,
    };
    let outcome = VmClusterer::new(config).cluster(&two_groups(), &[800.]);
    assert_eq!(outcome.iterations, 1);
    assert!(!outcome.converged);
}

#[test]
// Clusters of equal size keep their relative order.
fn test_density_order_is_stable() {
    let cluster = |members: Vec<u32>| Cluster {
        centroid: Centroid::new(0., 0.),
        members,
    };
    let mut clusters = vec![cluster(vec![1]), cluster(vec![2, 3, 4]), cluster(vec![5, 6, 7])];
    assert_eq!(arrange_by_density(&mut clusters), vec![2, 3, 4, 5, 6, 7, 1]);
}

#[test]
// Order of VMs is kept when clustering is skipped or disabled.
fn test_order_without_clustering() {
    let mut dc = Datacenter::new();
    let host = dc.add_host("h", 800., 8192, Box::new(LinearPowerModel::new(250., 175.)));
    let vms: Vec<u32> = two_groups()
        .iter()
        .map(|vm| dc.add_vm(vm.point.cpu, vm.point.memory as u64, Box::new(ConstantLoadModel::new(1.))))
        .collect();

    let clusterer = VmClusterer::new(ClusteringConfig::default());
    assert_eq!(clusterer.order(&vms[..2], &[host], &dc), vec![vms[0], vms[1]]);
    assert_eq!(clusterer.order(&vms, &[host], &dc), vec![vms[0], vms[1], vms[4], vms[2], vms[3]]);

    let disabled = VmClusterer::new(ClusteringConfig {
        enabled: false,
        ..ClusteringConfig::default()
    });
    assert_eq!(disabled.order(&vms, &[host], &dc), vms);
}
