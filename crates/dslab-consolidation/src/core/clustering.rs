//! Grouping of migrating VMs by resource demand.
//!
//! VMs are clustered in the (requested CPU, memory) feature space, and the placement order is built from the clusters
//! with the most members first, so that similar VMs are packed together.

use crate::core::config::ClusteringConfig;
use crate::core::datacenter::Datacenter;

/// Point in the (CPU in MIPS, memory in MB) feature space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Centroid {
    pub cpu: f64,
    pub memory: f64,
}

impl Centroid {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }

    pub fn distance(&self, other: &Centroid) -> f64 {
        ((self.cpu - other.cpu).powi(2) + (self.memory - other.memory).powi(2)).sqrt()
    }

    fn mean<'a>(points: impl Iterator<Item = &'a Centroid>) -> Option<Centroid> {
        let (mut cpu, mut memory, mut count) = (0., 0., 0usize);
        for point in points {
            cpu += point.cpu;
            memory += point.memory;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(Centroid::new(cpu / count as f64, memory / count as f64))
        }
    }
}

/// VM with its position in the feature space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VmFeatures {
    pub vm_id: u32,
    pub point: Centroid,
}

impl VmFeatures {
    pub fn new(vm_id: u32, cpu: f64, memory: f64) -> Self {
        Self {
            vm_id,
            point: Centroid::new(cpu, memory),
        }
    }
}

/// VMs assigned to one centroid, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub centroid: Centroid,
    pub members: Vec<u32>,
}

/// Result of one clustering run.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusteringOutcome {
    /// Estimated number of clusters, -1 if the estimation was not possible.
    pub estimated_k: i64,
    /// Clusters sorted by the number of members, empty if clustering was skipped.
    pub clusters: Vec<Cluster>,
    pub iterations: usize,
    pub converged: bool,
}

impl ClusteringOutcome {
    fn skipped(estimated_k: i64) -> Self {
        Self {
            estimated_k,
            clusters: Vec::new(),
            iterations: 0,
            converged: false,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Estimates the number of clusters from available host capacities and VM CPU demands:
/// `(floor(max_capacity / min_demand) + floor(min_capacity / max_demand)) / 2 - 1`.
///
/// Returns -1 when there are fewer than 3 VMs, no hosts or a VM without CPU demand.
pub fn estimate_cluster_count(vms: &[VmFeatures], host_capacities: &[f64]) -> i64 {
    if vms.len() < 3 || host_capacities.is_empty() {
        return -1;
    }
    let min_demand = vms.iter().map(|vm| vm.point.cpu).fold(f64::INFINITY, f64::min);
    let max_demand = vms.iter().map(|vm| vm.point.cpu).fold(f64::NEG_INFINITY, f64::max);
    if min_demand <= 0. {
        return -1;
    }
    let max_capacity = host_capacities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_capacity = host_capacities.iter().cloned().fold(f64::INFINITY, f64::min);
    // float to int casts saturate
    let max_point = (max_capacity / min_demand).floor() as i64;
    let min_point = (min_capacity / max_demand).floor() as i64;
    max_point.saturating_add(min_point) / 2 - 1
}

/// Chooses up to `k` initial centroids with the farthest point heuristic.
///
/// The first centroid is the mean of all VMs. Each next one is the VM farthest from the mean of already chosen
/// centroids, skipping VMs whose features equal an already chosen centroid. Stops early if no such VM is left.
pub fn initial_centroids(vms: &[VmFeatures], k: usize) -> Vec<Centroid> {
    let mut centroids = Vec::with_capacity(k.min(vms.len() + 1));
    match Centroid::mean(vms.iter().map(|vm| &vm.point)) {
        Some(mean) if k > 0 => centroids.push(mean),
        _ => return centroids,
    }
    while centroids.len() < k {
        let Some(center) = Centroid::mean(centroids.iter()) else {
            break;
        };
        let mut farthest: Option<(Centroid, f64)> = None;
        for vm in vms {
            if centroids.contains(&vm.point) {
                continue;
            }
            let distance = vm.point.distance(&center);
            if farthest.map_or(true, |(_, best)| distance > best) {
                farthest = Some((vm.point, distance));
            }
        }
        match farthest {
            Some((point, _)) => centroids.push(point),
            None => break,
        }
    }
    centroids
}

/// Assigns every VM to the nearest centroid (the first one on ties), returns member indices per centroid.
pub fn assign(vms: &[VmFeatures], centroids: &[Centroid]) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); centroids.len()];
    for (idx, vm) in vms.iter().enumerate() {
        let mut nearest = 0;
        let mut min_distance = f64::INFINITY;
        for (centroid_idx, centroid) in centroids.iter().enumerate() {
            let distance = vm.point.distance(centroid);
            if distance < min_distance {
                min_distance = distance;
                nearest = centroid_idx;
            }
        }
        if let Some(group) = groups.get_mut(nearest) {
            group.push(idx);
        }
    }
    groups
}

/// Moves each centroid to the mean of its members. Centroids without members keep their position.
pub fn recompute(vms: &[VmFeatures], groups: &[Vec<usize>], previous: &[Centroid]) -> Vec<Centroid> {
    groups
        .iter()
        .zip(previous)
        .map(|(group, prev)| Centroid::mean(group.iter().map(|&idx| &vms[idx].point)).unwrap_or(*prev))
        .collect()
}

/// Sorts clusters by the number of members (descending, stable) and concatenates their members.
pub fn arrange_by_density(clusters: &mut [Cluster]) -> Vec<u32> {
    clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
    clusters.iter().flat_map(|cluster| cluster.members.iter().cloned()).collect()
}

/// Clusters VMs by their resource demands to order their placement.
#[derive(Clone, Debug)]
pub struct VmClusterer {
    config: ClusteringConfig,
}

impl VmClusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    fn converged(&self, previous: &[Centroid], next: &[Centroid]) -> bool {
        previous.iter().zip(next).all(|(a, b)| {
            if self.config.tolerance > 0. {
                (a.cpu - b.cpu).abs() <= self.config.tolerance && (a.memory - b.memory).abs() <= self.config.tolerance
            } else {
                a == b
            }
        })
    }

    /// Runs clustering over VM features. Clustering is skipped when the estimated number of clusters is at most 2.
    pub fn cluster(&self, vms: &[VmFeatures], host_capacities: &[f64]) -> ClusteringOutcome {
        let estimated_k = estimate_cluster_count(vms, host_capacities);
        if !self.config.enabled || estimated_k <= 2 {
            return ClusteringOutcome::skipped(estimated_k);
        }
        let mut centroids = initial_centroids(vms, estimated_k as usize);
        let max_iterations = self.config.max_iterations.max(1);
        let mut iterations = 0;
        let mut converged;
        let mut groups;
        loop {
            groups = assign(vms, &centroids);
            iterations += 1;
            let next = recompute(vms, &groups, &centroids);
            converged = self.converged(&centroids, &next);
            centroids = next;
            if converged || iterations >= max_iterations {
                break;
            }
        }
        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .zip(centroids)
            .map(|(group, centroid)| Cluster {
                centroid,
                members: group.into_iter().map(|idx| vms[idx].vm_id).collect(),
            })
            .collect();
        clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
        ClusteringOutcome {
            estimated_k,
            clusters,
            iterations,
            converged,
        }
    }

    /// Returns the placement order of VMs: members of the densest clusters first,
    /// or the original order if clustering was skipped.
    pub fn order(&self, vm_ids: &[u32], candidate_hosts: &[u32], dc: &Datacenter) -> Vec<u32> {
        let features: Vec<VmFeatures> = vm_ids
            .iter()
            .map(|&vm_id| {
                let vm = dc.vm(vm_id);
                VmFeatures::new(vm_id, vm.cpu_usage, vm.memory_usage as f64)
            })
            .collect();
        let capacities: Vec<f64> = candidate_hosts
            .iter()
            .map(|&host_id| dc.host(host_id).cpu_available())
            .collect();
        let mut outcome = self.cluster(&features, &capacities);
        if outcome.is_skipped() {
            return vm_ids.to_vec();
        }
        arrange_by_density(&mut outcome.clusters)
    }
}
