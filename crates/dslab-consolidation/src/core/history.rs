//! Per-host utilization history and optimizer execution times.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;

use serde::Serialize;

use crate::core::stats::mean;

fn push_bounded(seq: &mut VecDeque<f64>, value: f64, limit: usize) {
    if limit == 0 {
        return;
    }
    while seq.len() >= limit {
        seq.pop_front();
    }
    seq.push_back(value);
}

/// Time, CPU utilization and decision metric samples of one host, as parallel sequences.
#[derive(Clone, Debug, Default)]
pub struct HostHistory {
    time: VecDeque<f64>,
    utilization: VecDeque<f64>,
    metric: VecDeque<f64>,
}

impl HostHistory {
    pub fn time(&self) -> &VecDeque<f64> {
        &self.time
    }

    pub fn utilization(&self) -> &VecDeque<f64> {
        &self.utilization
    }

    pub fn metric(&self) -> &VecDeque<f64> {
        &self.metric
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Durations of optimizer phases in one call, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    pub host_selection: f64,
    pub vm_selection: f64,
    pub vm_reallocation: f64,
    pub total: f64,
}

/// Execution time samples of optimizer phases over all calls.
#[derive(Clone, Debug, Default)]
pub struct ExecutionTimes {
    pub host_selection: VecDeque<f64>,
    pub vm_selection: VecDeque<f64>,
    pub vm_reallocation: VecDeque<f64>,
    pub total: VecDeque<f64>,
}

impl ExecutionTimes {
    fn push(&mut self, timings: PhaseTimings, limit: usize) {
        push_bounded(&mut self.host_selection, timings.host_selection, limit);
        push_bounded(&mut self.vm_selection, timings.vm_selection, limit);
        push_bounded(&mut self.vm_reallocation, timings.vm_reallocation, limit);
        push_bounded(&mut self.total, timings.total, limit);
    }

    pub fn len(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }

    /// Returns mean durations of each phase.
    pub fn means(&self) -> PhaseTimings {
        let avg = |seq: &VecDeque<f64>| mean(&seq.iter().cloned().collect::<Vec<f64>>());
        PhaseTimings {
            host_selection: avg(&self.host_selection),
            vm_selection: avg(&self.vm_selection),
            vm_reallocation: avg(&self.vm_reallocation),
            total: avg(&self.total),
        }
    }
}

#[derive(Serialize)]
struct HostSampleRecord {
    host: u32,
    time: f64,
    utilization: f64,
    metric: f64,
}

/// Records host samples and optimizer timings.
///
/// Every sequence keeps at most `limit` most recent entries.
#[derive(Clone, Debug)]
pub struct HistoryRecorder {
    limit: usize,
    hosts: BTreeMap<u32, HostHistory>,
    execution_times: ExecutionTimes,
}

impl HistoryRecorder {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            hosts: BTreeMap::new(),
            execution_times: ExecutionTimes::default(),
        }
    }

    /// Appends host sample unless a sample with the same time was the last one recorded for this host.
    /// Returns true if the sample was added.
    pub fn add_entry(&mut self, host_id: u32, time: f64, utilization: f64, metric: f64) -> bool {
        let history = self.hosts.entry(host_id).or_default();
        if history.time.back() == Some(&time) {
            return false;
        }
        push_bounded(&mut history.time, time, self.limit);
        push_bounded(&mut history.utilization, utilization, self.limit);
        push_bounded(&mut history.metric, metric, self.limit);
        true
    }

    pub fn add_timings(&mut self, timings: PhaseTimings) {
        self.execution_times.push(timings, self.limit);
    }

    pub fn host(&self, host_id: u32) -> Option<&HostHistory> {
        self.hosts.get(&host_id)
    }

    pub fn execution_times(&self) -> &ExecutionTimes {
        &self.execution_times
    }

    /// Writes host samples to CSV file with columns `host,time,utilization,metric`.
    pub fn save_to_csv(&self, path: &str) -> Result<(), std::io::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for (&host, history) in &self.hosts {
            for i in 0..history.len() {
                wtr.serialize(HostSampleRecord {
                    host,
                    time: history.time[i],
                    utilization: history.utilization[i],
                    metric: history.metric[i],
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes optimizer phase durations to CSV file, one row per optimizer call.
    pub fn save_execution_times_csv(&self, path: &str) -> Result<(), std::io::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        let times = &self.execution_times;
        for i in 0..times.len() {
            wtr.serialize(PhaseTimings {
                host_selection: times.host_selection[i],
                vm_selection: times.vm_selection[i],
                vm_reallocation: times.vm_reallocation[i],
                total: times.total[i],
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}
