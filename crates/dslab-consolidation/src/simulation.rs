//! Control loop driving the datacenter and the migration optimizer.

use serde::Serialize;

use crate::context::SimulationContext;
use crate::core::common::MigrationPlan;
use crate::core::config::ConsolidationConfig;
use crate::core::datacenter::Datacenter;
use crate::core::history::PhaseTimings;
use crate::core::optimizer::MigrationOptimizer;
use crate::{log_debug, log_info};

/// Aggregated results of a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps: u64,
    pub simulated_time: f64,
    /// Energy consumed by all hosts in W*s.
    pub energy_consumed: f64,
    pub migrations: u64,
    pub active_hosts: usize,
    pub mean_timings: PhaseTimings,
}

/// Runs the optimizer once per scheduling interval:
/// update VM loads, build migration plan, finish pending migrations and start the planned migrations.
///
/// Migrations take one scheduling interval. A migration started at one step is still in progress while the optimizer
/// runs at the next step: the VM resides on its source host and its resources are reserved on the destination.
pub struct ConsolidationSimulation {
    config: ConsolidationConfig,
    dc: Datacenter,
    optimizer: MigrationOptimizer,
    ctx: SimulationContext,
    steps: u64,
    energy_consumed: f64,
    migrations: u64,
}

impl ConsolidationSimulation {
    pub fn new(config: ConsolidationConfig) -> Self {
        let dc = Datacenter::from_config(&config);
        let optimizer = MigrationOptimizer::from_config(&config, &dc);
        Self::with_parts(config, dc, optimizer)
    }

    /// Creates simulation over already built datacenter and optimizer.
    pub fn with_parts(config: ConsolidationConfig, dc: Datacenter, optimizer: MigrationOptimizer) -> Self {
        let ctx = dc.create_context("simulation");
        Self {
            config,
            dc,
            optimizer,
            ctx,
            steps: 0,
            energy_consumed: 0.,
            migrations: 0,
        }
    }

    pub fn datacenter(&self) -> &Datacenter {
        &self.dc
    }

    pub fn datacenter_mut(&mut self) -> &mut Datacenter {
        &mut self.dc
    }

    pub fn optimizer(&self) -> &MigrationOptimizer {
        &self.optimizer
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn current_time(&self) -> f64 {
        self.dc.current_time()
    }

    /// Performs one control step, returns the applied migration plan.
    pub fn step(&mut self) -> MigrationPlan {
        let interval = self.config.scheduling_interval;
        let time = self.steps as f64 * interval;
        self.dc.update_loads(time);
        self.energy_consumed += self.dc.total_power() * interval;

        let plan = self.optimizer.optimize_allocation(&mut self.dc);
        let finished = self.dc.finish_migrations();
        if finished > 0 {
            log_debug!(self.ctx, "{} migrations finished", finished);
        }
        let started = self.dc.apply_plan(&plan);
        self.migrations += started as u64;
        self.steps += 1;
        log_debug!(
            self.ctx,
            "step {}: power = {:.2}, active hosts = {}, migrations started = {}",
            self.steps,
            self.dc.total_power(),
            self.dc.active_host_count(),
            started
        );
        plan
    }

    /// Runs control steps until the simulation length is reached.
    pub fn run(&mut self) -> RunSummary {
        while (self.steps as f64) * self.config.scheduling_interval <= self.config.simulation_length {
            self.step();
        }
        let summary = self.summary();
        log_info!(
            self.ctx,
            "energy consumed: {:.2} kWh, migrations: {}",
            summary.energy_consumed / 3.6e6,
            summary.migrations
        );
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps: self.steps,
            simulated_time: self.current_time(),
            energy_consumed: self.energy_consumed,
            migrations: self.migrations,
            active_hosts: self.dc.active_host_count(),
            mean_timings: self.optimizer.history().execution_times().means(),
        }
    }
}
