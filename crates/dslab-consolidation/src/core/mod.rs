//! Consolidation core: datacenter model, strategies and the migration optimizer.

pub mod clustering;
pub mod common;
pub mod config;
pub mod datacenter;
pub mod history;
pub mod host;
pub mod host_ranking;
pub mod host_ranking_strategies;
pub mod load_model;
pub mod optimizer;
pub mod power_model;
pub mod snapshot;
pub mod stats;
pub mod utilization_classifier;
pub mod utilization_classifiers;
pub mod vm;
pub mod vm_selection_policies;
pub mod vm_selection_policy;
