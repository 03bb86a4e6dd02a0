pub mod inter_quartile_range;
pub mod median_absolute_deviation;
pub mod static_threshold;

/// Number of utilization samples required by the adaptive classifiers.
pub const MIN_HISTORY_LENGTH: usize = 12;
