//! Host overload detection.

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::config::options::{option_or, parse_config_value, parse_optional_options};
use crate::core::host::Host;
use crate::core::utilization_classifiers::inter_quartile_range::InterQuartileRange;
use crate::core::utilization_classifiers::median_absolute_deviation::MedianAbsoluteDeviation;
use crate::core::utilization_classifiers::static_threshold::StaticThreshold;

/// Result of host classification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub overloaded: bool,
    /// Decision metric used by the classifier, e.g. the upper utilization threshold.
    pub metric: f64,
}

/// Trait for implementation of host overload detection algorithms.
///
/// The classification must be a pure function of host state (current CPU load and utilization history),
/// so that it can be called repeatedly while the optimizer probes trial placements.
pub trait UtilizationClassifier: DynClone {
    fn classify(&self, host: &Host) -> Classification;

    fn is_overloaded(&self, host: &Host) -> bool {
        self.classify(host).overloaded
    }
}

clone_trait_object!(UtilizationClassifier);

pub fn classifier_resolver(config_str: &str) -> Box<dyn UtilizationClassifier> {
    let (algorithm_name, options_str) = parse_config_value(config_str);
    let options = parse_optional_options(&options_str);
    match algorithm_name.as_str() {
        "StaticThreshold" => Box::new(StaticThreshold::new(option_or(&options, "threshold", 0.8))),
        "MedianAbsoluteDeviation" => Box::new(MedianAbsoluteDeviation::new(
            option_or(&options, "safety", 2.5),
            option_or(&options, "fallback", 0.7),
        )),
        "InterQuartileRange" => Box::new(InterQuartileRange::new(
            option_or(&options, "safety", 1.5),
            option_or(&options, "fallback", 0.7),
        )),
        _ => panic!("Can't resolve: {}", config_str),
    }
}
