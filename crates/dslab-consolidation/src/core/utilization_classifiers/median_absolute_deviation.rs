//! Adaptive overload detection based on median absolute deviation.

use crate::core::host::Host;
use crate::core::stats::mad;
use crate::core::utilization_classifier::{Classification, UtilizationClassifier};
use crate::core::utilization_classifiers::static_threshold::StaticThreshold;
use crate::core::utilization_classifiers::MIN_HISTORY_LENGTH;

/// Uses upper threshold `1 - safety * MAD` computed over the host utilization history.
///
/// While the history is too short, falls back to the static threshold.
#[derive(Clone)]
pub struct MedianAbsoluteDeviation {
    safety: f64,
    fallback: StaticThreshold,
}

impl MedianAbsoluteDeviation {
    pub fn new(safety: f64, fallback_threshold: f64) -> Self {
        Self {
            safety,
            fallback: StaticThreshold::new(fallback_threshold),
        }
    }
}

impl UtilizationClassifier for MedianAbsoluteDeviation {
    fn classify(&self, host: &Host) -> Classification {
        let history = host.utilization_history();
        if history.len() < MIN_HISTORY_LENGTH {
            return self.fallback.classify(host);
        }
        let threshold = 1. - self.safety * mad(&history);
        Classification {
            overloaded: host.cpu_load() > threshold,
            metric: threshold,
        }
    }
}
