//! Static threshold overload detection.

use crate::core::host::Host;
use crate::core::utilization_classifier::{Classification, UtilizationClassifier};

/// Considers host overloaded when its CPU load exceeds the fixed threshold.
#[derive(Clone)]
pub struct StaticThreshold {
    threshold: f64,
}

impl StaticThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl UtilizationClassifier for StaticThreshold {
    fn classify(&self, host: &Host) -> Classification {
        Classification {
            overloaded: host.cpu_load() > self.threshold,
            metric: self.threshold,
        }
    }
}
