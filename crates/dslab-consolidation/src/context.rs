//! Accessing the datacenter clock from components.

use std::cell::Cell;
use std::rc::Rc;

/// A named handle on the shared datacenter clock.
///
/// Every component driven by the datacenter (the datacenter itself, the migration optimizer, drivers) owns a context,
/// which is used to timestamp history samples and log records.
#[derive(Clone)]
pub struct SimulationContext {
    name: String,
    clock: Rc<Cell<f64>>,
}

impl SimulationContext {
    pub(crate) fn new(name: &str, clock: Rc<Cell<f64>>) -> Self {
        Self {
            name: name.to_owned(),
            clock,
        }
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.clock.get()
    }
}
