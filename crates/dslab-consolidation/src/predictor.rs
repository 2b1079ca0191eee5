//! Prediction of VM resource usage for the next cycle.

use crate::context::CycleContext;
use crate::log_trace;
use crate::vm::{UsageHistory, VirtualMachine};

/// Trait for implementation of usage predictors.
///
/// The predictor is a pure function of usage history, which returns the expected usage at the next cycle.
pub trait LoadPredictor {
    fn predict(&self, history: &UsageHistory) -> f64;
}

/// Exponential moving average over the two latest observations:
/// `alpha * latest + (1 - alpha) * previous`.
#[derive(Clone, Debug)]
pub struct EmaPredictor {
    alpha: f64,
}

impl EmaPredictor {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl LoadPredictor for EmaPredictor {
    fn predict(&self, history: &UsageHistory) -> f64 {
        self.alpha * history.latest() + (1. - self.alpha) * history.previous()
    }
}

/// Recomputes predicted CPU and memory usage of all VMs.
pub fn update_predictions(ctx: &CycleContext, vms: &mut [VirtualMachine], predictor: &dyn LoadPredictor) {
    for vm in vms.iter_mut() {
        let cpu = predictor.predict(vm.cpu_history());
        let memory = predictor.predict(vm.memory_history());
        vm.set_prediction(cpu, memory);
        log_trace!(ctx, "vm {} predicted cpu {:.3}, memory {:.3}", vm.id, cpu, memory);
    }
}
