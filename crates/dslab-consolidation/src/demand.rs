//! Synthetic demand of virtual machines.

use std::f64::consts::PI;

use dyn_clone::{clone_trait_object, DynClone};
use rand::distributions::{Distribution, Uniform};
use rand::RngCore;

use crate::config::{DemandConfig, InitialUsageConfig};
use crate::context::CycleContext;
use crate::log_trace;
use crate::vm::VirtualMachine;

/// A demand model is a function, which defines the change of VM CPU usage at the given cycle.
///
/// Each invocation must consume the same amount of randomness from `rand` so that seeded runs are reproducible.
pub trait DemandModel: DynClone {
    fn next_delta(&self, cycle: u64, rand: &mut dyn RngCore) -> f64;
}

clone_trait_object!(DemandModel);

/// Diurnal-like drift: a sine wave with the given period plus uniform noise.
///
/// `delta = amplitude * sin(2 * pi * (cycle mod period) / period) + U(-noise, noise)`
#[derive(Clone)]
pub struct DiurnalDemandModel {
    amplitude: f64,
    period: u64,
    noise: Uniform<f64>,
}

impl DiurnalDemandModel {
    pub fn new(amplitude: f64, noise: f64, period: u64) -> Self {
        Self {
            amplitude,
            period: period.max(1),
            noise: Uniform::new_inclusive(-noise, noise),
        }
    }

    pub fn from_config(config: &DemandConfig) -> Self {
        Self::new(config.amplitude, config.noise, config.period)
    }
}

impl DemandModel for DiurnalDemandModel {
    fn next_delta(&self, cycle: u64, rand: &mut dyn RngCore) -> f64 {
        let phase = 2. * PI * (cycle % self.period) as f64 / self.period as f64;
        self.amplitude * phase.sin() + self.noise.sample(rand)
    }
}

/// Updates VM usage histories with new observations produced by demand model.
///
/// Memory drift is coupled to CPU drift: memory usage changes by `memory_ratio` times the CPU delta.
/// Observations are bounded to `[0, 100]` percents.
#[derive(Clone)]
pub struct DemandGenerator {
    model: Box<dyn DemandModel>,
    memory_ratio: f64,
}

impl DemandGenerator {
    pub fn new(model: Box<dyn DemandModel>, memory_ratio: f64) -> Self {
        Self { model, memory_ratio }
    }

    pub fn from_config(config: &DemandConfig) -> Self {
        Self::new(Box::new(DiurnalDemandModel::from_config(config)), config.memory_ratio)
    }

    /// Appends one CPU and one memory observation to every VM.
    ///
    /// VMs are processed in the given order, one demand sample per VM.
    pub fn update(&self, ctx: &CycleContext, vms: &mut [VirtualMachine], rand: &mut dyn RngCore) {
        for vm in vms.iter_mut() {
            let delta = self.model.next_delta(ctx.cycle(), rand);
            let cpu = bounded(vm.cpu_history().latest() + delta, 0., 100.);
            let memory = bounded(vm.memory_history().latest() + delta * self.memory_ratio, 0., 100.);
            vm.record_usage(cpu, memory);
            log_trace!(ctx, "vm {} observed cpu {:.3}, memory {:.3}", vm.id, cpu, memory);
        }
    }
}

/// Samples usage of VMs at the start of the run.
#[derive(Clone)]
pub struct InitialUsage {
    cpu: Uniform<f64>,
    memory_ratio: f64,
    memory_min: f64,
    memory_max: f64,
}

impl InitialUsage {
    pub fn from_config(config: &InitialUsageConfig) -> Self {
        Self {
            cpu: Uniform::new_inclusive(config.cpu_min, config.cpu_max),
            memory_ratio: config.memory_ratio,
            memory_min: config.memory_min,
            memory_max: config.memory_max,
        }
    }

    /// Returns initial CPU and memory usage of the next VM, consumes one random sample.
    pub fn sample(&self, rand: &mut dyn RngCore) -> (f64, f64) {
        let cpu = self.cpu.sample(rand);
        let memory = bounded(cpu * self.memory_ratio, self.memory_min, self.memory_max);
        (cpu, memory)
    }
}

fn bounded(value: f64, lo: f64, hi: f64) -> f64 {
    lo.max(hi.min(value))
}
