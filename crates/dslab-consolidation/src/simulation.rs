//! Consolidation simulation, which drives the cycles and owns the state of the run.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;

use crate::config::SimulationConfig;
use crate::context::CycleContext;
use crate::cycle_log::{CycleLog, CycleStats};
use crate::demand::{DemandGenerator, InitialUsage};
use crate::energy::EnergyAccountant;
use crate::error::ConfigError;
use crate::executor::MigrationExecutor;
use crate::host::{hosts_from_config, Host};
use crate::load::HostLoads;
use crate::metrics::{summarize, RunTotals, SimulationSummary};
use crate::planner::ConsolidationPlanner;
use crate::predictor::{update_predictions, EmaPredictor, LoadPredictor};
use crate::vm::VirtualMachine;
use crate::watermark::{FeedbackController, WatermarkMonitor};
use crate::{log_debug, log_info};

/// Simulation of dynamic VM consolidation.
///
/// Each cycle consists of the following steps:
///
/// 1. demand update: one CPU and one memory observation is appended to every VM;
/// 2. prediction of VM usage for the next cycle;
/// 3. planning of migrations of lightly loaded VMs;
/// 4. execution of migrations and shutdown of hosts left without VMs;
/// 5. accounting of the energy saved by powered off hosts;
/// 6. watermark check, which relaxes the target utilization if some host is overloaded.
///
/// All state of the run is owned by the simulation, so independent runs do not affect each other.
pub struct ConsolidationSimulation {
    config: SimulationConfig,
    hosts: Vec<Host>,
    vms: Vec<VirtualMachine>,
    rand: Box<dyn RngCore>,
    demand: DemandGenerator,
    predictor: Box<dyn LoadPredictor>,
    planner: ConsolidationPlanner,
    executor: MigrationExecutor,
    energy: EnergyAccountant,
    monitor: WatermarkMonitor,
    feedback: FeedbackController,
    target_util: f64,
    migrations_total: u64,
    breaches_total: u64,
    cycle: u64,
    cycle_log: CycleLog,
}

impl ConsolidationSimulation {
    /// Creates simulation with hosts and VMs generated from the config.
    ///
    /// VM `i` is placed on host `i mod host_count`, its initial usage is sampled from the random generator
    /// seeded with `config.seed`.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rand = Pcg64::seed_from_u64(config.seed);
        let hosts = hosts_from_config(&config.hosts);
        let initial_usage = InitialUsage::from_config(&config.initial_usage);
        let host_count = hosts.len() as u32;
        let vms = (0..config.vm_count)
            .map(|id| {
                let (cpu, memory) = initial_usage.sample(&mut rand);
                VirtualMachine::new(id, id % host_count, cpu, memory)
            })
            .collect();
        Self::with_inventory(config, hosts, vms, Box::new(rand))
    }

    /// Creates simulation with the given hosts, VMs and random generator.
    ///
    /// Host and VM IDs must match their positions, every VM must be placed on an existing host.
    /// Host capacities and power draws are checked the same way as in host configs.
    pub fn with_inventory(
        config: SimulationConfig,
        hosts: Vec<Host>,
        vms: Vec<VirtualMachine>,
        rand: Box<dyn RngCore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some((pos, host)) = hosts.iter().enumerate().find(|(pos, h)| h.id as usize != *pos) {
            return Err(ConfigError::Inventory(format!("host {} is at position {}", host.id, pos)));
        }
        for host in &hosts {
            host.validate()?;
        }
        if let Some((pos, vm)) = vms.iter().enumerate().find(|(pos, vm)| vm.id as usize != *pos) {
            return Err(ConfigError::Inventory(format!("vm {} is at position {}", vm.id, pos)));
        }
        if let Some(vm) = vms.iter().find(|vm| vm.host_id() as usize >= hosts.len()) {
            return Err(ConfigError::Inventory(format!(
                "vm {} is placed on unknown host {}",
                vm.id,
                vm.host_id()
            )));
        }

        Ok(Self {
            hosts,
            vms,
            rand,
            demand: DemandGenerator::from_config(&config.demand),
            predictor: Box::new(EmaPredictor::new(config.alpha)),
            planner: ConsolidationPlanner::new(config.low_usage_threshold),
            executor: MigrationExecutor::new(),
            energy: EnergyAccountant::new(),
            monitor: WatermarkMonitor::new(config.hi_watermark),
            feedback: FeedbackController::new(config.feedback.step, config.feedback.min_target_util),
            target_util: config.target_util,
            migrations_total: 0,
            breaches_total: 0,
            cycle: 0,
            cycle_log: CycleLog::new(),
            config,
        })
    }

    /// Replaces the usage predictor.
    pub fn set_predictor(&mut self, predictor: Box<dyn LoadPredictor>) {
        self.predictor = predictor;
    }

    /// Replaces the demand generator.
    pub fn set_demand_generator(&mut self, demand: DemandGenerator) {
        self.demand = demand;
    }

    /// Replaces the consolidation planner.
    pub fn set_planner(&mut self, planner: ConsolidationPlanner) {
        self.planner = planner;
    }

    /// Performs a single consolidation cycle.
    pub fn step(&mut self) -> CycleStats {
        let ctx = CycleContext::new("simulation", self.cycle);

        self.demand.update(&ctx.component("demand"), &mut self.vms, &mut *self.rand);
        update_predictions(&ctx.component("predictor"), &mut self.vms, &*self.predictor);

        let plan = self
            .planner
            .plan(&ctx.component("planner"), &self.hosts, &self.vms, self.target_util);

        let executor_ctx = ctx.component("executor");
        let migrations = self.executor.apply(&executor_ctx, &mut self.vms, &plan.migrations);
        self.migrations_total += migrations;
        let powered_off = self
            .executor
            .shutdown_idle_hosts(&executor_ctx, &mut self.hosts, &self.vms);

        let energy_kwh = self.energy.account(&self.hosts, self.config.dt_hours);

        let monitor_ctx = ctx.component("monitor");
        let loads = HostLoads::predicted(&self.hosts, &self.vms);
        let overloaded = self.monitor.overloaded_hosts(&self.hosts, &loads);
        let breach = !overloaded.is_empty();
        if breach {
            self.breaches_total += 1;
            let target_util = self.feedback.adjust(self.target_util);
            log_debug!(
                monitor_ctx,
                "hosts {:?} are above high watermark, target utilization {} -> {}",
                overloaded,
                self.target_util,
                target_util
            );
            self.target_util = target_util;
        }

        let stats = CycleStats {
            cycle: self.cycle,
            candidates: plan.candidates,
            migrations,
            hosts_powered_off: powered_off.len(),
            hosts_on: loads.len(),
            energy_kwh,
            energy_kwh_total: self.energy.energy_saved(),
            migrations_total: self.migrations_total,
            breach,
            breaches_total: self.breaches_total,
            target_util: self.target_util,
        };
        log_info!(
            ctx,
            "{} migrations, {} hosts on, {:.3} kWh saved in total",
            stats.migrations,
            stats.hosts_on,
            stats.energy_kwh_total
        );
        self.cycle_log.push(stats.clone());
        self.cycle += 1;
        stats
    }

    /// Performs the specified number of cycles.
    pub fn steps(&mut self, count: u64) {
        for _ in 0..count {
            self.step();
        }
    }

    /// Performs the remaining configured cycles and returns the run summary.
    pub fn run(&mut self) -> SimulationSummary {
        while self.cycle < self.config.cycles {
            self.step();
        }
        self.summary()
    }

    /// Returns summary statistics of the current state.
    pub fn summary(&self) -> SimulationSummary {
        summarize(&self.hosts, &self.vms, &self.totals())
    }

    fn totals(&self) -> RunTotals {
        RunTotals {
            energy_kwh: self.energy.energy_saved(),
            migrations: self.migrations_total,
            breaches: self.breaches_total,
            target_util: self.target_util,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, id: u32) -> Option<&Host> {
        self.hosts.get(id as usize)
    }

    pub fn vms(&self) -> &[VirtualMachine] {
        &self.vms
    }

    pub fn vm(&self, id: u32) -> Option<&VirtualMachine> {
        self.vms.get(id as usize)
    }

    /// Returns the number of performed cycles.
    pub fn current_cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns the current target utilization.
    pub fn target_util(&self) -> f64 {
        self.target_util
    }

    pub fn migrations_total(&self) -> u64 {
        self.migrations_total
    }

    pub fn breaches_total(&self) -> u64 {
        self.breaches_total
    }

    /// Returns the total energy in kWh saved so far (not rounded).
    pub fn energy_saved(&self) -> f64 {
        self.energy.energy_saved()
    }

    pub fn cycle_log(&self) -> &CycleLog {
        &self.cycle_log
    }
}
