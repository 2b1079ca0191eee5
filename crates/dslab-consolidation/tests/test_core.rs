use std::collections::BTreeSet;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;

use dslab_consolidation::config::{HostConfig, SimulationConfig};
use dslab_consolidation::demand::{DemandGenerator, DemandModel};
use dslab_consolidation::error::ConfigError;
use dslab_consolidation::host::{Host, PowerState};
use dslab_consolidation::metrics::SimulationSummary;
use dslab_consolidation::predictor::LoadPredictor;
use dslab_consolidation::simulation::ConsolidationSimulation;
use dslab_consolidation::vm::{UsageHistory, VirtualMachine};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn zero_drift_config(host_count: u32, vm_count: u32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.set_host_count(host_count);
    config.vm_count = vm_count;
    config.demand.amplitude = 0.;
    config.demand.noise = 0.;
    config
}

fn default_hosts(count: u32) -> Vec<Host> {
    (0..count).map(|id| Host::from_config(id, &HostConfig::default())).collect()
}

fn simulation(config: SimulationConfig, hosts: Vec<Host>, vms: Vec<VirtualMachine>) -> ConsolidationSimulation {
    init_logger();
    ConsolidationSimulation::with_inventory(config, hosts, vms, Box::new(Pcg64::seed_from_u64(123))).unwrap()
}

#[test]
// Single VM is always a candidate, but the only host is its own host, so nothing moves
// and the host keeps running.
fn test_single_host_single_vm() {
    init_logger();
    let mut config = zero_drift_config(1, 1);
    config.low_usage_threshold = 100.;
    config.target_util = 0.8;
    config.cycles = 1;
    let mut sim = ConsolidationSimulation::new(config).unwrap();

    let summary = sim.run();

    assert_eq!(sim.cycle_log().entries().len(), 1);
    assert_eq!(sim.cycle_log().entries()[0].candidates, 1);
    assert_eq!(summary.migrations_total, 0);
    assert_eq!(summary.hosts_off_final, 0);
    assert_eq!(summary.energy_kwh_total, 0.);
    assert_eq!(sim.host(0).unwrap().power_state(), PowerState::On);
}

#[test]
// VM 0 (20% CPU) is considered first and stays on host 0, then VM 1 (10% CPU) fits on host 0
// (20 + 10 <= 80), so host 1 becomes empty and is turned off.
// Energy saved is 120 W * 1 h / 1000 = 0.12 kWh, host 0 utilization is 30%.
fn test_two_host_forced_migration() {
    let mut config = zero_drift_config(2, 2);
    config.cycles = 1;
    let vms = vec![VirtualMachine::new(0, 0, 20., 16.), VirtualMachine::new(1, 1, 10., 8.)];
    let mut sim = simulation(config, default_hosts(2), vms);

    let summary = sim.run();

    assert_eq!(sim.vm(0).unwrap().host_id(), 0);
    assert_eq!(sim.vm(1).unwrap().host_id(), 0);
    assert_eq!(sim.host(0).unwrap().power_state(), PowerState::On);
    assert_eq!(sim.host(1).unwrap().power_state(), PowerState::Off);
    assert_eq!(summary.migrations_total, 1);
    assert_eq!(summary.hosts_off_final, 1);
    assert_eq!(summary.energy_kwh_total, 120. * 1. / 1000.);
    assert_eq!(summary.util_mean_final, 0.3);
    assert_eq!(summary.util_p95_final, 0.3);
    assert_eq!(summary.hi_watermark_breaches, 0);
    assert_eq!(summary.final_target_util, 0.8);
}

#[test]
// Two VMs with 50% CPU each load the only host by 100%, which is above the 90% watermark in every cycle.
// Target utilization is relaxed by 0.02 per cycle: 0.8 -> 0.78 -> 0.76 -> 0.74.
fn test_watermark_breach_relaxes_target() {
    let config = zero_drift_config(1, 2);
    let vms = vec![VirtualMachine::new(0, 0, 50., 40.), VirtualMachine::new(1, 0, 50., 40.)];
    let mut sim = simulation(config, default_hosts(1), vms);

    sim.steps(3);
    let summary = sim.summary();

    assert_eq!(sim.breaches_total(), 3);
    assert_eq!(summary.hi_watermark_breaches, 3);
    assert_eq!(summary.final_target_util, 0.74);
    assert_eq!(summary.migrations_total, 0);
    assert_eq!(summary.util_mean_final, 1.);
    let targets: Vec<f64> = sim.cycle_log().entries().iter().map(|s| s.target_util).collect();
    assert_eq!(targets, vec![0.78, 0.76, 0.74]);
}

#[test]
// Target utilization stops at the configured floor.
fn test_target_util_floor() {
    let mut config = zero_drift_config(1, 2);
    config.target_util = 0.75;
    let vms = vec![VirtualMachine::new(0, 0, 50., 40.), VirtualMachine::new(1, 0, 50., 40.)];
    let mut sim = simulation(config, default_hosts(1), vms);

    sim.steps(5);

    assert_eq!(sim.breaches_total(), 5);
    assert_eq!(sim.target_util(), 0.7);
}

#[test]
// Hosts 1 and 2 have no VMs from the start and are turned off in the first cycle.
// Each cycle saves (150 + 200) W * 0.5 h / 1000 = 0.175 kWh.
fn test_energy_of_idle_hosts() {
    let mut config = zero_drift_config(3, 1);
    config.dt_hours = 0.5;
    let hosts = vec![
        Host::new(0, 100., 100., 100., 300.),
        Host::new(1, 100., 100., 150., 300.),
        Host::new(2, 100., 100., 200., 300.),
    ];
    let vms = vec![VirtualMachine::new(0, 0, 40., 32.)];
    let mut sim = simulation(config, hosts, vms);

    let first = sim.step();
    assert_eq!(first.hosts_powered_off, 2);
    assert_eq!(first.hosts_on, 1);
    assert_eq!(first.energy_kwh, 0.175);

    let second = sim.step();
    assert_eq!(second.hosts_powered_off, 0);
    assert_eq!(sim.energy_saved(), 0.35);
    assert_eq!(sim.summary().energy_kwh_total, 0.35);
}

#[test]
fn test_history_grows_every_cycle() {
    let config = zero_drift_config(2, 2);
    let vms = vec![VirtualMachine::new(0, 0, 40., 32.), VirtualMachine::new(1, 1, 50., 40.)];
    let mut sim = simulation(config, default_hosts(2), vms);

    sim.steps(4);

    for vm in sim.vms() {
        assert_eq!(vm.cpu_history().count(), 6);
        assert_eq!(vm.memory_history().count(), 6);
    }
    // without drift the usage stays the same
    assert_eq!(sim.vm(1).unwrap().cpu_history().latest(), 50.);
    assert_eq!(sim.vm(1).unwrap().predicted_cpu(), 50.);
}

#[test]
fn test_determinism() {
    let mut first = ConsolidationSimulation::new(SimulationConfig::default()).unwrap();
    let mut second = ConsolidationSimulation::new(SimulationConfig::default()).unwrap();

    let first_summary = first.run();
    let second_summary = second.run();

    assert_eq!(first_summary, second_summary);
    assert_eq!(first.cycle_log().entries(), second.cycle_log().entries());
    assert_eq!(first.vms(), second.vms());
}

#[test]
fn test_independent_runs_with_different_seeds() {
    let mut sim = ConsolidationSimulation::new(SimulationConfig::default()).unwrap();
    let mut config = SimulationConfig::default();
    config.seed = 8;
    let mut other = ConsolidationSimulation::new(config).unwrap();

    sim.run();
    other.run();

    assert_ne!(sim.vms(), other.vms());
}

#[test]
fn test_default_run_properties() {
    let config = SimulationConfig::default();
    let min_target_util = config.feedback.min_target_util;
    let mut sim = ConsolidationSimulation::new(config).unwrap();

    let mut off_hosts = BTreeSet::new();
    while sim.current_cycle() < sim.config().cycles {
        sim.step();
        for id in off_hosts.iter() {
            assert_eq!(sim.host(*id).unwrap().power_state(), PowerState::Off);
        }
        off_hosts.extend(sim.hosts().iter().filter(|h| !h.is_on()).map(|h| h.id));
        // every VM is on a host that exists
        assert!(sim.vms().iter().all(|vm| sim.host(vm.host_id()).is_some()));
    }

    let entries = sim.cycle_log().entries();
    assert_eq!(entries.len(), 24);
    let mut prev_target = sim.config().target_util;
    for (prev, next) in entries.iter().zip(entries.iter().skip(1)) {
        assert!(next.energy_kwh_total >= prev.energy_kwh_total);
        assert!(next.migrations_total >= prev.migrations_total);
        assert!(next.breaches_total >= prev.breaches_total);
        assert!(next.hosts_on <= prev.hosts_on);
    }
    for stats in entries {
        assert!(stats.energy_kwh >= 0.);
        assert!(stats.target_util <= prev_target);
        assert!(stats.target_util >= min_target_util);
        prev_target = stats.target_util;
    }

    let summary = sim.summary();
    assert_eq!(summary.migrations_total, sim.migrations_total());
    assert_eq!(summary.hosts_off_final as usize, off_hosts.len());
    assert_eq!(summary.hosts_off_final as usize + entries[23].hosts_on, 20);
    assert!(summary.util_mean_final >= 0.);
    assert!(summary.util_p95_final >= 0.);
}

#[test]
fn test_run_from_config_file() {
    let config = SimulationConfig::from_file("test-configs/config.yaml").unwrap();
    let mut sim = ConsolidationSimulation::new(config).unwrap();

    let summary = sim.run();

    assert_eq!(sim.hosts().len(), 6);
    assert_eq!(sim.vms().len(), 30);
    assert_eq!(sim.current_cycle(), 12);
    assert_eq!(sim.host(4).unwrap().cpu_capacity, 200.);
    assert!(summary.final_target_util >= 0.6);
    assert!(summary.final_target_util <= 0.75);
    assert_eq!(sim.host(5).unwrap().idle_power, 200.);
    assert_eq!(sim.host(5).unwrap().peak_power, 300.);
}

#[test]
fn test_initial_placement_is_round_robin() {
    let mut config = SimulationConfig::default();
    config.cycles = 0;
    let sim = ConsolidationSimulation::new(config).unwrap();

    for vm in sim.vms() {
        assert_eq!(vm.host_id(), vm.id % 20);
        let cpu = vm.cpu_history().latest();
        assert!((10. ..=60.).contains(&cpu));
        assert_eq!(vm.cpu_history().previous(), cpu);
        assert_eq!(vm.predicted_cpu(), cpu);
        assert_eq!(vm.memory_history().latest(), (cpu * 0.8).clamp(5., 80.));
    }
}

#[test]
fn test_invalid_inventory() {
    let config = zero_drift_config(1, 1);
    let vms = vec![VirtualMachine::new(0, 3, 20., 16.)];
    let rand = Box::new(Pcg64::seed_from_u64(1));
    let result = ConsolidationSimulation::with_inventory(config, default_hosts(1), vms, rand);
    assert!(matches!(result, Err(ConfigError::Inventory(_))));

    let config = zero_drift_config(1, 1);
    let vms = vec![VirtualMachine::new(5, 0, 20., 16.)];
    let rand = Box::new(Pcg64::seed_from_u64(1));
    let result = ConsolidationSimulation::with_inventory(config, default_hosts(1), vms, rand);
    assert!(matches!(result, Err(ConfigError::Inventory(_))));
}

#[test]
// Explicit hosts go through the same range checks as host configs.
fn test_invalid_host_inventory() {
    let mut hosts = default_hosts(2);
    hosts[1].cpu_capacity = -10.;
    let vms = vec![VirtualMachine::new(0, 0, 20., 16.)];
    let rand = Box::new(Pcg64::seed_from_u64(1));
    let result = ConsolidationSimulation::with_inventory(zero_drift_config(2, 1), hosts, vms, rand);
    assert!(matches!(
        result,
        Err(ConfigError::OutOfRange {
            name: "hosts.cpu_capacity",
            ..
        })
    ));

    let mut hosts = default_hosts(2);
    hosts[0].idle_power = f64::NAN;
    let vms = vec![VirtualMachine::new(0, 0, 20., 16.)];
    let rand = Box::new(Pcg64::seed_from_u64(1));
    let result = ConsolidationSimulation::with_inventory(zero_drift_config(2, 1), hosts, vms, rand);
    assert!(matches!(
        result,
        Err(ConfigError::OutOfRange {
            name: "hosts.idle_power",
            ..
        })
    ));
}

#[test]
// Summary is written with the result field names and can be read back.
fn test_summary_json() {
    init_logger();
    let mut config = SimulationConfig::default();
    config.cycles = 4;
    let mut sim = ConsolidationSimulation::new(config).unwrap();
    let summary = sim.run();

    let last = sim.cycle_log().last().unwrap();
    assert_eq!(last.cycle, 3);
    assert_eq!(last.migrations_total, summary.migrations_total);
    assert_eq!(last.breaches_total, summary.hi_watermark_breaches);

    let json = serde_json::to_value(&summary).unwrap();
    for key in [
        "energy_kwh_total",
        "migrations_total",
        "hosts_off_final",
        "util_mean_final",
        "util_p95_final",
        "hi_watermark_breaches",
        "final_target_util",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    let restored: SimulationSummary = serde_json::from_value(json).unwrap();
    assert_eq!(restored, summary);
}

#[test]
fn test_cycle_log_csv() {
    init_logger();
    let mut config = SimulationConfig::default();
    config.cycles = 3;
    let mut sim = ConsolidationSimulation::new(config).unwrap();
    sim.run();

    let path = std::env::temp_dir().join("dslab-consolidation-cycle-log.csv");
    let path = path.to_str().unwrap();
    sim.cycle_log().save_csv(path).unwrap();

    let data = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = data.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("cycle,candidates,migrations"));
    std::fs::remove_file(path).unwrap();
}

#[derive(Clone)]
struct ConstantGrowth {
    delta: f64,
}

impl DemandModel for ConstantGrowth {
    fn next_delta(&self, _cycle: u64, rand: &mut dyn RngCore) -> f64 {
        rand.next_u64();
        self.delta
    }
}

struct LatestValue;

impl LoadPredictor for LatestValue {
    fn predict(&self, history: &UsageHistory) -> f64 {
        history.latest()
    }
}

#[test]
// CPU grows by 30 per cycle and memory by 15 (memory ratio 0.5), observations are bounded by 100.
fn test_custom_demand_and_predictor() {
    let config = zero_drift_config(1, 1);
    let vms = vec![VirtualMachine::new(0, 0, 40., 20.)];
    let mut sim = simulation(config, default_hosts(1), vms);
    sim.set_demand_generator(DemandGenerator::new(Box::new(ConstantGrowth { delta: 30. }), 0.5));
    sim.set_predictor(Box::new(LatestValue));

    sim.step();
    assert_eq!(sim.vm(0).unwrap().predicted_cpu(), 70.);
    assert_eq!(sim.vm(0).unwrap().predicted_memory(), 35.);

    sim.step();
    let vm = sim.vm(0).unwrap();
    assert_eq!(vm.cpu_history().previous(), 70.);
    assert_eq!(vm.cpu_history().latest(), 100.);
    assert_eq!(vm.predicted_cpu(), 100.);
    assert_eq!(vm.predicted_memory(), 50.);
    // 100% CPU is above the watermark
    assert_eq!(sim.breaches_total(), 1);
}
