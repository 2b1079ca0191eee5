use std::time::Instant;

use clap::Parser;
use log::error;

use dslab_consolidation::config::SimulationConfig;
use dslab_consolidation::simulation::ConsolidationSimulation;

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to simulation config (default parameters are used if not set)
    #[clap(short, long)]
    config: Option<String>,

    /// Random seed
    #[clap(short, long)]
    seed: Option<u64>,

    /// Number of cycles to simulate
    #[clap(long)]
    cycles: Option<u64>,

    /// Number of hosts
    #[clap(long)]
    hosts: Option<u32>,

    /// Number of VMs
    #[clap(long)]
    vms: Option<u32>,

    /// Path to save per-cycle statistics in CSV format
    #[clap(long)]
    cycle_log: Option<String>,
}

fn load_config(args: &Args) -> Result<SimulationConfig, dslab_consolidation::ConfigError> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(cycles) = args.cycles {
        config.cycles = cycles;
    }
    if let Some(hosts) = args.hosts {
        config.set_host_count(hosts);
    }
    if let Some(vms) = args.vms {
        config.vm_count = vms;
    }
    Ok(config)
}

fn main() {
    init_logger();

    let args = Args::parse();
    let simulation_start = Instant::now();

    let mut sim = match load_config(&args).and_then(ConsolidationSimulation::new) {
        Ok(sim) => sim,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let summary = sim.run();

    if let Some(path) = &args.cycle_log {
        if let Err(e) = sim.cycle_log().save_csv(path) {
            eprintln!("can't save cycle log to {}: {}", path, e);
        }
    }

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("can't serialize summary: {}", e),
    }
    eprintln!("Simulation process time {:.2?}", simulation_start.elapsed());
}
