#![doc = include_str!("../readme.md")]

pub mod config;
pub mod context;
pub mod cycle_log;
pub mod demand;
pub mod energy;
pub mod error;
pub mod executor;
pub mod host;
pub mod load;
pub mod log;
pub mod metrics;
pub mod planner;
pub mod predictor;
pub mod simulation;
pub mod vm;
pub mod watermark;

pub use colored;
pub use config::SimulationConfig;
pub use context::CycleContext;
pub use error::ConfigError;
pub use metrics::SimulationSummary;
pub use simulation::ConsolidationSimulation;
