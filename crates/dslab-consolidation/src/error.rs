//! Configuration errors.

use thiserror::Error;

/// Error returned when a simulation cannot be configured.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value of {name}: {value} (expected {expected})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{vm_count} VMs are configured but there are no hosts to place them")]
    NoHosts { vm_count: u32 },

    #[error("invalid inventory: {0}")]
    Inventory(String),
}
