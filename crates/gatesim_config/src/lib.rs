//! Parsing and validation of `gatesim.toml` run configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`GateSimConfig`] describing the circuit to build, the stimulus period,
//! kernel limits, and waveform output.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_path, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
