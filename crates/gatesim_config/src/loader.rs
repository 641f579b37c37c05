//! Configuration file loading and validation.

use std::path::Path;

use gatesim_sim::chain::CHAIN_MIN_INPUTS;
use gatesim_sim::stimulus::{exhaustive_duration_fs, MAX_EXHAUSTIVE_INPUTS};

use crate::error::ConfigError;
use crate::types::GateSimConfig;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "gatesim.toml";

/// Loads and validates `gatesim.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<GateSimConfig, ConfigError> {
    load_config_from_path(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_from_path(path: &Path) -> Result<GateSimConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `gatesim.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<GateSimConfig, ConfigError> {
    let config: GateSimConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &GateSimConfig) -> Result<(), ConfigError> {
    if config.circuit.name.is_empty() {
        return Err(ConfigError::MissingField("circuit.name".to_string()));
    }
    if config.circuit.inputs < CHAIN_MIN_INPUTS {
        return Err(ConfigError::ValidationError(format!(
            "circuit.inputs must be at least {CHAIN_MIN_INPUTS}, got {}",
            config.circuit.inputs
        )));
    }
    if config.circuit.inputs > MAX_EXHAUSTIVE_INPUTS {
        return Err(ConfigError::ValidationError(format!(
            "circuit.inputs must be at most {MAX_EXHAUSTIVE_INPUTS}, got {}",
            config.circuit.inputs
        )));
    }
    if config.stimulus.period.as_fs() == 0 {
        return Err(ConfigError::ValidationError(
            "stimulus.period must be non-zero".to_string(),
        ));
    }
    if exhaustive_duration_fs(config.circuit.inputs, config.stimulus.period.as_fs()).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "stimulus.period of {} fs times {} input vectors overflows simulation time",
            config.stimulus.period.as_fs(),
            (1u64 << config.circuit.inputs) + 1
        )));
    }
    if config.sim.max_deltas == 0 {
        return Err(ConfigError::ValidationError(
            "sim.max_deltas must be non-zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CircuitType, SampleMode};
    use gatesim_sim::time::{FS_PER_NS, FS_PER_US};

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[circuit]
name = "exor"
kind = "xor"
inputs = 3
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.circuit.name, "exor");
        assert_eq!(config.circuit.kind, CircuitType::Xor);
        assert_eq!(config.circuit.inputs, 3);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[circuit]
name = "chain"
kind = "nand-chain"
inputs = 5

[stimulus]
period = "20ns"

[sim]
max_deltas = 64
time_limit = "1us"

[monitor]
mode = "on-settled"

[waveform]
enabled = true
path = "out/chain.vcd"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.circuit.kind, CircuitType::NandChain);
        assert_eq!(config.stimulus.period.as_fs(), 20 * FS_PER_NS);
        assert_eq!(config.monitor.mode, SampleMode::OnSettled);

        let sim = config.to_sim_config();
        assert_eq!(sim.max_deltas, 64);
        assert_eq!(sim.time_limit, Some(FS_PER_US));
        assert_eq!(
            sim.waveform_path.as_deref(),
            Some(Path::new("out/chain.vcd"))
        );
    }

    #[test]
    fn default_values() {
        let toml = r#"
[circuit]
name = "n"
kind = "nand"
inputs = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        let sim = config.to_sim_config();
        assert_eq!(sim.period_fs, 10 * FS_PER_NS);
        assert_eq!(sim.max_deltas, gatesim_sim::DEFAULT_MAX_DELTAS);
        assert_eq!(sim.time_limit, None);
        assert_eq!(sim.monitor_mode, gatesim_sim::MonitorMode::OnCommit);
        assert!(sim.waveform_path.is_none());
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[circuit]
name = ""
kind = "xor"
inputs = 3
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn missing_circuit_section_errors() {
        let err = load_config_from_str("[sim]\nmax_deltas = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn too_few_inputs_errors() {
        let toml = r#"
[circuit]
name = "x"
kind = "xor"
inputs = 1
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn too_many_inputs_errors() {
        let toml = r#"
[circuit]
name = "x"
kind = "xor"
inputs = 40
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("at most"));
    }

    #[test]
    fn zero_period_errors() {
        let toml = r#"
[circuit]
name = "x"
kind = "xor"
inputs = 2

[stimulus]
period = "0ns"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_kind_errors() {
        let toml = r#"
[circuit]
name = "x"
kind = "mux"
inputs = 2
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[circuit]\nname = \"exor\"\nkind = \"xor\"\ninputs = 4\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.circuit.inputs, 4);
    }

    #[test]
    fn period_too_long_for_input_count_errors() {
        let toml = r#"
[circuit]
name = "exor"
kind = "xor"
inputs = 15

[stimulus]
period = "1s"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref msg) if msg.contains("overflows")));

        // The same period is fine for a small circuit.
        let toml = toml.replace("inputs = 15", "inputs = 3");
        assert!(load_config_from_str(&toml).is_ok());
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
