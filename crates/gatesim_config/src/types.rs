//! Configuration types deserialized from `gatesim.toml`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use gatesim_sim::time::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_US};
use gatesim_sim::{CircuitKind, MonitorMode, SimConfig, DEFAULT_MAX_DELTAS, DEFAULT_PERIOD_FS};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000 * FS_PER_MS;

/// The top-level run configuration parsed from `gatesim.toml`.
#[derive(Debug, Deserialize)]
pub struct GateSimConfig {
    /// The circuit to build.
    pub circuit: CircuitConfig,
    /// Stimulus timing.
    #[serde(default)]
    pub stimulus: StimulusConfig,
    /// Kernel limits.
    #[serde(default)]
    pub sim: SimSection,
    /// Monitor sampling.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Waveform output.
    #[serde(default)]
    pub waveform: WaveformConfig,
}

impl GateSimConfig {
    /// Kernel settings for this configuration.
    pub fn to_sim_config(&self) -> SimConfig {
        SimConfig {
            period_fs: self.stimulus.period.as_fs(),
            max_deltas: self.sim.max_deltas,
            time_limit: self.sim.time_limit.map(SimDuration::as_fs),
            monitor_mode: self.monitor.mode.into(),
            waveform_path: self.waveform_path(),
        }
    }

    /// Where to write the VCD file, if waveform output is enabled.
    ///
    /// Defaults to `<circuit name>.vcd` when no path is given.
    pub fn waveform_path(&self) -> Option<PathBuf> {
        if !self.waveform.enabled {
            return None;
        }
        Some(
            self.waveform
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.vcd", self.circuit.name))),
        )
    }
}

/// The `[circuit]` section.
#[derive(Debug, Deserialize)]
pub struct CircuitConfig {
    /// Name prefix for the circuit's signals and gates.
    pub name: String,
    /// Which circuit to build.
    pub kind: CircuitType,
    /// Number of primary inputs.
    pub inputs: usize,
}

/// Circuit selection in configuration files.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitType {
    /// An n-input XOR built from NAND cells.
    Xor,
    /// A single n-input NAND gate.
    Nand,
    /// A cascade of two-input NAND gates.
    NandChain,
}

impl From<CircuitType> for CircuitKind {
    fn from(ty: CircuitType) -> Self {
        match ty {
            CircuitType::Xor => CircuitKind::Xor,
            CircuitType::Nand => CircuitKind::Nand,
            CircuitType::NandChain => CircuitKind::NandChain,
        }
    }
}

/// The `[stimulus]` section.
#[derive(Debug, Deserialize)]
pub struct StimulusConfig {
    /// Time between input vectors.
    #[serde(default = "default_period")]
    pub period: SimDuration,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
        }
    }
}

fn default_period() -> SimDuration {
    SimDuration(DEFAULT_PERIOD_FS)
}

/// The `[sim]` section.
#[derive(Debug, Deserialize)]
pub struct SimSection {
    /// Delta-cycle limit per time step.
    #[serde(default = "default_max_deltas")]
    pub max_deltas: u32,
    /// Optional simulation time limit.
    #[serde(default)]
    pub time_limit: Option<SimDuration>,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            max_deltas: default_max_deltas(),
            time_limit: None,
        }
    }
}

fn default_max_deltas() -> u32 {
    DEFAULT_MAX_DELTAS
}

/// The `[monitor]` section.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorConfig {
    /// When to record a row.
    #[serde(default)]
    pub mode: SampleMode,
}

/// Monitor sampling mode in configuration files.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SampleMode {
    /// Every commit of a watched signal (default).
    #[default]
    OnCommit,
    /// Once per settled time step.
    OnSettled,
}

impl From<SampleMode> for MonitorMode {
    fn from(mode: SampleMode) -> Self {
        match mode {
            SampleMode::OnCommit => MonitorMode::OnCommit,
            SampleMode::OnSettled => MonitorMode::OnSettled,
        }
    }
}

/// The `[waveform]` section.
#[derive(Debug, Default, Deserialize)]
pub struct WaveformConfig {
    /// Whether to write a VCD file.
    #[serde(default)]
    pub enabled: bool,
    /// Output path.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A span of simulated time, written with a unit suffix (`"10ns"`, `"1 us"`).
///
/// Accepted units are `fs`, `ps`, `ns`, `us`, `ms` and `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimDuration(u64);

impl SimDuration {
    /// A duration of `fs` femtoseconds.
    pub fn from_fs(fs: u64) -> Self {
        Self(fs)
    }

    /// Length in femtoseconds.
    pub fn as_fs(self) -> u64 {
        self.0
    }
}

impl FromStr for SimDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(Self)
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.0;
        for (unit, scale) in [
            ("s", FS_PER_S),
            ("ms", FS_PER_MS),
            ("us", FS_PER_US),
            ("ns", FS_PER_NS),
            ("ps", FS_PER_PS),
        ] {
            if fs != 0 && fs % scale == 0 {
                return write!(f, "{}{unit}", fs / scale);
            }
        }
        write!(f, "{fs}fs")
    }
}

impl<'de> Deserialize<'de> for SimDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = SimDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a duration such as \"10ns\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}

/// Parses a duration string like `"100ns"` into femtoseconds.
pub fn parse_duration(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".into());
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(format!("invalid duration: no numeric value in '{s}'"));
    }
    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| format!("invalid number in duration '{s}'"))?;

    let unit = s[digit_end..].trim();
    let multiplier = match unit {
        "fs" => 1,
        "ps" => FS_PER_PS,
        "ns" => FS_PER_NS,
        "us" => FS_PER_US,
        "ms" => FS_PER_MS,
        "s" => FS_PER_S,
        "" => return Err(format!("missing unit in duration '{s}' (use fs, ps, ns, us, ms, or s)")),
        _ => return Err(format!("unknown duration unit '{unit}' (use fs, ps, ns, us, ms, or s)")),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
