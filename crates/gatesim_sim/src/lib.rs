//! Discrete-event gate-level logic simulator.
//!
//! This crate simulates networks of multi-input NAND gates over two-valued
//! signals with delta-cycle semantics: external writes and gate outputs are
//! held as pending values, committed together in an update phase, and only
//! then seen by the gates that read them. A time step is finished once an
//! update phase triggers nothing.
//!
//! # Architecture
//!
//! A [`Netlist`] owns every signal and gate in two arenas addressed by
//! [`SignalId`] and [`GateId`]; each signal records its single driver. The
//! [`SimKernel`] takes the netlist, builds a signal-to-gate subscription table
//! and runs the update/evaluate loop. Stimulus sources, observers and
//! waveform recorders plug in through the [`Stimulus`], [`Observer`] and
//! [`WaveformRecorder`] traits.
//!
//! # Usage
//!
//! ```ignore
//! use gatesim_sim::{simulate, Circuit, CircuitKind, SimConfig};
//!
//! let circuit = Circuit::build(CircuitKind::Xor, "exor", 3)?;
//! let report = simulate(circuit, &SimConfig::default())?;
//! print!("{}", report.monitor.render());
//! ```
//!
//! # Modules
//!
//! - `arena`: Typed index arenas
//! - `error`: Construction and simulation errors
//! - `time`: Femtosecond time with delta cycles
//! - `signal`: Signal state, pending writes and drivers
//! - `gate`: The NAND primitive
//! - `netlist`: Signal/gate ownership and single-driver checks
//! - `chain`: Chained multi-input builders
//! - `kernel`: Update phase, delta cycles and time advance
//! - `stimulus`: Input drivers
//! - `monitor`: Observers, sampling and output checks
//! - `waveform`: Waveform recording (VCD format)

#![warn(missing_docs)]

pub mod arena;
pub mod chain;
pub mod error;
pub mod gate;
pub mod kernel;
pub mod monitor;
pub mod netlist;
pub mod signal;
pub mod stimulus;
pub mod time;
pub mod waveform;

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tracing::{debug, info};

pub use chain::{ChainSpec, GateChain, Stage, StageKind};
pub use error::SimError;
pub use gate::{GateId, NandGate};
pub use kernel::{SettleReport, SimKernel, SimResult, DEFAULT_MAX_DELTAS};
pub use monitor::{Mismatch, Monitor, MonitorMode, NullObserver, Observer, OutputCheck, Sample};
pub use netlist::Netlist;
pub use signal::{Driver, SignalId, SignalState};
pub use stimulus::{ExhaustiveStimulus, Stimulus, DEFAULT_PERIOD_FS};
pub use time::SimTime;
pub use waveform::{VcdRecorder, WaveformRecorder};

/// The circuits the simulator can build from a name and an input count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CircuitKind {
    /// A single NAND gate with `n` inputs.
    Nand,
    /// A cascade of two-input NAND gates.
    NandChain,
    /// An `n`-input XOR (odd parity) built from NAND-only XOR cells.
    Xor,
}

impl CircuitKind {
    /// Reference function the settled output must match.
    pub fn reference(self, inputs: &[bool]) -> bool {
        match self {
            CircuitKind::Nand => gate::nand(inputs.iter().copied()),
            CircuitKind::NandChain => StageKind::Nand.fold(inputs),
            CircuitKind::Xor => StageKind::Xor.fold(inputs),
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitKind::Nand => "nand",
            CircuitKind::NandChain => "nand-chain",
            CircuitKind::Xor => "xor",
        })
    }
}

/// A built netlist together with its primary ports.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// What was built.
    pub kind: CircuitKind,
    /// The network.
    pub netlist: Netlist,
    /// Primary inputs, in order.
    pub inputs: Vec<SignalId>,
    /// The primary output.
    pub output: SignalId,
}

impl Circuit {
    /// Builds a `kind` circuit with `inputs` primary inputs named
    /// `{name}.in0..` and an output named `{name}.z`.
    pub fn build(kind: CircuitKind, name: &str, inputs: usize) -> Result<Self, SimError> {
        let mut netlist = Netlist::new();
        let (ports, output) = match kind {
            CircuitKind::Nand => {
                let ports: Vec<SignalId> = (0..inputs)
                    .map(|i| netlist.add_input(format!("{name}.in{i}")))
                    .collect();
                let output = netlist.add_signal(format!("{name}.z"));
                netlist.add_nand(name, &ports, output)?;
                (ports, output)
            }
            CircuitKind::NandChain | CircuitKind::Xor => {
                let stage = match kind {
                    CircuitKind::Xor => StageKind::Xor,
                    _ => StageKind::Nand,
                };
                let chain = ChainSpec::new(name, stage, inputs)?.build(&mut netlist)?;
                (chain.inputs().to_vec(), chain.output())
            }
        };
        debug!(
            %kind,
            inputs,
            gates = netlist.gate_count(),
            signals = netlist.signal_count(),
            "built circuit"
        );
        Ok(Self {
            kind,
            netlist,
            inputs: ports,
            output,
        })
    }

    /// Reference output for an input vector.
    pub fn expected(&self, inputs: &[bool]) -> bool {
        self.kind.reference(inputs)
    }
}

/// Configuration for an exhaustive simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Time between input vectors, in femtoseconds.
    pub period_fs: u64,
    /// Delta-cycle limit per time step.
    pub max_deltas: u32,
    /// Optional time limit in femtoseconds.
    pub time_limit: Option<u64>,
    /// When the monitor samples.
    pub monitor_mode: MonitorMode,
    /// Optional path for VCD output.
    pub waveform_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            period_fs: DEFAULT_PERIOD_FS,
            max_deltas: DEFAULT_MAX_DELTAS,
            time_limit: None,
            monitor_mode: MonitorMode::OnCommit,
            waveform_path: None,
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct SimReport {
    /// Kernel totals.
    pub result: SimResult,
    /// Sampled port values.
    pub monitor: Monitor,
    /// Number of settled steps compared against the reference function.
    pub checked: usize,
    /// Settled steps whose output disagreed with the reference function.
    pub mismatches: Vec<Mismatch>,
}

impl SimReport {
    /// Returns `true` if every settled output matched the reference.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// High-level entry point: drives every input combination of `circuit`,
/// sampling its ports and checking each settled output.
pub fn simulate(circuit: Circuit, config: &SimConfig) -> Result<SimReport, SimError> {
    let Circuit {
        kind,
        netlist,
        inputs,
        output,
    } = circuit;

    let mut kernel = SimKernel::new(netlist);
    kernel.set_max_delta(config.max_deltas);
    if let Some(limit) = config.time_limit {
        kernel.set_time_limit(limit);
    }
    if let Some(path) = &config.waveform_path {
        let file = File::create(path)?;
        kernel.set_recorder(Box::new(VcdRecorder::new(BufWriter::new(file))))?;
    }

    let mut stimulus = ExhaustiveStimulus::new(inputs.clone(), config.period_fs)?;
    let mut monitor = Monitor::for_ports(&inputs, output, config.monitor_mode);
    let mut check = OutputCheck::new(inputs, output, move |v: &[bool]| kind.reference(v));

    let result = kernel.run(&mut stimulus, &mut (&mut monitor, &mut check))?;
    info!(
        %kind,
        final_time = %result.final_time,
        deltas = result.total_deltas,
        evaluations = result.total_evaluations,
        mismatches = check.mismatches().len(),
        "simulation finished"
    );

    Ok(SimReport {
        result,
        monitor,
        checked: check.checked(),
        mismatches: check.into_mismatches(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_functions() {
        assert!(CircuitKind::Nand.reference(&[true, false, true]));
        assert!(!CircuitKind::Nand.reference(&[true, true, true]));
        assert!(CircuitKind::Xor.reference(&[true, true, true]));
        assert!(!CircuitKind::Xor.reference(&[true, true, false]));
        // !( !(1 & 1) & 1 ) = 1
        assert!(CircuitKind::NandChain.reference(&[true, true, true]));
    }

    #[test]
    fn build_names_ports() {
        let c = Circuit::build(CircuitKind::Nand, "nand", 3).unwrap();
        assert_eq!(c.inputs.len(), 3);
        assert_eq!(c.netlist.signal(c.output).name, "nand.z");
        assert_eq!(c.netlist.signal(c.inputs[2]).name, "nand.in2");
        assert_eq!(c.netlist.gate_count(), 1);
    }

    #[test]
    fn build_rejects_one_input() {
        for kind in [CircuitKind::Nand, CircuitKind::NandChain, CircuitKind::Xor] {
            assert!(matches!(
                Circuit::build(kind, "c", 1),
                Err(SimError::TooFewInputs { .. })
            ));
        }
    }

    #[test]
    fn simulate_xor_passes_self_check() {
        let circuit = Circuit::build(CircuitKind::Xor, "exor", 3).unwrap();
        let config = SimConfig {
            monitor_mode: MonitorMode::OnSettled,
            ..SimConfig::default()
        };
        let report = simulate(circuit, &config).unwrap();
        assert!(report.passed());
        assert!(report.result.stopped);
        // Eight vectors, the reset vector, and the final stop step.
        assert_eq!(report.monitor.samples().len(), 10);
        assert_eq!(report.checked, 11);
    }

    #[test]
    fn simulate_writes_vcd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nand.vcd");
        let circuit = Circuit::build(CircuitKind::Nand, "nand", 2).unwrap();
        let config = SimConfig {
            waveform_path: Some(path.clone()),
            ..SimConfig::default()
        };
        simulate(circuit, &config).unwrap();
        let vcd = std::fs::read_to_string(path).unwrap();
        assert!(vcd.contains("$var wire 1 \" nand.in1 $end"));
        assert!(vcd.contains("#10000000"));
    }
}
