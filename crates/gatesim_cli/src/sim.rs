//! `gatesim xor|nand|chain|run`: build a circuit and simulate it.
//!
//! Builds the requested circuit, drives every input combination through it,
//! prints the monitor table to stdout and a summary to stderr. Every settled
//! output is checked against the circuit's reference function; any mismatch
//! makes the command exit with code 1.

use std::error::Error;

use gatesim_config::{load_config, load_config_from_path, parse_duration, GateSimConfig};
use gatesim_sim::{
    simulate, Circuit, CircuitKind, Mismatch, MonitorMode, Sample, SimConfig, SimReport, SimTime,
};
use serde::Serialize;
use tracing::info;

use crate::{CircuitArgs, GlobalArgs, ReportFormat, RunOptions};

/// Runs one of the built-in circuit commands.
///
/// Kernel settings come from `--config` when given, then from the flags.
pub fn run_circuit(
    kind: CircuitKind,
    args: &CircuitArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn Error>> {
    let base = match &global.config {
        Some(path) => load_config_from_path(path)?.to_sim_config(),
        None => SimConfig::default(),
    };
    let config = apply_overrides(base, &args.options)?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_name(kind).to_string());
    execute(kind, &name, args.inputs, &config, args.options.format, global)
}

/// Runs `gatesim run`: the circuit comes from `--config`, or from
/// `gatesim.toml` in the current directory.
pub fn run_config(options: &RunOptions, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let file: GateSimConfig = match &global.config {
        Some(path) => load_config_from_path(path)?,
        None => load_config(&std::env::current_dir()?)?,
    };
    let config = apply_overrides(file.to_sim_config(), options)?;
    execute(
        file.circuit.kind.into(),
        &file.circuit.name,
        file.circuit.inputs,
        &config,
        options.format,
        global,
    )
}

fn default_name(kind: CircuitKind) -> &'static str {
    match kind {
        CircuitKind::Xor => "exor",
        CircuitKind::Nand => "nand",
        CircuitKind::NandChain => "chain",
    }
}

/// Layers command-line flags over a base configuration.
fn apply_overrides(mut config: SimConfig, options: &RunOptions) -> Result<SimConfig, Box<dyn Error>> {
    if let Some(period) = &options.period {
        config.period_fs = parse_duration(period)?;
    }
    if let Some(max) = options.max_deltas {
        if max == 0 {
            return Err("--max-deltas must be non-zero".into());
        }
        config.max_deltas = max;
    }
    if let Some(time) = &options.time {
        config.time_limit = Some(parse_duration(time)?);
    }
    if let Some(path) = &options.vcd {
        config.waveform_path = Some(path.clone());
    }
    if options.settled {
        config.monitor_mode = MonitorMode::OnSettled;
    }
    Ok(config)
}

fn execute(
    kind: CircuitKind,
    name: &str,
    inputs: usize,
    config: &SimConfig,
    format: ReportFormat,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn Error>> {
    if !global.quiet {
        eprintln!("   Simulating {name} ({kind}, {inputs} inputs)");
    }

    let circuit = Circuit::build(kind, name, inputs)?;
    if global.verbose {
        eprintln!(
            "      Netlist {} gates, {} signals",
            circuit.netlist.gate_count(),
            circuit.netlist.signal_count()
        );
    }

    let report = simulate(circuit, config)?;
    info!(samples = report.monitor.samples().len(), "report ready");

    match format {
        ReportFormat::Text => print!("{}", report.monitor.render()),
        ReportFormat::Json => {
            let json = JsonReport::new(name, kind, inputs, &report);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    if !global.quiet {
        print_summary(&report, config);
    }
    Ok(exit_code(&report))
}

fn print_summary(report: &SimReport, config: &SimConfig) {
    let result = &report.result;
    eprintln!(
        "    Finished at {}: {} delta cycles, {} gate evaluations",
        result.final_time, result.total_deltas, result.total_evaluations
    );
    if let Some(path) = &config.waveform_path {
        eprintln!("    Waveform written to {}", path.display());
    }
    for m in &report.mismatches {
        eprintln!(
            "    Mismatch at {}: inputs {} expected {} got {}",
            m.time,
            bits(&m.inputs),
            u8::from(m.expected),
            u8::from(m.actual)
        );
    }
    if report.passed() {
        eprintln!("    Self-check passed ({} settled steps)", report.checked);
    } else {
        eprintln!(
            "    Self-check FAILED ({} of {} settled steps)",
            report.mismatches.len(),
            report.checked
        );
    }
}

fn exit_code(report: &SimReport) -> i32 {
    if report.passed() {
        0
    } else {
        1
    }
}

/// Input values as a bit string, input 0 first.
fn bits(values: &[bool]) -> String {
    values.iter().map(|&v| if v { '1' } else { '0' }).collect()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    circuit: &'a str,
    kind: String,
    inputs: usize,
    labels: &'a [String],
    samples: &'a [Sample],
    final_time: SimTime,
    total_deltas: u64,
    total_evaluations: u64,
    checked: usize,
    mismatches: &'a [Mismatch],
}

impl<'a> JsonReport<'a> {
    fn new(name: &'a str, kind: CircuitKind, inputs: usize, report: &'a SimReport) -> Self {
        Self {
            circuit: name,
            kind: kind.to_string(),
            inputs,
            labels: report.monitor.labels(),
            samples: report.monitor.samples(),
            final_time: report.result.final_time,
            total_deltas: report.result.total_deltas,
            total_evaluations: report.result.total_evaluations,
            checked: report.checked,
            mismatches: &report.mismatches,
        }
    }
}
