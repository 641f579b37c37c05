//! gatesim CLI: drive NAND-based gate networks through every input vector.
//!
//! Provides `gatesim xor`, `gatesim nand` and `gatesim chain` for simulating a
//! built-in circuit with a given input count, and `gatesim run` for taking the
//! circuit from a `gatesim.toml` file.

#![warn(missing_docs)]

mod sim;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// gatesim, a delta-cycle gate-level logic simulator.
#[derive(Parser, Debug)]
#[command(name = "gatesim", version, about = "Delta-cycle NAND network simulator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `gatesim.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate an n-input XOR built from NAND cells.
    Xor(CircuitArgs),
    /// Simulate a single n-input NAND gate.
    Nand(CircuitArgs),
    /// Simulate a cascade of two-input NAND gates.
    Chain(CircuitArgs),
    /// Simulate the circuit described by the configuration file.
    Run(RunOptions),
}

/// Arguments for the built-in circuit commands.
#[derive(Args, Debug)]
pub struct CircuitArgs {
    /// Number of primary inputs.
    #[arg(short = 'n', long, default_value_t = 3)]
    pub inputs: usize,

    /// Name prefix for signals and gates (defaults to the command's circuit).
    #[arg(long)]
    pub name: Option<String>,

    /// Options shared with `gatesim run`.
    #[command(flatten)]
    pub options: RunOptions,
}

/// Options shared by every simulating command. Each one overrides the
/// matching configuration file value.
#[derive(Args, Debug, Default)]
pub struct RunOptions {
    /// Time between input vectors (e.g., "10ns").
    #[arg(long)]
    pub period: Option<String>,

    /// Delta-cycle limit per settle (at least 1).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_deltas: Option<u32>,

    /// Simulation time limit (e.g., "1us").
    #[arg(long)]
    pub time: Option<String>,

    /// Write a VCD waveform to this path.
    #[arg(long)]
    pub vcd: Option<PathBuf>,

    /// Record one row per settled time step instead of every commit.
    #[arg(long)]
    pub settled: bool,

    /// Output format for the monitor table.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Monitor output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Tab-separated table.
    #[default]
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Xor(ref args) => sim::run_circuit(gatesim_sim::CircuitKind::Xor, args, &global),
        Command::Nand(ref args) => sim::run_circuit(gatesim_sim::CircuitKind::Nand, args, &global),
        Command::Chain(ref args) => {
            sim::run_circuit(gatesim_sim::CircuitKind::NandChain, args, &global)
        }
        Command::Run(ref options) => sim::run_config(options, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` takes precedence over the flags.
fn init_logging(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(quiet, verbose)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}
