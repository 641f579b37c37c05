//! Error types for netlist construction and simulation.
//!
//! Construction problems (too few inputs, a second driver on a signal) are
//! reported while the netlist is being wired; a combinational loop surfaces
//! from the kernel once the delta-cycle limit is reached.

use std::io;

use crate::time::SimTime;

/// Errors that can occur while building or simulating a gate network.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A gate or composite was configured with fewer inputs than it needs.
    #[error("`{name}` needs at least {min} inputs, got {got}")]
    TooFewInputs {
        /// Name of the gate or composite being built.
        name: String,
        /// Minimum number of inputs accepted.
        min: usize,
        /// Number of inputs supplied.
        got: usize,
    },

    /// The number of ports handed to a builder does not match its configuration.
    #[error("`{name}` expects {expected} ports, got {got}")]
    PortCountMismatch {
        /// Name of the composite being wired.
        name: String,
        /// Number of ports the composite was configured with.
        expected: usize,
        /// Number of ports supplied.
        got: usize,
    },

    /// A signal ID does not belong to the netlist.
    #[error("signal #{0} does not exist in this netlist")]
    UnknownSignal(u32),

    /// A second producer was bound to a signal that already has one.
    #[error("signal `{signal}` is already driven by {existing}, cannot also be driven by {new}")]
    MultipleDrivers {
        /// Name of the contested signal.
        signal: String,
        /// Description of the current driver.
        existing: String,
        /// Description of the rejected driver.
        new: String,
    },

    /// The network did not stabilize within the delta-cycle limit.
    #[error("combinational loop: no fixed point at {time} after {max_deltas} delta cycles (gate `{gate}` still triggered)")]
    CombinationalLoop {
        /// Simulation time at which the limit was hit.
        time: SimTime,
        /// The configured delta-cycle limit.
        max_deltas: u32,
        /// A gate that was still scheduled when the limit was hit.
        gate: String,
    },

    /// A stimulus source was misconfigured or misbehaved.
    #[error("invalid stimulus: {reason}")]
    InvalidStimulus {
        /// What was wrong with the stimulus.
        reason: String,
    },

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
