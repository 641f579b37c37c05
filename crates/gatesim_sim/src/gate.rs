//! The NAND primitive.
//!
//! A [`NandGate`] is a stateless combinational module: its output is
//! `!(in0 & in1 & ...)` over the committed values of its inputs. NAND is the
//! only primitive; everything else in the crate is built by wiring NANDs.

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, ArenaId};
use crate::error::SimError;
use crate::signal::{SignalId, SignalState};

/// Minimum number of inputs a NAND gate accepts.
pub const NAND_MIN_INPUTS: usize = 2;

/// Opaque ID for a gate in a [`Netlist`](crate::netlist::Netlist).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct GateId(u32);

impl GateId {
    /// Creates a `GateId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for GateId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// An n-input NAND gate.
#[derive(Clone, Debug)]
pub struct NandGate {
    name: String,
    inputs: Vec<SignalId>,
    output: SignalId,
}

impl NandGate {
    /// Creates a gate reading `inputs` and driving `output`.
    ///
    /// Fails with [`SimError::TooFewInputs`] for fewer than two inputs.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<SignalId>,
        output: SignalId,
    ) -> Result<Self, SimError> {
        let name = name.into();
        if inputs.len() < NAND_MIN_INPUTS {
            return Err(SimError::TooFewInputs {
                name,
                min: NAND_MIN_INPUTS,
                got: inputs.len(),
            });
        }
        Ok(Self {
            name,
            inputs,
            output,
        })
    }

    /// The gate's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered input signals.
    pub fn inputs(&self) -> &[SignalId] {
        &self.inputs
    }

    /// The signal this gate drives.
    pub fn output(&self) -> SignalId {
        self.output
    }

    /// Computes the output from the committed input values.
    pub fn evaluate(&self, signals: &Arena<SignalId, SignalState>) -> bool {
        nand(self.inputs.iter().map(|&id| signals[id].value))
    }
}

/// NAND over an arbitrary number of values.
pub fn nand(values: impl IntoIterator<Item = bool>) -> bool {
    !values.into_iter().all(|v| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nand_two_input_truth_table() {
        assert!(nand([false, false]));
        assert!(nand([false, true]));
        assert!(nand([true, false]));
        assert!(!nand([true, true]));
    }

    #[test]
    fn nand_is_low_only_when_all_inputs_high() {
        for n in 2..=5u32 {
            for pattern in 0..(1u32 << n) {
                let values: Vec<bool> = (0..n).map(|j| (pattern >> j) & 1 == 1).collect();
                let all_high = pattern == (1 << n) - 1;
                assert_eq!(nand(values), !all_high, "n={n} pattern={pattern:b}");
            }
        }
    }

    #[test]
    fn construction_rejects_single_input() {
        let err = NandGate::new("n0", vec![SignalId::from_raw(0)], SignalId::from_raw(1))
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::TooFewInputs { min: 2, got: 1, .. }
        ));
    }

    #[test]
    fn evaluate_reads_committed_values() {
        let mut signals: Arena<SignalId, SignalState> = Arena::new();
        let a = signals.alloc(SignalState::new("a"));
        let b = signals.alloc(SignalState::new("b"));
        let z = signals.alloc(SignalState::new("z"));
        let gate = NandGate::new("n0", vec![a, b], z).unwrap();

        signals[a].value = true;
        signals[b].value = true;
        assert!(!gate.evaluate(&signals));

        // A pending write is invisible to evaluation.
        signals[b].write(false);
        assert!(!gate.evaluate(&signals));
        signals[b].commit();
        assert!(gate.evaluate(&signals));
    }
}
