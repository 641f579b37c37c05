//! Boolean signal cells and their single-driver bookkeeping.
//!
//! Each signal holds a committed value and at most one pending value. Reads
//! always see the committed value; the kernel moves pending values into place
//! during its update phase.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arena::ArenaId;
use crate::gate::GateId;

/// Opaque ID for a signal in a [`Netlist`](crate::netlist::Netlist).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for SignalId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// The one producer allowed to write a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    /// Written by a gate's output.
    Gate(GateId),
    /// Written from outside the netlist (stimulus or testbench).
    External,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Gate(id) => write!(f, "gate #{}", id.as_raw()),
            Driver::External => write!(f, "external stimulus"),
        }
    }
}

/// Runtime state of a single signal.
#[derive(Clone, Debug)]
pub struct SignalState {
    /// Hierarchical name, e.g. `exor.s0`.
    pub name: String,
    /// Last committed value.
    pub value: bool,
    /// Value written since the last commit, if any.
    pub pending: Option<bool>,
    /// The producer bound to this signal.
    pub driver: Option<Driver>,
}

impl SignalState {
    /// Creates an undriven signal holding `false`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: false,
            pending: None,
            driver: None,
        }
    }

    /// Records a write. Returns `true` if the signal now needs to be queued
    /// for the next update phase.
    ///
    /// Writing the committed value while nothing is pending is a no-op.
    pub fn write(&mut self, value: bool) -> bool {
        match self.pending {
            Some(_) => {
                self.pending = Some(value);
                false
            }
            None if value == self.value => false,
            None => {
                self.pending = Some(value);
                true
            }
        }
    }

    /// Commits the pending value. Returns `true` if the committed value changed.
    pub fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(v) if v != self.value => {
                self.value = v;
                true
            }
            _ => false,
        }
    }
}
