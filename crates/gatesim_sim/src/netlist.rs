//! Arena-owned gate networks.
//!
//! A [`Netlist`] owns every signal and gate of a circuit. Gates reference
//! signals by [`SignalId`]; signals record their single [`Driver`]. The
//! single-writer invariant is enforced here, while the network is wired, so a
//! kernel never sees a signal with two producers.

use crate::arena::Arena;
use crate::error::SimError;
use crate::gate::{GateId, NandGate};
use crate::signal::{Driver, SignalId, SignalState};

/// The signals and gates of one circuit.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    signals: Arena<SignalId, SignalState>,
    gates: Arena<GateId, NandGate>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an undriven signal.
    pub fn add_signal(&mut self, name: impl Into<String>) -> SignalId {
        self.signals.alloc(SignalState::new(name))
    }

    /// Adds a signal driven from outside the netlist.
    pub fn add_input(&mut self, name: impl Into<String>) -> SignalId {
        let mut state = SignalState::new(name);
        state.driver = Some(Driver::External);
        self.signals.alloc(state)
    }

    /// Adds a NAND gate reading `inputs` and driving `output`.
    ///
    /// Fails if fewer than two inputs are given, if any signal is not part of
    /// this netlist, or if `output` already has a driver.
    pub fn add_nand(
        &mut self,
        name: impl Into<String>,
        inputs: &[SignalId],
        output: SignalId,
    ) -> Result<GateId, SimError> {
        for &id in inputs.iter().chain(std::iter::once(&output)) {
            self.check_signal(id)?;
        }
        let gate = NandGate::new(name, inputs.to_vec(), output)?;
        let id = GateId::from_raw(self.gates.len() as u32);
        self.bind_driver_named(output, Driver::Gate(id), gate.name())?;
        Ok(self.gates.alloc(gate))
    }

    /// Binds `driver` as the producer of `signal`.
    ///
    /// Rebinding the external driver to a signal it already drives is
    /// accepted; any other second driver is a [`SimError::MultipleDrivers`].
    pub fn bind_driver(&mut self, signal: SignalId, driver: Driver) -> Result<(), SimError> {
        self.check_signal(signal)?;
        let new = self.describe_driver(driver);
        self.bind_driver_named(signal, driver, &new)
    }

    fn bind_driver_named(
        &mut self,
        signal: SignalId,
        driver: Driver,
        new_name: &str,
    ) -> Result<(), SimError> {
        let current = self.signals[signal].driver;
        match current {
            None => {
                self.signals[signal].driver = Some(driver);
                Ok(())
            }
            Some(existing) if existing == driver => Ok(()),
            Some(existing) => Err(SimError::MultipleDrivers {
                signal: self.signals[signal].name.clone(),
                existing: self.describe_driver(existing),
                new: match driver {
                    Driver::Gate(_) => format!("gate `{new_name}`"),
                    Driver::External => new_name.to_string(),
                },
            }),
        }
    }

    /// Returns an error if `id` was not issued by this netlist.
    pub fn check_signal(&self, id: SignalId) -> Result<(), SimError> {
        if self.signals.contains(id) {
            Ok(())
        } else {
            Err(SimError::UnknownSignal(id.as_raw()))
        }
    }

    /// Human-readable description of a driver, using gate names.
    pub fn describe_driver(&self, driver: Driver) -> String {
        match driver {
            Driver::Gate(id) => match self.gates.try_get(id) {
                Some(gate) => format!("gate `{}`", gate.name()),
                None => driver.to_string(),
            },
            Driver::External => driver.to_string(),
        }
    }

    /// Returns the state of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this netlist.
    pub fn signal(&self, id: SignalId) -> &SignalState {
        &self.signals[id]
    }

    /// Returns the committed value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this netlist.
    pub fn value(&self, id: SignalId) -> bool {
        self.signals[id].value
    }

    /// Returns the committed value of a signal, or
    /// [`SimError::UnknownSignal`] for a foreign id.
    pub fn try_value(&self, id: SignalId) -> Result<bool, SimError> {
        self.signals
            .try_get(id)
            .map(|s| s.value)
            .ok_or(SimError::UnknownSignal(id.as_raw()))
    }

    /// Returns a gate.
    pub fn gate(&self, id: GateId) -> &NandGate {
        &self.gates[id]
    }

    /// Finds a signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Finds a gate by name.
    pub fn find_gate(&self, name: &str) -> Option<GateId> {
        self.gates
            .iter()
            .find(|(_, g)| g.name() == name)
            .map(|(id, _)| id)
    }

    /// Gates reading `signal`, in ascending ID order.
    pub fn fanout(&self, signal: SignalId) -> Vec<GateId> {
        self.gates
            .iter()
            .filter(|(_, g)| g.inputs().contains(&signal))
            .map(|(id, _)| id)
            .collect()
    }

    /// All signals.
    pub fn signals(&self) -> &Arena<SignalId, SignalState> {
        &self.signals
    }

    pub(crate) fn signals_mut(&mut self) -> &mut Arena<SignalId, SignalState> {
        &mut self.signals
    }

    /// All gates.
    pub fn gates(&self) -> &Arena<GateId, NandGate> {
        &self.gates
    }

    /// Number of signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Number of gates.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_nand_binds_output_driver() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let b = net.add_input("b");
        let z = net.add_signal("z");
        let g = net.add_nand("n0", &[a, b], z).unwrap();
        assert_eq!(net.signal(z).driver, Some(Driver::Gate(g)));
        assert_eq!(net.gate(g).inputs(), &[a, b]);
        assert_eq!(net.gate_count(), 1);
        assert_eq!(net.find_gate("n0"), Some(g));
    }

    #[test]
    fn second_gate_on_same_output_is_rejected() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let b = net.add_input("b");
        let z = net.add_signal("z");
        net.add_nand("n0", &[a, b], z).unwrap();
        let err = net.add_nand("n1", &[a, b], z).unwrap_err();
        match err {
            SimError::MultipleDrivers {
                signal,
                existing,
                new,
            } => {
                assert_eq!(signal, "z");
                assert_eq!(existing, "gate `n0`");
                assert_eq!(new, "gate `n1`");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The rejected gate was not added.
        assert_eq!(net.gate_count(), 1);
    }

    #[test]
    fn gate_cannot_drive_an_input() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let b = net.add_input("b");
        let err = net.add_nand("n0", &[a, b], a).unwrap_err();
        assert!(matches!(err, SimError::MultipleDrivers { .. }));
    }

    #[test]
    fn external_rebinding_is_idempotent() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        assert!(net.bind_driver(a, Driver::External).is_ok());
    }

    #[test]
    fn external_cannot_take_over_gate_output() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let b = net.add_input("b");
        let z = net.add_signal("z");
        net.add_nand("n0", &[a, b], z).unwrap();
        let err = net.bind_driver(z, Driver::External).unwrap_err();
        assert_eq!(
            err.to_string(),
            "signal `z` is already driven by gate `n0`, cannot also be driven by external stimulus"
        );
    }

    #[test]
    fn unknown_signal_is_rejected() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let z = net.add_signal("z");
        let err = net
            .add_nand("n0", &[a, SignalId::from_raw(42)], z)
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownSignal(42)));
    }

    #[test]
    fn try_value_rejects_foreign_id() {
        let mut other = Netlist::new();
        other.add_input("x");
        let foreign = other.add_input("y");

        let mut net = Netlist::new();
        let a = net.add_input("a");
        assert!(!net.try_value(a).unwrap());
        assert!(matches!(
            net.try_value(foreign),
            Err(SimError::UnknownSignal(1))
        ));
    }

    #[test]
    fn too_few_inputs_leaves_output_undriven() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let z = net.add_signal("z");
        assert!(net.add_nand("n0", &[a], z).is_err());
        assert!(net.signal(z).driver.is_none());
    }

    #[test]
    fn find_signal_by_name() {
        let mut net = Netlist::new();
        net.add_input("a");
        let z = net.add_signal("z");
        assert_eq!(net.find_signal("z"), Some(z));
        assert!(net.find_signal("missing").is_none());
    }
}
