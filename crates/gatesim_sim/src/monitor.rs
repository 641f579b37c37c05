//! Observers of committed signal values.
//!
//! The kernel calls an [`Observer`] after every update phase that changed at
//! least one signal, and once more when a time step has settled. Observers
//! only get shared access to the netlist, so they cannot disturb the
//! simulation they watch.

use std::fmt::Write as _;

use serde::Serialize;

use crate::netlist::Netlist;
use crate::signal::SignalId;
use crate::time::SimTime;

/// Receives notifications from the kernel.
pub trait Observer {
    /// Called after an update phase committed at least one change.
    ///
    /// `delta_count` is the total number of delta cycles executed since the
    /// kernel was created; `changed` is sorted by ID.
    fn on_commit(&mut self, time: SimTime, delta_count: u64, changed: &[SignalId], netlist: &Netlist);

    /// Called once a time step has reached a fixed point.
    fn on_settled(&mut self, _time: SimTime, _delta_count: u64, _netlist: &Netlist) {}
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_commit(&mut self, _: SimTime, _: u64, _: &[SignalId], _: &Netlist) {}
}

impl<T: Observer + ?Sized> Observer for &mut T {
    fn on_commit(&mut self, time: SimTime, delta_count: u64, changed: &[SignalId], netlist: &Netlist) {
        (**self).on_commit(time, delta_count, changed, netlist);
    }

    fn on_settled(&mut self, time: SimTime, delta_count: u64, netlist: &Netlist) {
        (**self).on_settled(time, delta_count, netlist);
    }
}

/// Both observers see every notification, the first one first.
impl<A: Observer, B: Observer> Observer for (A, B) {
    fn on_commit(&mut self, time: SimTime, delta_count: u64, changed: &[SignalId], netlist: &Netlist) {
        self.0.on_commit(time, delta_count, changed, netlist);
        self.1.on_commit(time, delta_count, changed, netlist);
    }

    fn on_settled(&mut self, time: SimTime, delta_count: u64, netlist: &Netlist) {
        self.0.on_settled(time, delta_count, netlist);
        self.1.on_settled(time, delta_count, netlist);
    }
}

/// When a [`Monitor`] takes a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorMode {
    /// Whenever a watched signal commits a new value, including mid-settle glitches.
    OnCommit,
    /// Once per settled time step.
    OnSettled,
}

/// One row of monitor output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Time (and delta within it) the sample was taken at.
    pub time: SimTime,
    /// Total delta cycles executed when the sample was taken.
    pub delta_count: u64,
    /// Values of the watched signals, in watch order.
    pub values: Vec<bool>,
}

/// Records the values of a fixed list of signals.
#[derive(Clone, Debug)]
pub struct Monitor {
    labels: Vec<String>,
    watched: Vec<SignalId>,
    mode: MonitorMode,
    samples: Vec<Sample>,
}

impl Monitor {
    /// Watches `signals`, labelled in table output by the given names.
    pub fn new(signals: Vec<(String, SignalId)>, mode: MonitorMode) -> Self {
        let (labels, watched) = signals.into_iter().unzip();
        Self {
            labels,
            watched,
            mode,
            samples: Vec::new(),
        }
    }

    /// Watches a circuit's inputs as `In0..InN` followed by its output as `Out`.
    pub fn for_ports(inputs: &[SignalId], output: SignalId, mode: MonitorMode) -> Self {
        let signals = inputs
            .iter()
            .enumerate()
            .map(|(i, &id)| (format!("In{i}"), id))
            .chain(std::iter::once(("Out".to_string(), output)))
            .collect();
        Self::new(signals, mode)
    }

    /// Samples taken so far.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Column labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns `true` if `(time, delta_count)` never decreases across samples.
    pub fn is_ordered(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].time <= w[1].time && w[0].delta_count <= w[1].delta_count)
    }

    /// Tab-separated table with a `Time` column followed by the labels.
    pub fn render(&self) -> String {
        let mut out = String::from("Time");
        for label in &self.labels {
            let _ = write!(out, "\t{label}");
        }
        out.push('\n');
        for sample in &self.samples {
            let _ = write!(out, "{}", sample.time);
            for &v in &sample.values {
                let _ = write!(out, "\t{}", u8::from(v));
            }
            out.push('\n');
        }
        out
    }

    fn take_sample(&mut self, time: SimTime, delta_count: u64, netlist: &Netlist) {
        let values = self.watched.iter().map(|&id| netlist.value(id)).collect();
        self.samples.push(Sample {
            time,
            delta_count,
            values,
        });
    }
}

impl Observer for Monitor {
    fn on_commit(&mut self, time: SimTime, delta_count: u64, changed: &[SignalId], netlist: &Netlist) {
        if self.mode == MonitorMode::OnCommit && changed.iter().any(|id| self.watched.contains(id)) {
            self.take_sample(time, delta_count, netlist);
        }
    }

    fn on_settled(&mut self, time: SimTime, delta_count: u64, netlist: &Netlist) {
        if self.mode != MonitorMode::OnSettled {
            return;
        }
        // Settling twice at one instant keeps only the latest row.
        if self.samples.last().is_some_and(|s| s.time.fs == time.fs) {
            self.samples.pop();
        }
        self.take_sample(time, delta_count, netlist);
    }
}

/// A settled output that disagreed with the reference function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Instant of the settled step.
    pub time: SimTime,
    /// Input values at that instant.
    pub inputs: Vec<bool>,
    /// Output the reference function predicts.
    pub expected: bool,
    /// Output the circuit settled to.
    pub actual: bool,
}

/// Compares the settled output of a circuit against a reference function
/// after every time step.
pub struct OutputCheck<F> {
    inputs: Vec<SignalId>,
    output: SignalId,
    reference: F,
    checked: usize,
    mismatches: Vec<Mismatch>,
}

impl<F: Fn(&[bool]) -> bool> OutputCheck<F> {
    /// Checks `output` against `reference(inputs)`.
    pub fn new(inputs: Vec<SignalId>, output: SignalId, reference: F) -> Self {
        Self {
            inputs,
            output,
            reference,
            checked: 0,
            mismatches: Vec::new(),
        }
    }

    /// Number of settled steps compared.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Steps whose output disagreed with the reference.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Consumes the checker, returning the mismatches.
    pub fn into_mismatches(self) -> Vec<Mismatch> {
        self.mismatches
    }
}

impl<F: Fn(&[bool]) -> bool> Observer for OutputCheck<F> {
    fn on_commit(&mut self, _: SimTime, _: u64, _: &[SignalId], _: &Netlist) {}

    fn on_settled(&mut self, time: SimTime, _delta_count: u64, netlist: &Netlist) {
        let inputs: Vec<bool> = self.inputs.iter().map(|&id| netlist.value(id)).collect();
        let expected = (self.reference)(&inputs);
        let actual = netlist.value(self.output);
        self.checked += 1;
        if expected != actual {
            self.mismatches.push(Mismatch {
                time,
                inputs,
                expected,
                actual,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_signal_netlist() -> (Netlist, SignalId, SignalId) {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let z = net.add_signal("z");
        (net, a, z)
    }

    #[test]
    fn for_ports_labels() {
        let (_, a, z) = two_signal_netlist();
        let mon = Monitor::for_ports(&[a, a], z, MonitorMode::OnCommit);
        assert_eq!(mon.labels(), &["In0", "In1", "Out"]);
    }

    #[test]
    fn on_commit_ignores_unwatched_signals() {
        let (net, a, z) = two_signal_netlist();
        let mut mon = Monitor::new(vec![("a".into(), a)], MonitorMode::OnCommit);
        mon.on_commit(SimTime::zero(), 0, &[z], &net);
        assert!(mon.samples().is_empty());
        mon.on_commit(SimTime::zero(), 0, &[a, z], &net);
        assert_eq!(mon.samples().len(), 1);
        // Settled notifications are ignored in commit mode.
        mon.on_settled(SimTime::zero(), 0, &net);
        assert_eq!(mon.samples().len(), 1);
    }

    #[test]
    fn on_settled_keeps_one_row_per_instant() {
        let (net, a, z) = two_signal_netlist();
        let mut mon = Monitor::for_ports(&[a], z, MonitorMode::OnSettled);
        mon.on_settled(SimTime { fs: 0, delta: 1 }, 1, &net);
        mon.on_settled(SimTime { fs: 0, delta: 2 }, 2, &net);
        mon.on_settled(SimTime::from_ns(10), 2, &net);
        assert_eq!(mon.samples().len(), 2);
        assert_eq!(mon.samples()[0].delta_count, 2);
        assert!(mon.is_ordered());
    }

    #[test]
    fn is_ordered_detects_regression() {
        let (net, a, z) = two_signal_netlist();
        let mut mon = Monitor::for_ports(&[a], z, MonitorMode::OnCommit);
        mon.on_commit(SimTime::from_ns(10), 5, &[a], &net);
        mon.on_commit(SimTime::from_ns(20), 4, &[a], &net);
        assert!(!mon.is_ordered());
    }

    #[test]
    fn render_table() {
        let (net, a, z) = two_signal_netlist();
        let mut mon = Monitor::for_ports(&[a], z, MonitorMode::OnCommit);
        mon.on_commit(SimTime::from_ns(10), 1, &[a], &net);
        assert_eq!(mon.render(), "Time\tIn0\tOut\n10 ns\t0\t0\n");
    }

    #[test]
    fn pair_forwards_to_both() {
        let (net, a, _) = two_signal_netlist();
        let mut first = Monitor::new(vec![("a".into(), a)], MonitorMode::OnCommit);
        let mut second = Monitor::new(vec![("a".into(), a)], MonitorMode::OnSettled);
        {
            let mut both = (&mut first, &mut second);
            both.on_commit(SimTime::zero(), 0, &[a], &net);
            both.on_settled(SimTime::zero(), 0, &net);
        }
        assert_eq!(first.samples().len(), 1);
        assert_eq!(second.samples().len(), 1);
    }

    #[test]
    fn output_check_records_mismatches() {
        let (net, a, z) = two_signal_netlist();
        // Both signals are false, so identity holds and inversion does not.
        let mut same = OutputCheck::new(vec![a], z, |v: &[bool]| v[0]);
        let mut inverted = OutputCheck::new(vec![a], z, |v: &[bool]| !v[0]);
        same.on_settled(SimTime::zero(), 0, &net);
        inverted.on_settled(SimTime::zero(), 0, &net);
        assert_eq!(same.checked(), 1);
        assert!(same.mismatches().is_empty());
        assert_eq!(
            inverted.into_mismatches(),
            vec![Mismatch {
                time: SimTime::zero(),
                inputs: vec![false],
                expected: true,
                actual: false,
            }]
        );
    }

    #[test]
    fn sample_serializes_to_json() {
        let sample = Sample {
            time: SimTime::from_ns(10),
            delta_count: 3,
            values: vec![true, false],
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["delta_count"], 3);
        assert_eq!(json["time"]["fs"], 10_000_000);
        assert_eq!(json["values"][0], true);
    }
}
