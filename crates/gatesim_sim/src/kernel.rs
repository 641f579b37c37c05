//! Simulation kernel: pending-write queue, delta-cycle loop, and time advance.
//!
//! [`SimKernel`] owns a [`Netlist`] and drives it to a fixed point at every
//! simulated instant. Each round of the loop is
//!
//! 1. an **update phase**, which commits every pending write, reports the
//!    changed signals to the observer and waveform recorder, and collects the
//!    gates subscribed to them; then
//! 2. a **delta cycle**, which evaluates each collected gate exactly once
//!    against the committed values. Gate outputs become pending writes for
//!    the next update phase.
//!
//! A time step has settled when an update phase triggers no gate. Running
//! more delta cycles than the configured limit within one settle call is
//! reported as a combinational loop. The limit applies per call, so any
//! number of write/settle rounds may share one instant.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::error::SimError;
use crate::gate::GateId;
use crate::monitor::{NullObserver, Observer};
use crate::netlist::Netlist;
use crate::signal::{Driver, SignalId};
use crate::stimulus::Stimulus;
use crate::time::SimTime;
use crate::waveform::WaveformRecorder;

/// Default delta-cycle limit per time step.
pub const DEFAULT_MAX_DELTAS: u32 = 10_000;

/// An external write scheduled for a later instant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SimEvent {
    time_fs: u64,
    /// Insertion order, so writes at one instant apply first-come first-served.
    seq: u64,
    signal: SignalId,
    value: bool,
}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time_fs
            .cmp(&other.time_fs)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Outcome of settling one time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleReport {
    /// Time (with final delta index) at which the network became stable.
    pub time: SimTime,
    /// Delta cycles executed by this call.
    pub deltas: u32,
    /// Gate evaluations performed by this call.
    pub evaluations: u64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimResult {
    /// The time at which the run ended.
    pub final_time: SimTime,
    /// Total delta cycles executed since the kernel was created.
    pub total_deltas: u64,
    /// Total gate evaluations since the kernel was created.
    pub total_evaluations: u64,
    /// Whether the run ended because a stop was requested.
    pub stopped: bool,
}

/// The discrete-event engine.
///
/// Construct with [`SimKernel::new`], optionally call
/// [`initialize`](SimKernel::initialize), then drive it either step by step
/// with [`write`](SimKernel::write) and [`settle`](SimKernel::settle) or with
/// a [`Stimulus`] through [`run`](SimKernel::run).
pub struct SimKernel {
    netlist: Netlist,
    current_time: SimTime,
    /// Signals with a pending write, in write order.
    update_queue: Vec<SignalId>,
    /// Future external writes (earliest first).
    event_queue: BinaryHeap<Reverse<SimEvent>>,
    next_seq: u64,
    /// Signal -> gates reading it, ascending.
    sensitivity_map: HashMap<SignalId, Vec<GateId>>,
    recorder: Option<Box<dyn WaveformRecorder>>,
    max_delta_per_step: u32,
    time_limit: Option<u64>,
    total_deltas: u64,
    total_evaluations: u64,
    initialized: bool,
    stop_requested: bool,
}

impl SimKernel {
    /// Takes ownership of `netlist` and builds its subscription table.
    pub fn new(netlist: Netlist) -> Self {
        let mut kernel = Self {
            netlist,
            current_time: SimTime::zero(),
            update_queue: Vec::new(),
            event_queue: BinaryHeap::new(),
            next_seq: 0,
            sensitivity_map: HashMap::new(),
            recorder: None,
            max_delta_per_step: DEFAULT_MAX_DELTAS,
            time_limit: None,
            total_deltas: 0,
            total_evaluations: 0,
            initialized: false,
            stop_requested: false,
        };
        kernel.build_sensitivity_map();
        kernel
    }

    /// Sets the maximum number of delta cycles a single settle may run.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Ends [`run`](SimKernel::run) before time passes `limit_fs`.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit = Some(limit_fs);
    }

    /// Attaches a waveform recorder, declares every signal to it, and dumps
    /// the current committed values.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>) -> Result<(), SimError> {
        recorder.begin_scope("top")?;
        for (id, sig) in self.netlist.signals().iter() {
            recorder.register_signal(id, &sig.name)?;
        }
        recorder.end_scope()?;
        for (id, sig) in self.netlist.signals().iter() {
            recorder.record_change(self.current_time.fs, id, sig.value)?;
        }
        self.recorder = Some(recorder);
        Ok(())
    }

    /// The simulated network.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Releases the network.
    pub fn into_netlist(self) -> Netlist {
        self.netlist
    }

    /// Current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Total delta cycles executed.
    pub fn total_deltas(&self) -> u64 {
        self.total_deltas
    }

    /// Total gate evaluations performed.
    pub fn total_evaluations(&self) -> u64 {
        self.total_evaluations
    }

    /// Gates subscribed to `signal`.
    pub fn subscribers(&self, signal: SignalId) -> &[GateId] {
        self.sensitivity_map
            .get(&signal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if writes are waiting for the next update phase.
    pub fn has_pending(&self) -> bool {
        !self.update_queue.is_empty()
    }

    /// Committed value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `signal` does not belong to this kernel's netlist. Use
    /// [`try_read`](SimKernel::try_read) for ids of unknown origin.
    pub fn read(&self, signal: SignalId) -> bool {
        self.netlist.value(signal)
    }

    /// Committed value of a signal, or [`SimError::UnknownSignal`].
    pub fn try_read(&self, signal: SignalId) -> Result<bool, SimError> {
        self.netlist.try_value(signal)
    }

    /// Writes a signal from outside the netlist.
    ///
    /// The value becomes visible at the next update phase. Fails if the
    /// signal is unknown or is driven by a gate.
    pub fn write(&mut self, signal: SignalId, value: bool) -> Result<(), SimError> {
        self.check_external(signal)?;
        self.post_write(signal, value);
        Ok(())
    }

    /// Schedules an external write at `time_fs` (or now, if that is in the past).
    pub fn schedule_write(
        &mut self,
        time_fs: u64,
        signal: SignalId,
        value: bool,
    ) -> Result<(), SimError> {
        self.check_external(signal)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.event_queue.push(Reverse(SimEvent {
            time_fs: time_fs.max(self.current_time.fs),
            seq,
            signal,
            value,
        }));
        Ok(())
    }

    /// Requests that the run loop exit after the current time step.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop_requested
    }

    /// Evaluates every gate once and settles, establishing consistent initial
    /// outputs. Only the first call has any effect.
    pub fn initialize(&mut self, observer: &mut dyn Observer) -> Result<SettleReport, SimError> {
        if self.initialized {
            return Ok(SettleReport {
                time: self.current_time,
                deltas: 0,
                evaluations: 0,
            });
        }
        self.initialized = true;
        let all: Vec<GateId> = self.netlist.gates().ids().collect();
        self.evaluate(&all);
        let mut report = self.settle_with(observer)?;
        report.evaluations += all.len() as u64;
        debug!(
            gates = all.len(),
            deltas = report.deltas,
            "initialized network"
        );
        Ok(report)
    }

    /// Settles the current time step without an observer.
    pub fn settle(&mut self) -> Result<SettleReport, SimError> {
        self.settle_with(&mut NullObserver)
    }

    /// Runs update phases and delta cycles until no gate is triggered.
    pub fn settle_with(&mut self, observer: &mut dyn Observer) -> Result<SettleReport, SimError> {
        let start_deltas = self.total_deltas;
        let start_evaluations = self.total_evaluations;

        let mut runnable = self.update_phase(observer)?;
        while !runnable.is_empty() {
            if self.total_deltas - start_deltas >= u64::from(self.max_delta_per_step) {
                let gate = self.netlist.gate(runnable[0]).name().to_string();
                warn!(
                    time = %self.current_time,
                    max_deltas = self.max_delta_per_step,
                    gate = %gate,
                    "network did not stabilize"
                );
                return Err(SimError::CombinationalLoop {
                    time: self.current_time,
                    max_deltas: self.max_delta_per_step,
                    gate,
                });
            }
            self.current_time = self.current_time.next_delta();
            self.total_deltas += 1;
            trace!(time = %self.current_time, gates = runnable.len(), "delta cycle");
            self.evaluate(&runnable);
            runnable = self.update_phase(observer)?;
        }

        observer.on_settled(self.current_time, self.total_deltas, &self.netlist);
        Ok(SettleReport {
            time: self.current_time,
            deltas: (self.total_deltas - start_deltas) as u32,
            evaluations: self.total_evaluations - start_evaluations,
        })
    }

    /// Advances to the next scheduled write, applies every write due at that
    /// instant, and settles. Returns `None` when nothing is scheduled.
    pub fn step_time(
        &mut self,
        observer: &mut dyn Observer,
    ) -> Result<Option<SettleReport>, SimError> {
        let Some(Reverse(next)) = self.event_queue.peek() else {
            return Ok(None);
        };
        let next_fs = next.time_fs;
        if next_fs > self.current_time.fs {
            self.advance_to(next_fs);
        }
        self.apply_due_events();
        self.settle_with(observer).map(Some)
    }

    /// Runs with `stimulus` driving the inputs until it requests a stop, the
    /// time limit is reached, or nothing is left to do.
    ///
    /// The stimulus is first applied at the current time; after each
    /// application the step is settled before time moves on.
    pub fn run(
        &mut self,
        stimulus: &mut dyn Stimulus,
        observer: &mut dyn Observer,
    ) -> Result<SimResult, SimError> {
        self.run_loop(Some(stimulus), observer)
    }

    /// Runs scheduled writes only, until the event queue is empty.
    pub fn run_to_completion(&mut self, observer: &mut dyn Observer) -> Result<SimResult, SimError> {
        self.run_loop(None, observer)
    }

    fn run_loop(
        &mut self,
        mut stimulus: Option<&mut dyn Stimulus>,
        observer: &mut dyn Observer,
    ) -> Result<SimResult, SimError> {
        self.initialize(observer)?;
        let mut next_tick = stimulus.as_ref().map(|_| self.current_time.fs);

        while !self.stop_requested {
            let now = self.current_time.fs;
            self.apply_due_events();

            if next_tick == Some(now) {
                if let Some(stim) = stimulus.as_deref_mut() {
                    next_tick = match stim.apply(self)? {
                        Some(0) => {
                            return Err(SimError::InvalidStimulus {
                                reason: "stimulus requested a zero delay".into(),
                            })
                        }
                        Some(delay) => match now.checked_add(delay) {
                            Some(tick) => Some(tick),
                            None => {
                                return Err(SimError::InvalidStimulus {
                                    reason: format!(
                                        "next tick {delay} fs after {now} fs overflows simulation time"
                                    ),
                                })
                            }
                        },
                        None => {
                            debug!(time = %self.current_time, "stimulus requested stop");
                            self.stop_requested = true;
                            None
                        }
                    };
                }
            }

            let report = self.settle_with(observer)?;
            debug!(
                time = %report.time,
                deltas = report.deltas,
                evaluations = report.evaluations,
                "time step settled"
            );
            if self.stop_requested {
                break;
            }

            let next_event = self.event_queue.peek().map(|Reverse(e)| e.time_fs);
            let next = match (next_tick, next_event) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            if self.time_limit.is_some_and(|limit| next > limit) {
                debug!(next_fs = next, "time limit reached");
                break;
            }
            self.advance_to(next);
        }

        if let Some(rec) = &mut self.recorder {
            rec.finalize()?;
        }

        Ok(SimResult {
            final_time: self.current_time,
            total_deltas: self.total_deltas,
            total_evaluations: self.total_evaluations,
            stopped: self.stop_requested,
        })
    }

    fn advance_to(&mut self, time_fs: u64) {
        self.current_time = self.current_time.advance_to(time_fs);
    }

    /// Turns every scheduled write due by now into a pending write.
    fn apply_due_events(&mut self) {
        while let Some(Reverse(evt)) = self.event_queue.peek() {
            if evt.time_fs > self.current_time.fs {
                break;
            }
            if let Some(Reverse(evt)) = self.event_queue.pop() {
                self.post_write(evt.signal, evt.value);
            }
        }
    }

    fn check_external(&self, signal: SignalId) -> Result<(), SimError> {
        self.netlist.check_signal(signal)?;
        let state = self.netlist.signal(signal);
        match state.driver {
            Some(existing @ Driver::Gate(_)) => Err(SimError::MultipleDrivers {
                signal: state.name.clone(),
                existing: self.netlist.describe_driver(existing),
                new: Driver::External.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn post_write(&mut self, signal: SignalId, value: bool) {
        if self.netlist.signals_mut()[signal].write(value) {
            self.update_queue.push(signal);
        }
    }

    /// Evaluates `gates` against the committed values; all reads happen
    /// before any output is written.
    fn evaluate(&mut self, gates: &[GateId]) {
        let results: Vec<(SignalId, bool)> = gates
            .iter()
            .map(|&id| {
                let gate = self.netlist.gate(id);
                (gate.output(), gate.evaluate(self.netlist.signals()))
            })
            .collect();
        self.total_evaluations += gates.len() as u64;
        for (output, value) in results {
            self.post_write(output, value);
        }
    }

    /// Commits all pending writes and returns the gates to run next.
    fn update_phase(&mut self, observer: &mut dyn Observer) -> Result<Vec<GateId>, SimError> {
        let queued = std::mem::take(&mut self.update_queue);
        let mut changed: Vec<SignalId> = queued
            .into_iter()
            .filter(|&id| self.netlist.signals_mut()[id].commit())
            .collect();
        if changed.is_empty() {
            return Ok(Vec::new());
        }
        changed.sort_unstable();

        if let Some(rec) = &mut self.recorder {
            for &id in &changed {
                rec.record_change(self.current_time.fs, id, self.netlist.value(id))?;
            }
        }
        observer.on_commit(self.current_time, self.total_deltas, &changed, &self.netlist);

        Ok(self.find_sensitive_gates(&changed))
    }

    /// Builds the subscription table: signal -> gates reading it.
    fn build_sensitivity_map(&mut self) {
        self.sensitivity_map.clear();
        for (id, gate) in self.netlist.gates().iter() {
            for &input in gate.inputs() {
                let subs = self.sensitivity_map.entry(input).or_default();
                // A gate listing the same input twice subscribes once.
                if subs.last() != Some(&id) {
                    subs.push(id);
                }
            }
        }
    }

    /// Deduplicated, ascending set of gates subscribed to any changed signal.
    fn find_sensitive_gates(&self, changed: &[SignalId]) -> Vec<GateId> {
        let mut to_run = HashSet::new();
        for sig in changed {
            if let Some(gates) = self.sensitivity_map.get(sig) {
                to_run.extend(gates.iter().copied());
            }
        }
        let mut result: Vec<GateId> = to_run.into_iter().collect();
        result.sort_unstable();
        result
    }
}
