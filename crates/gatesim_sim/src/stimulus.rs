//! Stimulus sources that drive a circuit's inputs over simulated time.

use crate::error::SimError;
use crate::kernel::SimKernel;
use crate::signal::SignalId;
use crate::time::FS_PER_NS;

/// Default time between two input vectors: 10 ns.
pub const DEFAULT_PERIOD_FS: u64 = 10 * FS_PER_NS;

/// Largest input count [`ExhaustiveStimulus`] will enumerate.
pub const MAX_EXHAUSTIVE_INPUTS: usize = 24;

/// Something that writes input signals at discrete ticks.
pub trait Stimulus {
    /// Applies the writes for the current tick.
    ///
    /// Returns the delay in femtoseconds until the next tick, or `None` to
    /// request that the simulation stop once the current step has settled.
    fn apply(&mut self, kernel: &mut SimKernel) -> Result<Option<u64>, SimError>;
}

/// Length in femtoseconds of an exhaustive run over `inputs` inputs:
/// `(2^inputs + 1) * period_fs`, or `None` if that does not fit in `u64`.
pub fn exhaustive_duration_fs(inputs: usize, period_fs: u64) -> Option<u64> {
    let vectors = 1u64.checked_shl(u32::try_from(inputs).ok()?)?;
    vectors.checked_add(1)?.checked_mul(period_fs)
}

/// Input vector `index` of a binary counter over `width` bits; bit `j`
/// drives input `j`.
pub fn counter_vector(index: u64, width: usize) -> Vec<bool> {
    (0..width).map(|j| (index >> j) & 1 == 1).collect()
}

/// Drives every combination of its inputs in binary-counter order.
///
/// Vector `i` is applied at `i * period`. After the last vector all inputs
/// return to `false` for one more period, then a stop is requested, so the
/// run ends at `(2^k + 1) * period`.
#[derive(Debug, Clone)]
pub struct ExhaustiveStimulus {
    inputs: Vec<SignalId>,
    period_fs: u64,
    next: u64,
}

impl ExhaustiveStimulus {
    /// Enumerates `inputs` with `period_fs` between vectors.
    pub fn new(inputs: Vec<SignalId>, period_fs: u64) -> Result<Self, SimError> {
        if period_fs == 0 {
            return Err(SimError::InvalidStimulus {
                reason: "period must be non-zero".into(),
            });
        }
        if inputs.len() > MAX_EXHAUSTIVE_INPUTS {
            return Err(SimError::InvalidStimulus {
                reason: format!(
                    "{} inputs exceed the exhaustive limit of {MAX_EXHAUSTIVE_INPUTS}",
                    inputs.len()
                ),
            });
        }
        if exhaustive_duration_fs(inputs.len(), period_fs).is_none() {
            return Err(SimError::InvalidStimulus {
                reason: format!(
                    "{} vectors at a {period_fs} fs period overflow simulation time",
                    1u64 << inputs.len()
                ),
            });
        }
        Ok(Self {
            inputs,
            period_fs,
            next: 0,
        })
    }

    /// Number of input vectors to enumerate.
    pub fn vector_count(&self) -> u64 {
        1u64 << self.inputs.len()
    }

    /// Number of ticks applied so far.
    pub fn ticks_applied(&self) -> u64 {
        self.next
    }

    /// Time in femtoseconds at which the run will stop, relative to the first tick.
    pub fn duration_fs(&self) -> u64 {
        exhaustive_duration_fs(self.inputs.len(), self.period_fs).unwrap_or(u64::MAX)
    }
}

impl Stimulus for ExhaustiveStimulus {
    fn apply(&mut self, kernel: &mut SimKernel) -> Result<Option<u64>, SimError> {
        let total = self.vector_count();
        let index = self.next;
        if index > total {
            return Ok(None);
        }
        // One extra tick returns every input to false.
        let vector = if index < total {
            counter_vector(index, self.inputs.len())
        } else {
            vec![false; self.inputs.len()]
        };
        for (&sig, value) in self.inputs.iter().zip(vector) {
            kernel.write(sig, value)?;
        }
        self.next += 1;
        Ok(Some(self.period_fs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{Monitor, MonitorMode};
    use crate::netlist::Netlist;

    #[test]
    fn counter_vector_is_lsb_first() {
        assert_eq!(counter_vector(0b110, 3), vec![false, true, true]);
        assert_eq!(counter_vector(1, 2), vec![true, false]);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(matches!(
            ExhaustiveStimulus::new(vec![], 0),
            Err(SimError::InvalidStimulus { .. })
        ));
    }

    #[test]
    fn too_many_inputs_is_rejected() {
        let ids = (0..25).map(SignalId::from_raw).collect();
        assert!(ExhaustiveStimulus::new(ids, DEFAULT_PERIOD_FS).is_err());
    }

    #[test]
    fn run_longer_than_u64_femtoseconds_is_rejected() {
        let ids: Vec<SignalId> = (0..2).map(SignalId::from_raw).collect();
        let err = ExhaustiveStimulus::new(ids.clone(), u64::MAX / 3).unwrap_err();
        assert!(err.to_string().contains("overflow"));
        // 15 inputs at one second each.
        let ids: Vec<SignalId> = (0..15).map(SignalId::from_raw).collect();
        assert!(ExhaustiveStimulus::new(ids, 1_000_000_000_000_000).is_err());
        // The largest period that still fits.
        let ids: Vec<SignalId> = (0..2).map(SignalId::from_raw).collect();
        let stim = ExhaustiveStimulus::new(ids, u64::MAX / 5).unwrap();
        assert_eq!(stim.duration_fs(), u64::MAX / 5 * 5);
    }

    #[test]
    fn exhaustive_duration() {
        assert_eq!(exhaustive_duration_fs(3, 10), Some(90));
        assert_eq!(exhaustive_duration_fs(64, 1), None);
        assert_eq!(exhaustive_duration_fs(1, u64::MAX / 3), Some(u64::MAX));
        assert_eq!(exhaustive_duration_fs(1, u64::MAX / 2), None);
    }

    #[test]
    fn enumerates_all_vectors_then_stops() {
        let mut net = Netlist::new();
        let a = net.add_input("a");
        let b = net.add_input("b");
        let mut kernel = SimKernel::new(net);
        let mut stim = ExhaustiveStimulus::new(vec![a, b], DEFAULT_PERIOD_FS).unwrap();
        let mut mon = Monitor::new(
            vec![("a".into(), a), ("b".into(), b)],
            MonitorMode::OnSettled,
        );

        let result = kernel.run(&mut stim, &mut mon).unwrap();

        assert!(result.stopped);
        assert_eq!(result.final_time.fs, 5 * DEFAULT_PERIOD_FS);
        assert_eq!(stim.duration_fs(), 5 * DEFAULT_PERIOD_FS);
        let rows: Vec<(u64, Vec<bool>)> = mon
            .samples()
            .iter()
            .map(|s| (s.time.to_ns(), s.values.clone()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, vec![false, false]),
                (10, vec![true, false]),
                (20, vec![false, true]),
                (30, vec![true, true]),
                (40, vec![false, false]),
                (50, vec![false, false]),
            ]
        );
    }
}
