//! Simulation time with femtosecond resolution and delta-cycle index.
//!
//! [`SimTime`] orders events first by wall-clock simulation time, then by the
//! delta cycle within that instant.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;

/// A point in simulated time.
///
/// `delta` counts the delta cycles executed so far at `fs`; it is reset to
/// zero whenever time advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Simulation time in femtoseconds.
    pub fs: u64,
    /// Delta cycle index within the current time step.
    pub delta: u32,
}

impl SimTime {
    /// Time zero, delta zero.
    pub fn zero() -> Self {
        Self { fs: 0, delta: 0 }
    }

    /// Creates a time from nanoseconds with delta 0.
    pub fn from_ns(ns: u64) -> Self {
        Self {
            fs: ns * FS_PER_NS,
            delta: 0,
        }
    }

    /// Creates a time from femtoseconds with delta 0.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// Returns the next delta cycle at the same instant.
    pub fn next_delta(&self) -> Self {
        Self {
            fs: self.fs,
            delta: self.delta.saturating_add(1),
        }
    }

    /// Moves to a later instant, resetting the delta counter.
    pub fn advance_to(&self, new_fs: u64) -> Self {
        debug_assert!(
            new_fs >= self.fs,
            "cannot advance backwards: {} -> {}",
            self.fs,
            new_fs
        );
        Self {
            fs: new_fs,
            delta: 0,
        }
    }

    /// Converts to nanoseconds (truncated).
    pub fn to_ns(&self) -> u64 {
        self.fs / FS_PER_NS
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        if fs == 0 {
            write!(f, "0 fs")?;
        } else if fs % FS_PER_MS == 0 {
            write!(f, "{} ms", fs / FS_PER_MS)?;
        } else if fs % FS_PER_US == 0 {
            write!(f, "{} us", fs / FS_PER_US)?;
        } else if fs % FS_PER_NS == 0 {
            write!(f, "{} ns", fs / FS_PER_NS)?;
        } else if fs % FS_PER_PS == 0 {
            write!(f, "{} ps", fs / FS_PER_PS)?;
        } else {
            write!(f, "{fs} fs")?;
        }
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delta_keeps_instant() {
        let t = SimTime::from_ns(5).next_delta().next_delta();
        assert_eq!(t.fs, 5 * FS_PER_NS);
        assert_eq!(t.delta, 2);
    }

    #[test]
    fn advance_resets_delta() {
        let t = SimTime { fs: 100, delta: 5 }.advance_to(200);
        assert_eq!(t, SimTime::from_fs(200));
    }

    #[test]
    fn ordering_is_time_then_delta() {
        assert!(SimTime::from_ns(1) < SimTime::from_ns(2));
        assert!(SimTime { fs: 100, delta: 0 } < SimTime { fs: 100, delta: 1 });
        assert!(SimTime { fs: 200, delta: 0 } > SimTime { fs: 100, delta: 99 });
    }

    #[test]
    fn display_picks_largest_exact_unit() {
        assert_eq!(SimTime::zero().to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_fs(500 * FS_PER_PS).to_string(), "500 ps");
        assert_eq!(SimTime::from_fs(5 * FS_PER_US).to_string(), "5 us");
        assert_eq!(SimTime::from_fs(2 * FS_PER_MS).to_string(), "2 ms");
        assert_eq!(SimTime::from_fs(1500).to_string(), "1500 fs");
    }

    #[test]
    fn display_with_delta() {
        let t = SimTime {
            fs: 30 * FS_PER_NS,
            delta: 3,
        };
        assert_eq!(t.to_string(), "30 ns+d3");
    }

    #[test]
    fn to_ns_truncates() {
        assert_eq!(SimTime::from_fs(1_500_000).to_ns(), 1);
    }
}
