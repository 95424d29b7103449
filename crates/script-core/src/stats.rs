//! Execution statistics.
//!
//! [`DispatchStats`] is a serializable snapshot of what a dispatcher has
//! done so far: how many invocations it handled, how many failed or timed
//! out, and which execution path served them.
//!
//! # Examples
//!
//! ```
//! use tenant_script_core::stats::DispatchStats;
//!
//! let stats = DispatchStats {
//!     total_runs: 10,
//!     failures: 2,
//!     timeouts: 1,
//!     isolated_runs: 7,
//!     fallback_runs: 0,
//!     in_process_runs: 3,
//!     total_duration_us: 50_000,
//! };
//! assert!((stats.success_rate() - 0.8).abs() < f64::EPSILON);
//! assert_eq!(stats.avg_duration_us(), 5_000);
//! ```

use serde::{Deserialize, Serialize};

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Invocations handled
    pub total_runs: u64,
    /// Invocations that produced `success: false`
    pub failures: u64,
    /// Failures caused by the timeout
    pub timeouts: u64,
    /// Invocations served by the isolation runner
    pub isolated_runs: u64,
    /// Invocations served by an installed fallback runner
    pub fallback_runs: u64,
    /// Invocations served by the built-in in-process evaluator
    pub in_process_runs: u64,
    /// Sum of invocation wall-clock time in microseconds
    pub total_duration_us: u64,
}

impl DispatchStats {
    /// Fraction of invocations that succeeded, `1.0` when nothing ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            return 1.0;
        }
        (self.total_runs - self.failures) as f64 / self.total_runs as f64
    }

    /// Mean invocation time in microseconds, `0` when nothing ran.
    #[must_use]
    pub const fn avg_duration_us(&self) -> u64 {
        if self.total_runs == 0 {
            0
        } else {
            self.total_duration_us / self.total_runs
        }
    }
}
