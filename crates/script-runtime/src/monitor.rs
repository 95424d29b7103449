//! Execution monitoring for script runs.
//!
//! Tracks interpreter steps and capability calls, enforces the step budget
//! and carries the cancellation flag the timeout side sets once it has given
//! up on a run.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::monitor::ExecutionMonitor;
//! use std::time::Duration;
//!
//! let monitor = ExecutionMonitor::new(Some(10), Duration::from_millis(100));
//! assert!(monitor.tick().is_ok());
//! assert_eq!(monitor.steps(), 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tenant_script_core::{Error, Result, SandboxConfig};

/// Message reported when a run exhausts its step budget.
pub const STEP_LIMIT_MESSAGE: &str = "Step limit exceeded";

/// Resource monitor for one script run.
///
/// Shared between the thread running the interpreter and the task racing it
/// against the timeout, so all counters are atomics.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::monitor::ExecutionMonitor;
/// use std::time::Duration;
///
/// let monitor = ExecutionMonitor::new(None, Duration::from_secs(1));
/// monitor.cancel();
/// assert!(monitor.tick().unwrap_err().is_timeout());
/// ```
#[derive(Debug)]
pub struct ExecutionMonitor {
    steps: AtomicU64,
    capability_calls: AtomicUsize,
    cancelled: AtomicBool,
    start_time: Instant,
    max_steps: Option<u64>,
    timeout: Duration,
}

impl ExecutionMonitor {
    /// Creates a monitor with an optional step budget.
    #[must_use]
    pub fn new(max_steps: Option<u64>, timeout: Duration) -> Self {
        Self {
            steps: AtomicU64::new(0),
            capability_calls: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            start_time: Instant::now(),
            max_steps,
            timeout,
        }
    }

    /// Creates a monitor from the sandbox limits, bounded by `timeout`.
    #[must_use]
    pub fn from_config(config: &SandboxConfig, timeout: Duration) -> Self {
        Self::new(config.max_steps, timeout)
    }

    /// Accounts for one interpreter step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] once the run was cancelled and a runtime
    /// error once the step budget is exhausted.
    pub fn tick(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(self.timeout_error());
        }
        let steps = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(max) = self.max_steps
            && steps > max
        {
            tracing::warn!(steps, max, "script exceeded its step budget");
            return Err(Error::runtime(STEP_LIMIT_MESSAGE));
        }
        Ok(())
    }

    /// Records a capability call made by the script.
    pub fn record_capability_call(&self) {
        self.capability_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Abandons the run; the interpreter stops at its next step.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Steps taken so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Capability calls made so far.
    #[must_use]
    pub fn capability_calls(&self) -> usize {
        self.capability_calls.load(Ordering::Relaxed)
    }

    /// Time since the monitor was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// The timeout error this run reports.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    /// One-line usage summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "steps: {}, capability calls: {}, elapsed: {:?}",
            self.steps(),
            self.capability_calls(),
            self.elapsed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget() {
        let monitor = ExecutionMonitor::new(Some(3), Duration::from_secs(1));
        for _ in 0..3 {
            monitor.tick().unwrap();
        }
        let err = monitor.tick().unwrap_err();
        assert!(err.is_runtime_error());
        assert_eq!(err.to_string(), STEP_LIMIT_MESSAGE);
    }

    #[test]
    fn test_unlimited_steps() {
        let monitor = ExecutionMonitor::new(None, Duration::from_secs(1));
        for _ in 0..10_000 {
            monitor.tick().unwrap();
        }
        assert_eq!(monitor.steps(), 10_000);
    }

    #[test]
    fn test_cancel_wins_over_budget() {
        let monitor = ExecutionMonitor::new(Some(100), Duration::from_millis(250));
        monitor.cancel();
        assert!(monitor.is_cancelled());
        match monitor.tick().unwrap_err() {
            Error::Timeout { timeout_ms } => assert_eq!(timeout_ms, 250),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_summary() {
        let monitor = ExecutionMonitor::from_config(&SandboxConfig::default(), Duration::from_secs(1));
        monitor.tick().unwrap();
        monitor.record_capability_call();
        let summary = monitor.summary();
        assert!(summary.contains("steps: 1"));
        assert!(summary.contains("capability calls: 1"));
    }
}
