//! Execution dispatcher.
//!
//! Chooses how one invocation runs: the installed isolation runner, else an
//! installed fallback runner, else the built-in in-process evaluator. A
//! runner reporting itself unavailable hands the invocation to the next
//! option; exactly one path ever runs the script.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::dispatcher::Dispatcher;
//! use tenant_script_runtime::host::FormState;
//! use tenant_script_runtime::sdk::{SdkConfig, create_sdk};
//! use tenant_script_core::{ExecutionContext, SandboxConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::from_config(&SandboxConfig::default());
//! let form = FormState::new();
//! let api = create_sdk(SdkConfig::masking(["ssn"]), form.accessors());
//!
//! let result = dispatcher
//!     .run("await ui.setField('ssn', 'x');", &api, &ExecutionContext::default())
//!     .await;
//! assert!(!result.success);
//! assert_eq!(dispatcher.stats().total_runs, 1);
//! # }
//! ```

use crate::compiler::ScriptCompiler;
use crate::evaluator::InProcessEvaluator;
use crate::isolate::IsolatedRunner;
use crate::runner::ScriptRunner;
use crate::sdk::CapabilityApi;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tenant_script_core::stats::DispatchStats;
use tenant_script_core::{ExecutionContext, ExecutionResult, ExecutionStrategy, SandboxConfig};

/// Which path served an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Path {
    Isolated,
    Fallback,
    InProcess,
}

#[derive(Debug, Default)]
struct Counters {
    total_runs: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    isolated_runs: AtomicU64,
    fallback_runs: AtomicU64,
    in_process_runs: AtomicU64,
    total_duration_us: AtomicU64,
}

impl Counters {
    fn record(&self, path: Path, result: &ExecutionResult, elapsed: Duration) {
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        if !result.success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_timeout() {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        let per_path = match path {
            Path::Isolated => &self.isolated_runs,
            Path::Fallback => &self.fallback_runs,
            Path::InProcess => &self.in_process_runs,
        };
        per_path.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_duration_us.fetch_add(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            total_runs: self.total_runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            isolated_runs: self.isolated_runs.load(Ordering::Relaxed),
            fallback_runs: self.fallback_runs.load(Ordering::Relaxed),
            in_process_runs: self.in_process_runs.load(Ordering::Relaxed),
            total_duration_us: self.total_duration_us.load(Ordering::Relaxed),
        }
    }
}

/// Routes invocations to one execution path.
#[derive(Debug)]
pub struct Dispatcher {
    isolated: Option<Arc<dyn ScriptRunner>>,
    fallback: Option<Arc<dyn ScriptRunner>>,
    evaluator: InProcessEvaluator,
    timeout: Duration,
    counters: Counters,
}

impl Dispatcher {
    /// Starts a builder over `config`.
    #[must_use]
    pub fn builder(config: SandboxConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            isolated: None,
            fallback: None,
        }
    }

    /// Builds the dispatcher described by `config`.
    ///
    /// [`ExecutionStrategy::Isolated`] installs an [`IsolatedRunner`];
    /// [`ExecutionStrategy::InProcess`] leaves only the built-in evaluator.
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        let builder = Self::builder(config.clone());
        match config.strategy {
            ExecutionStrategy::Isolated => builder
                .isolated_runner(Arc::new(IsolatedRunner::new(config)))
                .build(),
            ExecutionStrategy::InProcess => builder.build(),
        }
    }

    /// Timeout applied to every invocation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` if an isolation runner is installed.
    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        self.isolated.is_some()
    }

    /// Compiler used by the built-in evaluator.
    #[must_use]
    pub fn compiler(&self) -> &ScriptCompiler {
        self.evaluator.compiler()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Runs `script` once against `api`.
    pub async fn run(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
    ) -> ExecutionResult {
        let start = Instant::now();
        let (path, result) = self.route(script, api, context).await;
        let elapsed = start.elapsed();

        self.counters.record(path, &result, elapsed);
        if let Some(error) = &result.error {
            tracing::debug!(?path, error = %error, "script failed");
        }
        result
    }

    async fn route(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
    ) -> (Path, ExecutionResult) {
        let installed = [
            (Path::Isolated, self.isolated.as_ref()),
            (Path::Fallback, self.fallback.as_ref()),
        ];
        for (path, runner) in installed {
            let Some(runner) = runner else {
                continue;
            };
            match runner.run(script, api, context, self.timeout).await {
                Ok(result) => return (path, result),
                Err(err) if err.is_isolate_unavailable() => {
                    tracing::warn!(runner = runner.name(), "runner unavailable: {}", err);
                }
                Err(err) => return (path, ExecutionResult::from_error(&err)),
            }
        }
        let result = self
            .evaluator
            .evaluate(script, api, context, self.timeout)
            .await;
        (Path::InProcess, result)
    }
}

/// Builder for [`Dispatcher`].
#[derive(Debug)]
pub struct DispatcherBuilder {
    config: SandboxConfig,
    isolated: Option<Arc<dyn ScriptRunner>>,
    fallback: Option<Arc<dyn ScriptRunner>>,
}

impl DispatcherBuilder {
    /// Installs the isolation runner.
    #[must_use]
    pub fn isolated_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.isolated = Some(runner);
        self
    }

    /// Installs a fallback runner tried when no isolation runner takes the run.
    #[must_use]
    pub fn fallback_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.fallback = Some(runner);
        self
    }

    /// Builds the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        tracing::debug!(
            strategy = %self.config.strategy.as_str(),
            isolated = self.isolated.is_some(),
            fallback = self.fallback.is_some(),
            timeout_ms = self.config.timeout_ms,
            "dispatcher ready"
        );
        Dispatcher {
            isolated: self.isolated,
            fallback: self.fallback,
            evaluator: InProcessEvaluator::new(&self.config),
            timeout: self.config.timeout(),
            counters: Counters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FormState;
    use crate::sdk::{SdkConfig, create_sdk};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tenant_script_core::{Error, Result};

    #[derive(Debug, Default)]
    struct Unavailable {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ScriptRunner for Unavailable {
        async fn run(
            &self,
            _script: &str,
            _api: &CapabilityApi,
            _context: &ExecutionContext,
            _timeout: Duration,
        ) -> Result<ExecutionResult> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::IsolateUnavailable {
                message: "no threads".to_string(),
            })
        }
    }

    #[derive(Debug, Default)]
    struct Fixed {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ScriptRunner for Fixed {
        async fn run(
            &self,
            _script: &str,
            _api: &CapabilityApi,
            _context: &ExecutionContext,
            _timeout: Duration,
        ) -> Result<ExecutionResult> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(ExecutionResult::failure("from fallback"))
        }
    }

    fn api(form: &FormState) -> CapabilityApi {
        create_sdk(SdkConfig::masking(["ssn"]), form.accessors())
    }

    #[tokio::test]
    async fn test_from_config_selects_strategy() {
        let isolated = Dispatcher::from_config(&SandboxConfig::default());
        assert!(isolated.is_isolated());

        let config = SandboxConfig::builder()
            .strategy(ExecutionStrategy::InProcess)
            .build();
        let in_process = Dispatcher::from_config(&config);
        assert!(!in_process.is_isolated());

        let form = FormState::new();
        in_process
            .run("const a = 1;", &api(&form), &ExecutionContext::default())
            .await;
        assert_eq!(in_process.stats().in_process_runs, 1);
    }

    #[tokio::test]
    async fn test_unavailable_isolate_falls_through_to_fallback() {
        let isolated = Arc::new(Unavailable::default());
        let fallback = Arc::new(Fixed::default());
        let dispatcher = Dispatcher::builder(SandboxConfig::default())
            .isolated_runner(isolated.clone())
            .fallback_runner(fallback.clone())
            .build();

        let form = FormState::new();
        let result = dispatcher
            .run("const a = 1;", &api(&form), &ExecutionContext::default())
            .await;

        assert_eq!(result.error.as_deref(), Some("from fallback"));
        assert_eq!(isolated.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.runs.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.stats().fallback_runs, 1);
    }

    #[tokio::test]
    async fn test_unavailable_runners_fall_through_to_evaluator() {
        let dispatcher = Dispatcher::builder(SandboxConfig::default())
            .isolated_runner(Arc::new(Unavailable::default()))
            .fallback_runner(Arc::new(Unavailable::default()))
            .build();

        let form = FormState::new();
        let result = dispatcher
            .run("ui.toast('hi');", &api(&form), &ExecutionContext::default())
            .await;

        assert!(result.success);
        assert_eq!(form.toasts(), vec!["hi"]);
        let stats = dispatcher.stats();
        assert_eq!(stats.in_process_runs, 1);
        assert_eq!(stats.isolated_runs + stats.fallback_runs, 0);
    }

    #[tokio::test]
    async fn test_isolated_runner_wins_when_available() {
        let fallback = Arc::new(Fixed::default());
        let config = SandboxConfig::default();
        let dispatcher = Dispatcher::builder(config.clone())
            .isolated_runner(Arc::new(IsolatedRunner::new(&config)))
            .fallback_runner(fallback.clone())
            .build();

        let form = FormState::new();
        let result = dispatcher
            .run("ui.toast('iso');", &api(&form), &ExecutionContext::default())
            .await;

        assert!(result.success);
        assert_eq!(form.toasts(), vec!["iso"]);
        assert_eq!(fallback.runs.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.stats().isolated_runs, 1);
    }

    #[tokio::test]
    async fn test_stats_count_failures_and_timeouts() {
        let config = SandboxConfig::builder()
            .strategy(ExecutionStrategy::InProcess)
            .timeout_ms(30)
            .unlimited_steps()
            .build();
        let dispatcher = Dispatcher::from_config(&config);
        let form = FormState::new();
        let context = ExecutionContext::default();

        dispatcher.run("const a = 1;", &api(&form), &context).await;
        dispatcher.run("window;", &api(&form), &context).await;
        dispatcher.run("while (true) {}", &api(&form), &context).await;

        let stats = dispatcher.stats();
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.timeouts, 1);
    }
}
