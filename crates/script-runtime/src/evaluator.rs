//! Restricted in-process evaluator.
//!
//! Runs a vetted program on a blocking task of the current runtime and races
//! it against the caller's timeout. The first side to settle decides the
//! result; a run that loses the race is cancelled through its monitor and
//! its eventual completion is discarded.

use crate::compiler::ScriptCompiler;
use crate::interp;
use crate::monitor::ExecutionMonitor;
use crate::runner::ScriptRunner;
use crate::sdk::CapabilityApi;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenant_script_core::{Error, ExecutionContext, ExecutionResult, Result, SandboxConfig};

/// Evaluates scripts on the host with only the capability object in scope.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::evaluator::InProcessEvaluator;
/// use tenant_script_runtime::host::HostAccessors;
/// use tenant_script_runtime::sdk::{SdkConfig, create_sdk};
/// use tenant_script_core::{ExecutionContext, SandboxConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let evaluator = InProcessEvaluator::new(&SandboxConfig::default());
/// let api = create_sdk(SdkConfig::default(), HostAccessors::new());
/// let result = evaluator
///     .evaluate("const a = 1;", &api, &ExecutionContext::default(), Duration::from_secs(1))
///     .await;
/// assert!(result.success);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InProcessEvaluator {
    compiler: Arc<ScriptCompiler>,
    max_steps: Option<u64>,
}

impl InProcessEvaluator {
    /// Creates an evaluator with its own compiler.
    #[must_use]
    pub fn new(config: &SandboxConfig) -> Self {
        Self::with_compiler(Arc::new(ScriptCompiler::new(config)), config.max_steps)
    }

    /// Creates an evaluator sharing an existing compiler.
    #[must_use]
    pub const fn with_compiler(compiler: Arc<ScriptCompiler>, max_steps: Option<u64>) -> Self {
        Self {
            compiler,
            max_steps,
        }
    }

    /// The compiler used to vet scripts.
    #[must_use]
    pub fn compiler(&self) -> &ScriptCompiler {
        &self.compiler
    }

    /// Gates, compiles and runs `script`, never failing outright.
    pub async fn evaluate(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> ExecutionResult {
        let start = Instant::now();

        let program = match self.compiler.compile(script) {
            Ok(program) => program,
            Err(err) => return ExecutionResult::from_error(&err),
        };

        let monitor = Arc::new(ExecutionMonitor::new(self.max_steps, timeout));
        let task = {
            let api = api.clone();
            let context = context.clone();
            let monitor = Arc::clone(&monitor);
            tokio::task::spawn_blocking(move || {
                interp::execute(&program, &api, &context, &monitor)
            })
        };

        let outcome = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                tracing::error!("script task failed: {}", join_err);
                Err(Error::runtime(format!("script task failed: {join_err}")))
            }
            Err(_) => {
                monitor.cancel();
                tracing::warn!("Execution timeout after {:?}", timeout);
                Err(monitor.timeout_error())
            }
        };

        tracing::info!(
            event = %context.event,
            success = outcome.is_ok(),
            elapsed = ?start.elapsed(),
            "in-process run finished"
        );
        tracing::debug!("Resource usage: {}", monitor.summary());

        ExecutionResult::from(outcome)
    }
}

#[async_trait]
impl ScriptRunner for InProcessEvaluator {
    async fn run(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        Ok(self.evaluate(script, api, context, timeout).await)
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FormState, HostAccessors, HostCall};
    use crate::sdk::{SdkConfig, create_sdk};
    use serde_json::json;

    fn evaluator() -> InProcessEvaluator {
        InProcessEvaluator::new(&SandboxConfig::builder().unlimited_steps().build())
    }

    async fn run(script: &str, form: &FormState, mask: &[&str]) -> ExecutionResult {
        let api = create_sdk(SdkConfig::masking(mask.iter().copied()), form.accessors());
        evaluator()
            .evaluate(script, &api, &ExecutionContext::default(), Duration::from_millis(500))
            .await
    }

    #[tokio::test]
    async fn test_clean_script_succeeds() {
        let result = run("const a = 1;", &FormState::new(), &[]).await;
        assert_eq!(result, ExecutionResult::ok());
    }

    #[tokio::test]
    async fn test_forbidden_global_never_runs() {
        let form = FormState::new();
        let result = run("ui.toast('hi'); window.alert('x');", &form, &[]).await;
        assert_eq!(result.error.as_deref(), Some("Forbidden global usage: window"));
        assert!(form.calls().is_empty());
    }

    #[tokio::test]
    async fn test_compilation_error() {
        let result = run("const = ;", &FormState::new(), &[]).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Compilation error:"));
    }

    #[tokio::test]
    async fn test_masked_write_fails_run() {
        let form = FormState::new();
        let result = run("await ui.setField('ssn', '123');", &form, &["ssn"]).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("masked"));
        assert!(form.calls().is_empty());
    }

    #[tokio::test]
    async fn test_calls_observed_in_order() {
        let form = FormState::new().with_field("country", json!("US"));
        let script = "
            const country = await ui.getField('country');
            if (country === 'US') { ui.hide('#vat'); }
            ui.toast('ready');
        ";
        let result = run(script, &form, &[]).await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            form.calls(),
            vec![
                HostCall::GetField {
                    name: "country".to_string()
                },
                HostCall::Hide {
                    selector: "#vat".to_string()
                },
                HostCall::Toast {
                    message: "ready".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_never_settling_script_times_out() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::default(), form.accessors());
        let start = Instant::now();
        let result = evaluator()
            .evaluate(
                "while (true) {}",
                &api,
                &ExecutionContext::default(),
                Duration::from_millis(50),
            )
            .await;
        assert!(result.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_step_budget_stops_loops() {
        let evaluator = InProcessEvaluator::new(&SandboxConfig::builder().max_steps(100).build());
        let api = create_sdk(SdkConfig::default(), HostAccessors::new());
        let result = evaluator
            .evaluate(
                "while (true) {}",
                &api,
                &ExecutionContext::default(),
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(result.error.as_deref(), Some(crate::monitor::STEP_LIMIT_MESSAGE));
    }

    #[tokio::test]
    async fn test_uncaught_throw_is_rendered() {
        let result = run("throw new Error('boom');", &FormState::new(), &[]).await;
        assert_eq!(result.error.as_deref(), Some("Error: boom"));
    }
}
