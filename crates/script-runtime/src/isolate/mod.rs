//! Isolated execution boundary.
//!
//! Each invocation gets a dedicated worker thread that owns nothing but
//! deserialized data. The host and the isolate talk only through JSON
//! strings on a pair of channels:
//!
//! ```text
//! isolate → host   {"type":"ready"}
//! host → isolate   {"script": ..., "api": ..., "context": ...}
//! isolate → host   {"type":"result", "success": ..., "effects": [...], "submitBlocked": ...}
//! ```
//!
//! The isolate rebuilds `ui` / `workflow` / `repo` from the descriptor and
//! records host effects instead of performing them. Once the result arrives
//! the host replays those effects through the real capability object and
//! mirrors the submit flag. On every exit path the response receiver is
//! dropped and the isolate is cancelled and detached.

mod protocol;
mod shim;

pub use protocol::{Effect, IsolateMessage, IsolateRequest};

use crate::compiler::ScriptCompiler;
use crate::interp;
use crate::monitor::ExecutionMonitor;
use crate::runner::ScriptRunner;
use crate::sdk::CapabilityApi;
use async_trait::async_trait;
use shim::IsolateShim;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};
use tenant_script_core::{Error, ExecutionContext, ExecutionResult, Result, SandboxConfig};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Stack reserved for each isolate thread.
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024 * 1024;

/// Runs every invocation on its own isolate thread.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::isolate::IsolatedRunner;
/// use tenant_script_runtime::host::FormState;
/// use tenant_script_runtime::runner::ScriptRunner;
/// use tenant_script_runtime::sdk::{SdkConfig, create_sdk};
/// use tenant_script_core::{ExecutionContext, SandboxConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = IsolatedRunner::new(&SandboxConfig::default());
/// let form = FormState::new();
/// let api = create_sdk(SdkConfig::default(), form.accessors());
///
/// let result = runner
///     .run("ui.toast('hello');", &api, &ExecutionContext::default(), Duration::from_secs(1))
///     .await
///     .unwrap();
/// assert!(result.success);
/// assert_eq!(form.toasts(), vec!["hello"]);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IsolatedRunner {
    config: SandboxConfig,
    stack_size: usize,
}

impl IsolatedRunner {
    /// Creates a runner applying the limits and deny-list of `config`.
    #[must_use]
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            config: config.clone(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Overrides the isolate thread stack size.
    #[must_use]
    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    fn spawn(&self, monitor: &Arc<ExecutionMonitor>) -> Result<Isolate> {
        let id = Uuid::new_v4();
        let (request_tx, request_rx) = std_mpsc::channel::<String>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<String>();

        let config = self.config.clone();
        let worker_monitor = Arc::clone(monitor);
        std::thread::Builder::new()
            .name(format!("script-isolate-{id}"))
            .stack_size(self.stack_size)
            .spawn(move || isolate_main(&config, &worker_monitor, &request_rx, &response_tx))
            .map_err(|err| {
                tracing::error!(isolate = %id, "failed to spawn isolate: {}", err);
                Error::IsolateUnavailable {
                    message: err.to_string(),
                }
            })?;

        tracing::debug!(isolate = %id, "isolate spawned");
        Ok(Isolate {
            id,
            requests: request_tx,
            responses: response_rx,
            monitor: Arc::clone(monitor),
        })
    }
}

#[async_trait]
impl ScriptRunner for IsolatedRunner {
    async fn run(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        if !api.can_describe() {
            return Err(Error::IsolateUnavailable {
                message: "host reads fields without a snapshot".to_string(),
            });
        }

        let start = Instant::now();
        let monitor = Arc::new(ExecutionMonitor::from_config(&self.config, timeout));
        let mut isolate = self.spawn(&monitor)?;
        let id = isolate.id;

        let request = IsolateRequest {
            script: script.to_string(),
            api: api.describe(),
            context: context.clone(),
        };

        let settled = match tokio::time::timeout(timeout, isolate.exchange(&request)).await {
            Ok(Ok(settled)) => settled,
            Ok(Err(err)) if err.is_isolate_unavailable() => return Err(err),
            Ok(Err(err)) => {
                tracing::error!(isolate = %id, "isolate failed: {}", err);
                return Ok(ExecutionResult::from_error(&err));
            }
            Err(_) => {
                tracing::warn!(isolate = %id, "Execution timeout after {:?}", timeout);
                return Ok(ExecutionResult::from_error(&monitor.timeout_error()));
            }
        };
        drop(isolate);

        let result = settled.replay(api);
        tracing::info!(
            isolate = %id,
            event = %context.event,
            success = result.success,
            elapsed = ?start.elapsed(),
            "isolated run finished"
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "isolated"
    }
}

/// Host end of one isolate.
struct Isolate {
    id: Uuid,
    requests: std_mpsc::Sender<String>,
    responses: mpsc::UnboundedReceiver<String>,
    monitor: Arc<ExecutionMonitor>,
}

impl Drop for Isolate {
    fn drop(&mut self) {
        self.monitor.cancel();
        self.responses.close();
        tracing::trace!(isolate = %self.id, "isolate detached");
    }
}

/// A result message split into its parts.
#[derive(Debug)]
struct Settled {
    result: ExecutionResult,
    effects: Vec<Effect>,
    submit_blocked: bool,
}

impl Isolate {
    async fn next_message(&mut self) -> Option<Result<IsolateMessage>> {
        let raw = self.responses.recv().await?;
        Some(serde_json::from_str(&raw).map_err(Error::from))
    }

    async fn exchange(&mut self, request: &IsolateRequest) -> Result<Settled> {
        match self.next_message().await {
            Some(Ok(IsolateMessage::Ready)) => {}
            Some(Ok(IsolateMessage::Result { .. })) => {
                return Err(Error::IsolateUnavailable {
                    message: "isolate answered before it was ready".to_string(),
                });
            }
            Some(Err(err)) => return Err(err),
            None => {
                return Err(Error::IsolateUnavailable {
                    message: "isolate exited before it was ready".to_string(),
                });
            }
        }

        let payload = serde_json::to_string(request)?;
        self.requests
            .send(payload)
            .map_err(|_| Error::IsolateUnavailable {
                message: "isolate exited before receiving its request".to_string(),
            })?;

        match self.next_message().await {
            Some(Ok(IsolateMessage::Result {
                success,
                error,
                effects,
                submit_blocked,
            })) => Ok(Settled {
                result: ExecutionResult { success, error },
                effects,
                submit_blocked,
            }),
            Some(Ok(IsolateMessage::Ready)) => {
                Err(Error::runtime("isolate announced ready twice"))
            }
            Some(Err(err)) => Err(err),
            None => Err(Error::runtime("isolate terminated without a result")),
        }
    }
}

impl Settled {
    /// Replays the recorded effects and mirrors the submit flag.
    fn replay(self, api: &CapabilityApi) -> ExecutionResult {
        let mut result = self.result;
        for effect in self.effects {
            if let Err(err) = effect.apply(api) {
                tracing::error!("replaying isolate effect failed: {}", err);
                if result.success {
                    result = ExecutionResult::from_error(&err);
                }
                break;
            }
        }
        api.ui.block_submit(self.submit_blocked);
        result
    }
}

fn isolate_main(
    config: &SandboxConfig,
    monitor: &ExecutionMonitor,
    requests: &std_mpsc::Receiver<String>,
    responses: &mpsc::UnboundedSender<String>,
) {
    if !send(responses, &IsolateMessage::Ready) {
        return;
    }
    let Ok(raw) = requests.recv() else {
        return;
    };

    let message = match serde_json::from_str::<IsolateRequest>(&raw) {
        Ok(request) => run_request(config, monitor, request),
        Err(err) => IsolateMessage::settled(
            ExecutionResult::from_error(&Error::from(err)),
            Vec::new(),
            false,
        ),
    };
    send(responses, &message);
}

fn run_request(
    config: &SandboxConfig,
    monitor: &ExecutionMonitor,
    request: IsolateRequest,
) -> IsolateMessage {
    let compiler = ScriptCompiler::new(config);
    let shim = IsolateShim::new(request.api);
    let outcome = compiler
        .compile(&request.script)
        .and_then(|program| interp::execute(&program, &shim, &request.context, monitor));
    let (effects, submit_blocked) = shim.finish();
    IsolateMessage::settled(ExecutionResult::from(outcome), effects, submit_blocked)
}

fn send(responses: &mpsc::UnboundedSender<String>, message: &IsolateMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(payload) => responses.send(payload).is_ok(),
        Err(err) => {
            tracing::error!("failed to encode isolate message: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FormState, HostAccessors, HostCall};
    use crate::sdk::{SdkConfig, create_sdk};
    use serde_json::json;

    fn runner() -> IsolatedRunner {
        IsolatedRunner::new(&SandboxConfig::builder().unlimited_steps().build())
    }

    async fn run(script: &str, form: &FormState, mask: &[&str]) -> ExecutionResult {
        let api = create_sdk(SdkConfig::masking(mask.iter().copied()), form.accessors());
        runner()
            .run(script, &api, &ExecutionContext::default(), Duration::from_secs(2))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_effects_replayed_in_order() {
        let form = FormState::new().with_field("country", json!("US"));
        let script = "
            const country = await ui.getField('country');
            if (country === 'US') { ui.hide('#vat'); }
            ui.setField('region', 'NA');
            ui.toast('ready');
        ";
        let result = run(script, &form, &[]).await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            form.effects(),
            vec![
                HostCall::Hide {
                    selector: "#vat".to_string()
                },
                HostCall::SetField {
                    name: "region".to_string(),
                    value: json!("NA")
                },
                HostCall::Toast {
                    message: "ready".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_masked_write_rejected_inside_isolate() {
        let form = FormState::new();
        let result = run("ui.setField('ssn', '123-45-6789');", &form, &["ssn"]).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("masked"));
        assert!(form.effects().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_global_rejected_inside_isolate() {
        let form = FormState::new();
        let result = run("ui.toast('x'); document.cookie;", &form, &[]).await;
        assert_eq!(result.error.as_deref(), Some("Forbidden global usage: document"));
        assert!(form.calls().is_empty());
    }

    #[tokio::test]
    async fn test_effects_before_failure_are_replayed() {
        let form = FormState::new();
        let result = run("ui.toast('first'); throw new Error('stop');", &form, &[]).await;
        assert_eq!(result.error.as_deref(), Some("Error: stop"));
        assert_eq!(form.toasts(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_submit_flag_mirrored() {
        let api = create_sdk(SdkConfig::default(), HostAccessors::new());
        let result = runner()
            .run(
                "ui.blockSubmit(true);",
                &api,
                &ExecutionContext::default(),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(api.ui.is_submit_blocked());
    }

    #[tokio::test]
    async fn test_remote_calls_return_null_inside_isolate() {
        let form = FormState::new();
        let script = "
            const started = await workflow.start('onboard', { id: 7 });
            const found = await repo.call('lookup', {});
            if (started !== null || found !== null) { throw new Error('expected null'); }
        ";
        let result = run(script, &form, &[]).await;
        assert!(result.success, "{result:?}");
        assert_eq!(form.effects().len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_reported_once_and_nothing_replayed() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::default(), form.accessors());
        let result = runner()
            .run(
                "ui.toast('never'); while (true) {}",
                &api,
                &ExecutionContext::default(),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
        assert!(result.is_timeout());
        assert!(form.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_replay_fails_run() {
        let host = HostAccessors::new().on_toast(|_| {
            Err(Error::HostError {
                message: "toast service down".to_string(),
            })
        });
        let api = create_sdk(SdkConfig::default(), host);
        let result = runner()
            .run(
                "ui.toast('hi');",
                &api,
                &ExecutionContext::default(),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert_eq!(result.error.as_deref(), Some("toast service down"));
    }

    #[tokio::test]
    async fn test_reader_without_snapshot_is_unavailable() {
        let host = HostAccessors::new()
            .on_get_field(|_| Ok(json!("US")))
            .on_set_field(|_, _| Ok(()));
        let api = create_sdk(SdkConfig::default(), host);
        let err = runner()
            .run(
                "const c = ui.getField('country');",
                &api,
                &ExecutionContext::default(),
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();
        assert!(err.is_isolate_unavailable());
    }

    #[tokio::test]
    async fn test_context_crosses_the_boundary() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::default(), form.accessors());
        let context = ExecutionContext::default().for_event(tenant_script_core::FormEvent::BeforeSubmit);
        let result = runner()
            .run(
                "if (context.event === 'BeforeSubmit') { ui.toast(context.event); }",
                &api,
                &context,
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(result.success, "{result:?}");
        assert_eq!(form.toasts(), vec!["BeforeSubmit"]);
    }
}
