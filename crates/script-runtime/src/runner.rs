//! The execution seam shared by every script path.

use crate::sdk::CapabilityApi;
use async_trait::async_trait;
use std::time::Duration;
use tenant_script_core::{ExecutionContext, ExecutionResult, Result};

/// Runs one script invocation against a capability object.
///
/// Script failures of every kind are reported through the returned
/// [`ExecutionResult`]. An `Err` means the runner could not take the
/// invocation at all; [`Error::IsolateUnavailable`] in particular tells the
/// dispatcher to fall through to its next path.
///
/// [`Error::IsolateUnavailable`]: tenant_script_core::Error::IsolateUnavailable
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::runner::ScriptRunner;
/// use tenant_script_runtime::sdk::CapabilityApi;
/// use tenant_script_core::{ExecutionContext, ExecutionResult, Result};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl ScriptRunner for AlwaysOk {
///     async fn run(
///         &self,
///         _script: &str,
///         _api: &CapabilityApi,
///         _context: &ExecutionContext,
///         _timeout: Duration,
///     ) -> Result<ExecutionResult> {
///         Ok(ExecutionResult::ok())
///     }
/// }
/// ```
#[async_trait]
pub trait ScriptRunner: Send + Sync + std::fmt::Debug {
    /// Runs `script` with `api` bound, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Only when the runner cannot accept the invocation.
    async fn run(
        &self,
        script: &str,
        api: &CapabilityApi,
        context: &ExecutionContext,
        timeout: Duration,
    ) -> Result<ExecutionResult>;

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "runner"
    }
}
