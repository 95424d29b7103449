//! Form sessions.
//!
//! A [`FormSession`] binds one form to its tenant script: it resolves the
//! script body (inline or through a [`ScriptProvider`]), builds a fresh
//! capability object for every lifecycle event and runs the script through
//! a shared [`Dispatcher`].

use crate::dispatcher::Dispatcher;
use crate::host::HostAccessors;
use crate::sdk::{MaskPolicy, SdkConfig, create_sdk};
use std::fmt;
use std::sync::Arc;
use tenant_script_core::traits::ScriptProvider;
use tenant_script_core::{
    ExecutionContext, ExecutionResult, FormEvent, Result, SandboxConfig, ScriptId,
};
use tokio::sync::OnceCell;

/// Where a session's script comes from.
#[derive(Clone)]
pub enum ScriptRef {
    /// Body supplied directly.
    Inline(String),
    /// Body fetched on first use.
    Stored {
        /// Provider to fetch from
        provider: Arc<dyn ScriptProvider>,
        /// Script to fetch
        script_id: ScriptId,
    },
}

impl fmt::Debug for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(body) => f.debug_tuple("Inline").field(&body.len()).finish(),
            Self::Stored { script_id, .. } => {
                f.debug_struct("Stored").field("script_id", script_id).finish()
            }
        }
    }
}

/// Outcome of the before-submit hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitDecision {
    /// Whether the submit may go ahead
    pub proceed: bool,
    /// Whether the script blocked submission
    pub blocked: bool,
    /// Script outcome, absent when the form has no script
    pub result: Option<ExecutionResult>,
}

/// One form bound to its tenant script.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::dispatcher::Dispatcher;
/// use tenant_script_runtime::host::FormState;
/// use tenant_script_runtime::session::{FormSession, ScriptRef};
/// use tenant_script_core::{ExecutionContext, SandboxConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let dispatcher = Arc::new(Dispatcher::from_config(&SandboxConfig::default()));
/// let script = ScriptRef::Inline("if (!ui.getField('email')) { ui.blockSubmit(true); }".into());
/// let session = FormSession::new(dispatcher, script, ExecutionContext::default());
///
/// let form = FormState::new();
/// let decision = session.before_submit(form.accessors()).await.unwrap();
/// assert!(decision.blocked);
/// assert!(!decision.proceed);
/// # }
/// ```
#[derive(Debug)]
pub struct FormSession {
    dispatcher: Arc<Dispatcher>,
    script: ScriptRef,
    body: OnceCell<Option<String>>,
    mask: MaskPolicy,
    context: ExecutionContext,
}

impl FormSession {
    /// Creates a session with no masked fields.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, script: ScriptRef, context: ExecutionContext) -> Self {
        Self {
            dispatcher,
            script,
            body: OnceCell::new(),
            mask: MaskPolicy::new(),
            context,
        }
    }

    /// Creates a session masking the fields listed in `config`.
    #[must_use]
    pub fn from_config(
        dispatcher: Arc<Dispatcher>,
        config: &SandboxConfig,
        script: ScriptRef,
        context: ExecutionContext,
    ) -> Self {
        Self::new(dispatcher, script, context).with_mask(config.mask_fields.iter().cloned().collect())
    }

    /// Replaces the mask policy.
    #[must_use]
    pub fn with_mask(mut self, mask: MaskPolicy) -> Self {
        self.mask = mask;
        self
    }

    /// Context shared by every event of this session.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Resolves the script body, fetching it once if stored remotely.
    ///
    /// A script the provider does not know resolves to `None`.
    ///
    /// # Errors
    ///
    /// Retrieval failures other than a missing script.
    pub async fn script(&self) -> Result<Option<&str>> {
        let body = self
            .body
            .get_or_try_init(|| async {
                match &self.script {
                    ScriptRef::Inline(body) => Ok(Some(body.clone())),
                    ScriptRef::Stored {
                        provider,
                        script_id,
                    } => match provider.fetch(&self.context.tenant_id, script_id).await {
                        Ok(source) => Ok(Some(source.body().to_string())),
                        Err(err) if err.is_not_found() => {
                            tracing::warn!(script = %script_id, "form script not found");
                            Ok(None)
                        }
                        Err(err) => Err(err),
                    },
                }
            })
            .await?;
        Ok(body.as_deref().filter(|body| !body.is_empty()))
    }

    /// Runs the script for `event` with a fresh capability object over `host`.
    ///
    /// Returns `None` when the form has no script, otherwise the outcome and
    /// the final submit flag.
    ///
    /// # Errors
    ///
    /// Retrieval failures; script failures are reported in the result.
    pub async fn on_event(
        &self,
        event: FormEvent,
        host: HostAccessors,
    ) -> Result<Option<(ExecutionResult, bool)>> {
        let Some(script) = self.script().await? else {
            return Ok(None);
        };

        let api = create_sdk(
            SdkConfig {
                mask_fields: self.mask.clone(),
                submit_blocked: false,
            },
            host,
        );
        let context = self.context.for_event(event);
        let result = self.dispatcher.run(script, &api, &context).await;
        if let Some(error) = &result.error {
            tracing::warn!(event = %event, "form script failed: {}", error);
        }
        Ok(Some((result, api.ui.is_submit_blocked())))
    }

    /// Runs the script for [`FormEvent::FormLoad`].
    ///
    /// # Errors
    ///
    /// Retrieval failures.
    pub async fn on_load(&self, host: HostAccessors) -> Result<Option<ExecutionResult>> {
        Ok(self
            .on_event(FormEvent::FormLoad, host)
            .await?
            .map(|(result, _)| result))
    }

    /// Runs the script for [`FormEvent::BeforeSubmit`].
    ///
    /// A failing script does not by itself stop the submit; only the
    /// submit-blocked flag does.
    ///
    /// # Errors
    ///
    /// Retrieval failures.
    pub async fn before_submit(&self, host: HostAccessors) -> Result<SubmitDecision> {
        let decision = match self.on_event(FormEvent::BeforeSubmit, host).await? {
            Some((result, blocked)) => SubmitDecision {
                proceed: !blocked,
                blocked,
                result: Some(result),
            },
            None => SubmitDecision {
                proceed: true,
                blocked: false,
                result: None,
            },
        };
        tracing::debug!(proceed = decision.proceed, "before-submit decision");
        Ok(decision)
    }
}
