//! Host-side accessors behind the capability API.
//!
//! [`HostAccessors`] is the explicit table the SDK factory delegates to; a
//! script can never reach host state except through one of these closures.
//! [`FormState`] is an in-memory form that produces such a table, used by
//! the CLI and by tests.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tenant_script_core::Result;

/// Reads a field value.
pub type FieldGetter = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;
/// Writes a field value.
pub type FieldSetter = Arc<dyn Fn(&str, Value) -> Result<()> + Send + Sync>;
/// Receives a selector or message.
pub type Notifier = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;
/// Runs a named operation with a payload.
pub type Operation = Arc<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;
/// Captures the readable fields for an isolate.
pub type Snapshot = Arc<dyn Fn() -> Map<String, Value> + Send + Sync>;

/// Accessor table supplied to [`create_sdk`](crate::sdk::create_sdk).
///
/// Every accessor is optional. A missing reader yields `null`, a missing
/// writer or notifier is a no-op.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::host::HostAccessors;
/// use serde_json::json;
///
/// let host = HostAccessors::new()
///     .on_get_field(|name| Ok(json!(format!("value of {name}"))))
///     .on_toast(|message| {
///         println!("{message}");
///         Ok(())
///     });
/// assert!(host.has_get_field());
/// ```
#[derive(Clone, Default)]
pub struct HostAccessors {
    pub(crate) get_field: Option<FieldGetter>,
    pub(crate) set_field: Option<FieldSetter>,
    pub(crate) show: Option<Notifier>,
    pub(crate) hide: Option<Notifier>,
    pub(crate) toast: Option<Notifier>,
    pub(crate) start_workflow: Option<Operation>,
    pub(crate) repo_call: Option<Operation>,
    pub(crate) snapshot: Option<Snapshot>,
}

impl HostAccessors {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the field reader.
    #[must_use]
    pub fn on_get_field(
        mut self,
        f: impl Fn(&str) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.get_field = Some(Arc::new(f));
        self
    }

    /// Registers the field writer.
    #[must_use]
    pub fn on_set_field(
        mut self,
        f: impl Fn(&str, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.set_field = Some(Arc::new(f));
        self
    }

    /// Registers the `ui.show` handler.
    #[must_use]
    pub fn on_show(mut self, f: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        self.show = Some(Arc::new(f));
        self
    }

    /// Registers the `ui.hide` handler.
    #[must_use]
    pub fn on_hide(mut self, f: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        self.hide = Some(Arc::new(f));
        self
    }

    /// Registers the `ui.toast` handler.
    #[must_use]
    pub fn on_toast(mut self, f: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        self.toast = Some(Arc::new(f));
        self
    }

    /// Registers the `workflow.start` handler.
    #[must_use]
    pub fn on_workflow_start(
        mut self,
        f: impl Fn(&str, Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.start_workflow = Some(Arc::new(f));
        self
    }

    /// Registers the `repo.call` handler.
    #[must_use]
    pub fn on_repo_call(
        mut self,
        f: impl Fn(&str, Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.repo_call = Some(Arc::new(f));
        self
    }

    /// Registers the field snapshot handed to isolates.
    #[must_use]
    pub fn on_snapshot(mut self, f: impl Fn() -> Map<String, Value> + Send + Sync + 'static) -> Self {
        self.snapshot = Some(Arc::new(f));
        self
    }

    /// Returns `true` if a field reader is registered.
    #[must_use]
    pub const fn has_get_field(&self) -> bool {
        self.get_field.is_some()
    }

    /// Returns `true` if a field snapshot is registered.
    #[must_use]
    pub const fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl fmt::Debug for HostAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostAccessors")
            .field("get_field", &self.get_field.is_some())
            .field("set_field", &self.set_field.is_some())
            .field("show", &self.show.is_some())
            .field("hide", &self.hide.is_some())
            .field("toast", &self.toast.is_some())
            .field("start_workflow", &self.start_workflow.is_some())
            .field("repo_call", &self.repo_call.is_some())
            .field("snapshot", &self.snapshot.is_some())
            .finish()
    }
}

/// A call that reached the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum HostCall {
    /// `ui.getField`
    GetField {
        /// Field name
        name: String,
    },
    /// `ui.setField`
    SetField {
        /// Field name
        name: String,
        /// New value
        value: Value,
    },
    /// `ui.show`
    Show {
        /// Target selector
        selector: String,
    },
    /// `ui.hide`
    Hide {
        /// Target selector
        selector: String,
    },
    /// `ui.toast`
    Toast {
        /// Message text
        message: String,
    },
    /// `workflow.start`
    StartWorkflow {
        /// Workflow name
        name: String,
        /// Payload
        payload: Value,
    },
    /// `repo.call`
    RepoCall {
        /// Operation name
        name: String,
        /// Payload
        payload: Value,
    },
}

impl HostCall {
    /// Returns `true` for calls that change host state.
    #[must_use]
    pub const fn is_effect(&self) -> bool {
        !matches!(self, Self::GetField { .. })
    }
}

#[derive(Debug, Default)]
struct FormStateInner {
    fields: Map<String, Value>,
    hidden: BTreeSet<String>,
    toasts: Vec<String>,
    calls: Vec<HostCall>,
}

/// In-memory form that records every call it receives.
///
/// Cloning shares the underlying state.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::host::FormState;
/// use serde_json::json;
///
/// let form = FormState::new().with_field("country", json!("US"));
/// assert_eq!(form.field("country"), Some(json!("US")));
/// assert!(form.calls().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormState {
    inner: Arc<Mutex<FormStateInner>>,
}

impl FormState {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a field value.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>, value: Value) -> Self {
        self.lock().fields.insert(name.into(), value);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FormStateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.lock().fields.get(name).cloned()
    }

    /// All field values.
    #[must_use]
    pub fn fields(&self) -> Map<String, Value> {
        self.lock().fields.clone()
    }

    /// Selectors currently hidden.
    #[must_use]
    pub fn hidden(&self) -> Vec<String> {
        self.lock().hidden.iter().cloned().collect()
    }

    /// Toasts shown so far.
    #[must_use]
    pub fn toasts(&self) -> Vec<String> {
        self.lock().toasts.clone()
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed state, in order.
    #[must_use]
    pub fn effects(&self) -> Vec<HostCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_effect())
            .cloned()
            .collect()
    }

    /// Builds an accessor table backed by this form.
    #[must_use]
    pub fn accessors(&self) -> HostAccessors {
        let get = self.clone();
        let set = self.clone();
        let show = self.clone();
        let hide = self.clone();
        let toast = self.clone();
        let workflow = self.clone();
        let repo = self.clone();
        let snapshot = self.clone();

        HostAccessors::new()
            .on_get_field(move |name| {
                let mut inner = get.lock();
                inner.calls.push(HostCall::GetField {
                    name: name.to_string(),
                });
                Ok(inner.fields.get(name).cloned().unwrap_or(Value::Null))
            })
            .on_set_field(move |name, value| {
                let mut inner = set.lock();
                inner.calls.push(HostCall::SetField {
                    name: name.to_string(),
                    value: value.clone(),
                });
                inner.fields.insert(name.to_string(), value);
                Ok(())
            })
            .on_show(move |selector| {
                let mut inner = show.lock();
                inner.calls.push(HostCall::Show {
                    selector: selector.to_string(),
                });
                inner.hidden.remove(selector);
                Ok(())
            })
            .on_hide(move |selector| {
                let mut inner = hide.lock();
                inner.calls.push(HostCall::Hide {
                    selector: selector.to_string(),
                });
                inner.hidden.insert(selector.to_string());
                Ok(())
            })
            .on_toast(move |message| {
                let mut inner = toast.lock();
                inner.calls.push(HostCall::Toast {
                    message: message.to_string(),
                });
                inner.toasts.push(message.to_string());
                Ok(())
            })
            .on_workflow_start(move |name, payload| {
                workflow.lock().calls.push(HostCall::StartWorkflow {
                    name: name.to_string(),
                    payload,
                });
                Ok(Value::Null)
            })
            .on_repo_call(move |name, payload| {
                repo.lock().calls.push(HostCall::RepoCall {
                    name: name.to_string(),
                    payload,
                });
                Ok(Value::Null)
            })
            .on_snapshot(move || snapshot.lock().fields.clone())
    }
}
