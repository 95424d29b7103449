//! Capability SDK factory.
//!
//! [`create_sdk`] builds the `ui` / `workflow` / `repo` objects handed to one
//! script invocation. The object owns the per-invocation submit flag and the
//! mask policy; everything else is delegated through the explicit
//! [`HostAccessors`] table.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::host::HostAccessors;
//! use tenant_script_runtime::sdk::{SdkConfig, create_sdk};
//! use serde_json::json;
//!
//! let api = create_sdk(SdkConfig::masking(["ssn"]), HostAccessors::new());
//!
//! let err = api.ui.set_field("ssn", json!("123-45-6789")).unwrap_err();
//! assert_eq!(err.to_string(), "Field is masked");
//!
//! api.ui.block_submit(true);
//! assert!(api.ui.is_submit_blocked());
//! ```

use crate::capability::CapabilitySurface;
use crate::host::HostAccessors;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tenant_script_core::{Error, Result};

/// Error text for a missing field name.
pub const FIELD_NAME_REQUIRED: &str = "field name required";

/// Error text for a missing repo operation name.
pub const REPO_NAME_REQUIRED: &str = "repo call name required";

/// Fields a script may never write.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::sdk::MaskPolicy;
///
/// let policy: MaskPolicy = ["ssn", "salary"].into_iter().collect();
/// assert!(policy.is_masked("ssn"));
/// assert!(!policy.is_masked("email"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskPolicy(BTreeSet<String>);

impl MaskPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if writes to `field` are refused.
    #[must_use]
    pub fn is_masked(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Number of masked fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is masked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masked field names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for MaskPolicy {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Per-invocation SDK settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkConfig {
    /// Fields `ui.setField` refuses
    pub mask_fields: MaskPolicy,
    /// Initial value of the submit-blocked flag
    pub submit_blocked: bool,
}

impl SdkConfig {
    /// Configuration with the given masked fields and an unblocked submit.
    #[must_use]
    pub fn masking<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            mask_fields: fields.into_iter().collect(),
            submit_blocked: false,
        }
    }

    /// Sets the initial submit-blocked flag.
    #[must_use]
    pub const fn with_submit_blocked(mut self, blocked: bool) -> Self {
        self.submit_blocked = blocked;
        self
    }
}

/// Serializable description of a capability object.
///
/// This is what crosses into an isolate: enough to rebuild host-equivalent
/// shims, nothing that reaches back into the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    /// Fields the shim must refuse to write
    pub mask_fields: MaskPolicy,
    /// Submit flag at the start of the run
    pub submit_blocked: bool,
    /// Readable field values at the start of the run
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug)]
struct SdkState {
    mask: MaskPolicy,
    submit_blocked: AtomicBool,
    host: HostAccessors,
}

/// `ui` namespace.
#[derive(Debug, Clone)]
pub struct Ui {
    state: Arc<SdkState>,
}

/// `workflow` namespace.
#[derive(Debug, Clone)]
pub struct Workflow {
    state: Arc<SdkState>,
}

/// `repo` namespace.
#[derive(Debug, Clone)]
pub struct Repo {
    state: Arc<SdkState>,
}

/// The capability object one script invocation receives.
///
/// Clones share the same per-invocation state; build a fresh one with
/// [`create_sdk`] for every invocation.
#[derive(Debug, Clone)]
pub struct CapabilityApi {
    /// Form access
    pub ui: Ui,
    /// Workflow launching
    pub workflow: Workflow,
    /// Host operations
    pub repo: Repo,
    state: Arc<SdkState>,
}

/// Builds a capability object over `host`.
#[must_use]
pub fn create_sdk(config: SdkConfig, host: HostAccessors) -> CapabilityApi {
    let state = Arc::new(SdkState {
        mask: config.mask_fields,
        submit_blocked: AtomicBool::new(config.submit_blocked),
        host,
    });
    tracing::trace!(masked = state.mask.len(), "capability object created");
    CapabilityApi {
        ui: Ui {
            state: Arc::clone(&state),
        },
        workflow: Workflow {
            state: Arc::clone(&state),
        },
        repo: Repo {
            state: Arc::clone(&state),
        },
        state,
    }
}

impl CapabilityApi {
    /// Describes this object for an isolate.
    #[must_use]
    pub fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            mask_fields: self.state.mask.clone(),
            submit_blocked: self.ui.is_submit_blocked(),
            fields: self
                .state
                .host
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot())
                .unwrap_or_default(),
        }
    }

    /// Returns `false` when the host reads fields but offers no snapshot.
    ///
    /// An isolate only sees fields through the snapshot, so such a host
    /// cannot be mirrored faithfully.
    #[must_use]
    pub fn can_describe(&self) -> bool {
        !self.state.host.has_get_field() || self.state.host.has_snapshot()
    }

    /// The mask policy this object enforces.
    #[must_use]
    pub fn mask_policy(&self) -> &MaskPolicy {
        &self.state.mask
    }
}

impl Ui {
    /// Reads a field through the host.
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] for an empty name; host failures.
    pub fn get_field(&self, name: &str) -> Result<Value> {
        if name.is_empty() {
            return Err(Error::argument(FIELD_NAME_REQUIRED));
        }
        match &self.state.host.get_field {
            Some(get) => get(name),
            None => Ok(Value::Null),
        }
    }

    /// Writes a field through the host unless it is masked.
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] for an empty name,
    /// [`Error::MaskedFieldViolation`] for a masked field; host failures.
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        if name.is_empty() {
            return Err(Error::argument(FIELD_NAME_REQUIRED));
        }
        if self.state.mask.is_masked(name) {
            tracing::warn!(field = name, "refused write to masked field");
            return Err(Error::MaskedFieldViolation {
                field: name.to_string(),
            });
        }
        tracing::debug!(field = name, "setField");
        match &self.state.host.set_field {
            Some(set) => set(name, value),
            None => Ok(()),
        }
    }

    /// Shows the element matching `selector`.
    ///
    /// # Errors
    ///
    /// Host failures.
    pub fn show(&self, selector: &str) -> Result<()> {
        self.state.host.show.as_ref().map_or(Ok(()), |show| show(selector))
    }

    /// Hides the element matching `selector`.
    ///
    /// # Errors
    ///
    /// Host failures.
    pub fn hide(&self, selector: &str) -> Result<()> {
        self.state.host.hide.as_ref().map_or(Ok(()), |hide| hide(selector))
    }

    /// Shows a toast message.
    ///
    /// # Errors
    ///
    /// Host failures.
    pub fn toast(&self, message: &str) -> Result<()> {
        self.state.host.toast.as_ref().map_or(Ok(()), |toast| toast(message))
    }

    /// Sets the submit-blocked flag and returns it.
    pub fn block_submit(&self, blocked: bool) -> bool {
        self.state.submit_blocked.store(blocked, Ordering::SeqCst);
        blocked
    }

    /// Reads the submit-blocked flag.
    #[must_use]
    pub fn is_submit_blocked(&self) -> bool {
        self.state.submit_blocked.load(Ordering::SeqCst)
    }
}

impl Workflow {
    /// Starts a named workflow.
    ///
    /// # Errors
    ///
    /// Host failures.
    pub fn start(&self, name: &str, payload: Value) -> Result<Value> {
        tracing::debug!(workflow = name, "workflow.start");
        self.state
            .host
            .start_workflow
            .as_ref()
            .map_or(Ok(Value::Null), |start| start(name, payload))
    }
}

impl Repo {
    /// Invokes a named host operation.
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] for an empty name; host failures.
    pub fn call(&self, name: &str, payload: Value) -> Result<Value> {
        if name.is_empty() {
            return Err(Error::argument(REPO_NAME_REQUIRED));
        }
        tracing::debug!(operation = name, "repo.call");
        self.state
            .host
            .repo_call
            .as_ref()
            .map_or(Ok(Value::Null), |call| call(name, payload))
    }
}

impl CapabilitySurface for CapabilityApi {
    fn get_field(&self, name: &str) -> Result<Value> {
        self.ui.get_field(name)
    }

    fn set_field(&self, name: &str, value: Value) -> Result<()> {
        self.ui.set_field(name, value)
    }

    fn show(&self, selector: &str) -> Result<()> {
        self.ui.show(selector)
    }

    fn hide(&self, selector: &str) -> Result<()> {
        self.ui.hide(selector)
    }

    fn toast(&self, message: &str) -> Result<()> {
        self.ui.toast(message)
    }

    fn block_submit(&self, blocked: bool) -> bool {
        self.ui.block_submit(blocked)
    }

    fn is_submit_blocked(&self) -> bool {
        self.ui.is_submit_blocked()
    }

    fn start_workflow(&self, name: &str, payload: Value) -> Result<Value> {
        self.workflow.start(name, payload)
    }

    fn repo_call(&self, name: &str, payload: Value) -> Result<Value> {
        self.repo.call(name, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FormState, HostCall};
    use serde_json::json;

    #[test]
    fn test_masked_write_never_reaches_host() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::masking(["ssn"]), form.accessors());

        let err = api.ui.set_field("ssn", json!("123-45-6789")).unwrap_err();
        assert!(err.is_masked_field());
        assert!(form.calls().is_empty());
        assert_eq!(form.field("ssn"), None);
    }

    #[test]
    fn test_empty_names_rejected() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::default(), form.accessors());

        assert_eq!(
            api.ui.get_field("").unwrap_err().to_string(),
            FIELD_NAME_REQUIRED
        );
        assert_eq!(
            api.ui.set_field("", json!(1)).unwrap_err().to_string(),
            FIELD_NAME_REQUIRED
        );
        assert_eq!(
            api.repo.call("", json!({})).unwrap_err().to_string(),
            REPO_NAME_REQUIRED
        );
        assert!(form.calls().is_empty());
    }

    #[test]
    fn test_empty_field_name_checked_before_mask() {
        let api = create_sdk(SdkConfig::masking([""]), HostAccessors::new());
        assert!(api.ui.set_field("", json!(1)).unwrap_err().is_argument_error());
    }

    #[test]
    fn test_submit_flag_without_host() {
        let api = create_sdk(SdkConfig::default().with_submit_blocked(true), HostAccessors::new());
        assert!(api.ui.is_submit_blocked());
        api.ui.block_submit(false);
        assert!(!api.ui.is_submit_blocked());
    }

    #[test]
    fn test_absent_accessors_are_inert() {
        let api = create_sdk(SdkConfig::default(), HostAccessors::new());
        assert_eq!(api.ui.get_field("x").unwrap(), Value::Null);
        api.ui.set_field("x", json!(1)).unwrap();
        api.ui.toast("hello").unwrap();
        assert_eq!(api.workflow.start("w", json!(null)).unwrap(), Value::Null);
        assert_eq!(api.repo.call("r", json!(null)).unwrap(), Value::Null);
    }

    #[test]
    fn test_delegation_order() {
        let form = FormState::new();
        let api = create_sdk(SdkConfig::default(), form.accessors());
        api.ui.set_field("a", json!(1)).unwrap();
        api.ui.toast("t").unwrap();
        api.workflow.start("onboard", json!({"id": 1})).unwrap();

        assert_eq!(
            form.calls(),
            vec![
                HostCall::SetField {
                    name: "a".to_string(),
                    value: json!(1)
                },
                HostCall::Toast {
                    message: "t".to_string()
                },
                HostCall::StartWorkflow {
                    name: "onboard".to_string(),
                    payload: json!({"id": 1})
                },
            ]
        );
    }

    #[test]
    fn test_fresh_objects_do_not_share_state() {
        let first = create_sdk(SdkConfig::default(), HostAccessors::new());
        let second = create_sdk(SdkConfig::default(), HostAccessors::new());
        first.ui.block_submit(true);
        assert!(!second.ui.is_submit_blocked());

        let clone = first.clone();
        assert!(clone.ui.is_submit_blocked());
    }

    #[test]
    fn test_describe() {
        let form = FormState::new().with_field("email", json!("a@b.c"));
        let api = create_sdk(SdkConfig::masking(["ssn"]), form.accessors());
        api.ui.block_submit(true);

        let descriptor = api.describe();
        assert!(descriptor.submit_blocked);
        assert!(descriptor.mask_fields.is_masked("ssn"));
        assert_eq!(descriptor.fields["email"], json!("a@b.c"));

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["maskFields"], json!(["ssn"]));
        assert_eq!(json["submitBlocked"], json!(true));
    }

    #[test]
    fn test_can_describe_needs_snapshot_for_readers() {
        let form = FormState::new();
        assert!(create_sdk(SdkConfig::default(), form.accessors()).can_describe());
        assert!(create_sdk(SdkConfig::default(), HostAccessors::new()).can_describe());

        let reader_only = HostAccessors::new().on_get_field(|_| Ok(json!(null)));
        assert!(!create_sdk(SdkConfig::default(), reader_only).can_describe());
    }
}
