//! Script bodies and their retrieval payloads.
//!
//! The designer backend stores scripts under several historical key
//! spellings (`script`, `Script`, `ScriptBody`, `scriptBody`). All of them
//! are accepted interchangeably.

use crate::{Error, Result, ScriptId, TenantId};
use serde_json::Value;

/// Key spellings under which a retrieval payload may carry the script body,
/// in lookup order.
pub const SCRIPT_BODY_KEYS: &[&str] = &["script", "Script", "ScriptBody", "scriptBody"];

/// Text body of a tenant script.
///
/// Immutable once constructed; one source is shared by reference across
/// the invocations that run it.
///
/// # Examples
///
/// ```
/// use tenant_script_core::{ScriptSource, TenantId};
/// use serde_json::json;
///
/// let payload = json!({ "ScriptBody": "ui.toast('hi');", "tenantId": "acme" });
/// let source = ScriptSource::from_json(&payload, None).unwrap();
/// assert_eq!(source.body(), "ui.toast('hi');");
/// assert_eq!(source.tenant_id(), Some(&TenantId::new("acme")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    body: String,
    tenant_id: Option<TenantId>,
    script_id: Option<ScriptId>,
}

impl ScriptSource {
    /// Creates an inline source with no persisted identity.
    #[must_use]
    pub fn inline(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            tenant_id: None,
            script_id: None,
        }
    }

    /// Attaches the persisted identity of the script.
    #[must_use]
    pub fn with_identity(mut self, tenant_id: TenantId, script_id: ScriptId) -> Self {
        self.tenant_id = Some(tenant_id);
        self.script_id = Some(script_id);
        self
    }

    /// Extracts a source from a retrieval payload.
    ///
    /// The body is taken from the first key in [`SCRIPT_BODY_KEYS`] that holds
    /// a string. The tenant is read from `tenantId`/`TenantId` and falls back
    /// to `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceError`] if the payload is not an object or
    /// carries no string body under any accepted key.
    pub fn from_json(payload: &Value, tenant: Option<&TenantId>) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| Error::SourceError {
            message: "script payload is not a JSON object".to_string(),
            source: None,
        })?;

        let body = SCRIPT_BODY_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .ok_or_else(|| Error::SourceError {
                message: format!(
                    "script payload has no body under any of: {}",
                    SCRIPT_BODY_KEYS.join(", ")
                ),
                source: None,
            })?;

        let tenant_id = ["tenantId", "TenantId"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(TenantId::new)
            .or_else(|| tenant.cloned());

        let script_id = ["scriptId", "ScriptId", "id", "Id"]
            .iter()
            .find_map(|key| match object.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .map(ScriptId::new);

        Ok(Self {
            body: body.to_string(),
            tenant_id,
            script_id,
        })
    }

    /// Returns the script text.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the owning tenant, if known.
    #[must_use]
    pub const fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    /// Returns the persisted script id, if known.
    #[must_use]
    pub const fn script_id(&self) -> Option<&ScriptId> {
        self.script_id.as_ref()
    }
}
