//! Strong domain types for the tenant script sandbox.
//!
//! Identifiers are newtypes over `String` so a tenant id can never be passed
//! where a form id is expected. [`ExecutionContext`] and [`ExecutionResult`]
//! are the two values that cross every execution path.
//!
//! # Examples
//!
//! ```
//! use tenant_script_core::{ExecutionContext, FormEvent, FormId, TenantId};
//!
//! let ctx = ExecutionContext::new(FormEvent::FormLoad, FormId::new("customer"), TenantId::new("acme"));
//! assert_eq!(ctx.event, FormEvent::FormLoad);
//! assert!(ctx.record_id.is_none());
//! ```

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns the inner `String`.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Tenant identifier.
    TenantId
);
string_id!(
    /// Form identifier.
    FormId
);
string_id!(
    /// Identifier of the record a form is bound to.
    RecordId
);
string_id!(
    /// Identifier of a persisted tenant script.
    ScriptId
);

/// Form lifecycle event a script is bound to.
///
/// Serialized in `PascalCase` (`"FormLoad"`, `"BeforeSubmit"`, ...) because
/// that is the spelling scripts compare against via `context.event`.
///
/// # Examples
///
/// ```
/// use tenant_script_core::FormEvent;
///
/// let event: FormEvent = "before-submit".parse().unwrap();
/// assert_eq!(event, FormEvent::BeforeSubmit);
/// assert_eq!(event.as_str(), "BeforeSubmit");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormEvent {
    /// The form finished loading.
    #[default]
    FormLoad,
    /// A field value changed.
    FieldChange,
    /// The user requested a submit; scripts may veto it.
    BeforeSubmit,
    /// The submit went through.
    AfterSubmit,
}

impl FormEvent {
    /// Returns the wire spelling of the event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FormLoad => "FormLoad",
            Self::FieldChange => "FieldChange",
            Self::BeforeSubmit => "BeforeSubmit",
            Self::AfterSubmit => "AfterSubmit",
        }
    }
}

impl fmt::Display for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "formload" | "load" => Ok(Self::FormLoad),
            "fieldchange" | "change" => Ok(Self::FieldChange),
            "beforesubmit" => Ok(Self::BeforeSubmit),
            "aftersubmit" => Ok(Self::AfterSubmit),
            _ => Err(Error::argument(format!("unknown form event: {s}"))),
        }
    }
}

/// Read-only context handed to a script as its fourth argument.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Lifecycle event that triggered the script
    pub event: FormEvent,
    /// Form the script runs against
    pub form_id: FormId,
    /// Tenant that owns the form and the script
    pub tenant_id: TenantId,
    /// Record bound to the form, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

impl ExecutionContext {
    /// Creates a context without a bound record.
    #[must_use]
    pub const fn new(event: FormEvent, form_id: FormId, tenant_id: TenantId) -> Self {
        Self {
            event,
            form_id,
            tenant_id,
            record_id: None,
        }
    }

    /// Binds the context to a record.
    #[must_use]
    pub fn with_record(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Returns a copy of this context for another lifecycle event.
    #[must_use]
    pub fn for_event(&self, event: FormEvent) -> Self {
        Self {
            event,
            ..self.clone()
        }
    }
}

impl Default for FormId {
    fn default() -> Self {
        Self::new("")
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new("")
    }
}

/// Uniform pass/fail outcome of one script invocation.
///
/// # Examples
///
/// ```
/// use tenant_script_core::{Error, ExecutionResult};
///
/// let ok = ExecutionResult::ok();
/// assert!(ok.success);
///
/// let failed = ExecutionResult::from_error(&Error::Timeout { timeout_ms: 50 });
/// assert!(!failed.success);
/// assert_eq!(failed.error.as_deref(), Some("Timeout"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the script completed normally
    pub success: bool,
    /// Rendered failure, present only when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful result.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed result carrying `error`.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Converts any sandbox error into a failed result.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self::failure(error.to_string())
    }

    /// Returns `true` if the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error.as_deref() == Some("Timeout")
    }
}

impl From<crate::Result<()>> for ExecutionResult {
    fn from(result: crate::Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::from_error(&err),
        }
    }
}
