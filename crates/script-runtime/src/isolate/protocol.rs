//! Messages exchanged with an isolate.
//!
//! Every message crosses the boundary as a JSON string. The isolate first
//! announces `{"type":"ready"}`, receives exactly one [`IsolateRequest`] and
//! answers with exactly one `{"type":"result", ...}`.

use crate::sdk::{CapabilityApi, CapabilityDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tenant_script_core::{ExecutionContext, ExecutionResult, Result};

/// Host → isolate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolateRequest {
    /// Script body
    pub script: String,
    /// Capability object description
    pub api: CapabilityDescriptor,
    /// Invocation context
    pub context: ExecutionContext,
}

/// Isolate → host message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IsolateMessage {
    /// The isolate is listening for its request.
    Ready,
    /// The run settled.
    Result {
        /// Whether the script completed normally
        success: bool,
        /// Rendered failure
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Host effects requested by the script, in call order
        #[serde(default)]
        effects: Vec<Effect>,
        /// Submit flag when the run settled
        #[serde(rename = "submitBlocked", default)]
        submit_blocked: bool,
    },
}

impl IsolateMessage {
    /// Builds the result message for a settled run.
    #[must_use]
    pub fn settled(result: ExecutionResult, effects: Vec<Effect>, submit_blocked: bool) -> Self {
        Self::Result {
            success: result.success,
            error: result.error,
            effects,
            submit_blocked,
        }
    }
}

/// A host effect recorded by the shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Effect {
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

impl Effect {
    /// Replays this effect through the real capability object.
    ///
    /// # Errors
    ///
    /// Whatever the capability object or its host reports.
    pub fn apply(self, api: &CapabilityApi) -> Result<()> {
        match self {
            Self::SetField { name, value } => api.ui.set_field(&name, value),
            Self::Show { selector } => api.ui.show(&selector),
            Self::Hide { selector } => api.ui.hide(&selector),
            Self::Toast { message } => api.ui.toast(&message),
            Self::StartWorkflow { name, payload } => api.workflow.start(&name, payload).map(drop),
            Self::RepoCall { name, payload } => api.repo.call(&name, payload).map(drop),
        }
    }
}
