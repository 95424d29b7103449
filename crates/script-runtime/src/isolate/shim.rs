//! Capability shims rebuilt inside an isolate.
//!
//! The shim knows only what the descriptor carried across the boundary. It
//! re-applies argument validation and masking, answers field reads from the
//! snapshot and records every host effect for later replay.

use super::protocol::Effect;
use crate::capability::CapabilitySurface;
use crate::sdk::{CapabilityDescriptor, FIELD_NAME_REQUIRED, MaskPolicy, REPO_NAME_REQUIRED};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tenant_script_core::{Error, Result};

#[derive(Debug, Default)]
struct Recorded {
    fields: Map<String, Value>,
    effects: Vec<Effect>,
}

/// Isolate-side stand-in for the host capability object.
#[derive(Debug)]
pub(crate) struct IsolateShim {
    mask: MaskPolicy,
    submit_blocked: AtomicBool,
    recorded: Mutex<Recorded>,
}

impl IsolateShim {
    pub(crate) fn new(descriptor: CapabilityDescriptor) -> Self {
        Self {
            mask: descriptor.mask_fields,
            submit_blocked: AtomicBool::new(descriptor.submit_blocked),
            recorded: Mutex::new(Recorded {
                fields: descriptor.fields,
                effects: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, effect: Effect) {
        self.lock().effects.push(effect);
    }

    /// Consumes the shim, returning recorded effects and the final flag.
    pub(crate) fn finish(self) -> (Vec<Effect>, bool) {
        let submit_blocked = self.submit_blocked.load(Ordering::SeqCst);
        let recorded = self
            .recorded
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (recorded.effects, submit_blocked)
    }
}

impl CapabilitySurface for IsolateShim {
    fn get_field(&self, name: &str) -> Result<Value> {
        if name.is_empty() {
            return Err(Error::argument(FIELD_NAME_REQUIRED));
        }
        Ok(self.lock().fields.get(name).cloned().unwrap_or(Value::Null))
    }

    fn set_field(&self, name: &str, value: Value) -> Result<()> {
        if name.is_empty() {
            return Err(Error::argument(FIELD_NAME_REQUIRED));
        }
        if self.mask.is_masked(name) {
            return Err(Error::MaskedFieldViolation {
                field: name.to_string(),
            });
        }
        let mut recorded = self.lock();
        recorded.fields.insert(name.to_string(), value.clone());
        recorded.effects.push(Effect::SetField {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn show(&self, selector: &str) -> Result<()> {
        self.record(Effect::Show {
            selector: selector.to_string(),
        });
        Ok(())
    }

    fn hide(&self, selector: &str) -> Result<()> {
        self.record(Effect::Hide {
            selector: selector.to_string(),
        });
        Ok(())
    }

    fn toast(&self, message: &str) -> Result<()> {
        self.record(Effect::Toast {
            message: message.to_string(),
        });
        Ok(())
    }

    fn block_submit(&self, blocked: bool) -> bool {
        self.submit_blocked.store(blocked, Ordering::SeqCst);
        blocked
    }

    fn is_submit_blocked(&self) -> bool {
        self.submit_blocked.load(Ordering::SeqCst)
    }

    fn start_workflow(&self, name: &str, payload: Value) -> Result<Value> {
        self.record(Effect::StartWorkflow {
            name: name.to_string(),
            payload,
        });
        Ok(Value::Null)
    }

    fn repo_call(&self, name: &str, payload: Value) -> Result<Value> {
        if name.is_empty() {
            return Err(Error::argument(REPO_NAME_REQUIRED));
        }
        self.record(Effect::RepoCall {
            name: name.to_string(),
            payload,
        });
        Ok(Value::Null)
    }
}
