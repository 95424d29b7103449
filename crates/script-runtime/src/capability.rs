//! The capability surface scripts call into.
//!
//! A script sees three namespaces, `ui`, `workflow` and `repo`. Both the
//! host-side [`CapabilityApi`](crate::sdk::CapabilityApi) and the shim rebuilt
//! inside an isolate implement [`CapabilitySurface`]; the interpreter only
//! ever talks to that trait through [`invoke`].

use serde_json::Value;
use std::fmt;
use tenant_script_core::{Error, Result};

/// One of the three capability namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Form field access, visibility, toasts and the submit flag
    Ui,
    /// Workflow launching
    Workflow,
    /// Named host operations
    Repo,
}

impl Namespace {
    /// All namespaces, in parameter order.
    pub const ALL: [Self; 3] = [Self::Ui, Self::Workflow, Self::Repo];

    /// Script-visible name of the namespace.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Workflow => "workflow",
            Self::Repo => "repo",
        }
    }

    /// Methods callable on the namespace.
    #[must_use]
    pub const fn methods(&self) -> &'static [&'static str] {
        match self {
            Self::Ui => &[
                "getField",
                "setField",
                "show",
                "hide",
                "toast",
                "blockSubmit",
                "isSubmitBlocked",
            ],
            Self::Workflow => &["start"],
            Self::Repo => &["call"],
        }
    }

    /// Returns `true` if `method` exists on this namespace.
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods().contains(&method)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations behind the `ui`, `workflow` and `repo` namespaces.
///
/// Implementations validate their arguments and enforce the mask policy
/// themselves; callers never bypass them.
pub trait CapabilitySurface: Send + Sync {
    /// `ui.getField(name)`
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] when `name` is empty.
    fn get_field(&self, name: &str) -> Result<Value>;

    /// `ui.setField(name, value)`
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] when `name` is empty,
    /// [`Error::MaskedFieldViolation`] when `name` is masked.
    fn set_field(&self, name: &str, value: Value) -> Result<()>;

    /// `ui.show(selector)`
    ///
    /// # Errors
    ///
    /// Propagates host failures.
    fn show(&self, selector: &str) -> Result<()>;

    /// `ui.hide(selector)`
    ///
    /// # Errors
    ///
    /// Propagates host failures.
    fn hide(&self, selector: &str) -> Result<()>;

    /// `ui.toast(message)`
    ///
    /// # Errors
    ///
    /// Propagates host failures.
    fn toast(&self, message: &str) -> Result<()>;

    /// `ui.blockSubmit(flag)`; returns the new flag.
    fn block_submit(&self, blocked: bool) -> bool;

    /// `ui.isSubmitBlocked()`
    fn is_submit_blocked(&self) -> bool;

    /// `workflow.start(name, payload)`
    ///
    /// # Errors
    ///
    /// Propagates host failures.
    fn start_workflow(&self, name: &str, payload: Value) -> Result<Value>;

    /// `repo.call(name, payload)`
    ///
    /// # Errors
    ///
    /// [`Error::ArgumentError`] when `name` is empty.
    fn repo_call(&self, name: &str, payload: Value) -> Result<Value>;
}

/// Dispatches a script call `ns.method(args...)` onto `surface`.
///
/// Name arguments that are falsy (`undefined`, `null`, `false`, `0`, `""`)
/// are passed as the empty string so the surface reports the argument
/// error. Missing payloads are `null`.
///
/// # Errors
///
/// Whatever the surface reports, or a `TypeError` for unknown methods.
pub fn invoke(
    surface: &dyn CapabilitySurface,
    namespace: Namespace,
    method: &str,
    args: &[Value],
) -> Result<Value> {
    let arg = |index: usize| args.get(index).cloned().unwrap_or(Value::Null);
    let name = || name_arg(args.first());

    match (namespace, method) {
        (Namespace::Ui, "getField") => surface.get_field(&name()),
        (Namespace::Ui, "setField") => surface.set_field(&name(), arg(1)).map(|()| Value::Null),
        (Namespace::Ui, "show") => surface.show(&text_arg(args.first())).map(|()| Value::Null),
        (Namespace::Ui, "hide") => surface.hide(&text_arg(args.first())).map(|()| Value::Null),
        (Namespace::Ui, "toast") => surface.toast(&text_arg(args.first())).map(|()| Value::Null),
        (Namespace::Ui, "blockSubmit") => {
            surface.block_submit(args.first().is_some_and(json_truthy));
            Ok(Value::Null)
        }
        (Namespace::Ui, "isSubmitBlocked") => Ok(Value::Bool(surface.is_submit_blocked())),
        (Namespace::Workflow, "start") => surface.start_workflow(&name(), arg(1)),
        (Namespace::Repo, "call") => surface.repo_call(&name(), arg(1)),
        _ => Err(Error::runtime(format!(
            "TypeError: {namespace}.{method} is not a function"
        ))),
    }
}

/// JavaScript truthiness of a JSON value.
#[must_use]
pub fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn name_arg(value: Option<&Value>) -> String {
    match value {
        Some(v) if json_truthy(v) => text_arg(Some(v)),
        _ => String::new(),
    }
}

fn text_arg(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_f64()
            .map_or_else(|| n.to_string(), crate::interp::number_to_string),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text_arg(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        blocked: AtomicBool,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl CapabilitySurface for Recorder {
        fn get_field(&self, name: &str) -> Result<Value> {
            if name.is_empty() {
                return Err(Error::argument("field name required"));
            }
            self.push(format!("get:{name}"));
            Ok(json!("value"))
        }
        fn set_field(&self, name: &str, value: Value) -> Result<()> {
            self.push(format!("set:{name}={value}"));
            Ok(())
        }
        fn show(&self, selector: &str) -> Result<()> {
            self.push(format!("show:{selector}"));
            Ok(())
        }
        fn hide(&self, selector: &str) -> Result<()> {
            self.push(format!("hide:{selector}"));
            Ok(())
        }
        fn toast(&self, message: &str) -> Result<()> {
            self.push(format!("toast:{message}"));
            Ok(())
        }
        fn block_submit(&self, blocked: bool) -> bool {
            self.blocked.store(blocked, Ordering::SeqCst);
            blocked
        }
        fn is_submit_blocked(&self) -> bool {
            self.blocked.load(Ordering::SeqCst)
        }
        fn start_workflow(&self, name: &str, payload: Value) -> Result<Value> {
            self.push(format!("workflow:{name}:{payload}"));
            Ok(json!({"started": true}))
        }
        fn repo_call(&self, name: &str, payload: Value) -> Result<Value> {
            self.push(format!("repo:{name}:{payload}"));
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_namespace_methods() {
        assert!(Namespace::Ui.has_method("setField"));
        assert!(!Namespace::Ui.has_method("start"));
        assert!(Namespace::Workflow.has_method("start"));
        assert!(Namespace::Repo.has_method("call"));
        assert_eq!(Namespace::Repo.to_string(), "repo");
    }

    #[test]
    fn test_invoke_routes_calls() {
        let recorder = Recorder::default();
        invoke(&recorder, Namespace::Ui, "setField", &[json!("country"), json!("US")]).unwrap();
        invoke(&recorder, Namespace::Ui, "toast", &[json!(42)]).unwrap();
        let started = invoke(&recorder, Namespace::Workflow, "start", &[json!("onboard")]).unwrap();
        assert_eq!(started, json!({"started": true}));

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["set:country=\"US\"", "toast:42", "workflow:onboard:null"]
        );
    }

    #[test]
    fn test_block_submit_uses_truthiness() {
        let recorder = Recorder::default();
        invoke(&recorder, Namespace::Ui, "blockSubmit", &[json!("yes")]).unwrap();
        assert_eq!(
            invoke(&recorder, Namespace::Ui, "isSubmitBlocked", &[]).unwrap(),
            json!(true)
        );
        invoke(&recorder, Namespace::Ui, "blockSubmit", &[json!(0)]).unwrap();
        assert!(!recorder.is_submit_blocked());
        invoke(&recorder, Namespace::Ui, "blockSubmit", &[]).unwrap();
        assert!(!recorder.is_submit_blocked());
    }

    #[test]
    fn test_falsy_name_becomes_empty() {
        let recorder = Recorder::default();
        let err = invoke(&recorder, Namespace::Ui, "getField", &[json!(null)]).unwrap_err();
        assert!(err.is_argument_error());
        let err = invoke(&recorder, Namespace::Ui, "getField", &[]).unwrap_err();
        assert!(err.is_argument_error());
    }

    #[test]
    fn test_unknown_method() {
        let recorder = Recorder::default();
        let err = invoke(&recorder, Namespace::Ui, "eval", &[]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: ui.eval is not a function");
    }
}
