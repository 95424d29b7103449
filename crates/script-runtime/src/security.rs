//! Static gate over raw script text.
//!
//! Before anything is compiled, the script text is scanned for identifiers
//! that would grant ambient host authority. The scan is a plain substring
//! match in deny-list order: it also rejects harmless names that merely
//! contain a forbidden one (`windowTitle`), and it cannot see indirect
//! access. It is a front line only; the isolate is the boundary.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::security::ScriptPolicy;
//! use tenant_script_core::SandboxConfig;
//!
//! let policy = ScriptPolicy::from_config(&SandboxConfig::default());
//! let err = policy.check("window.location = 'x'").unwrap_err();
//! assert_eq!(err.to_string(), "Forbidden global usage: window");
//! assert!(policy.check("ui.toast('hi')").is_ok());
//! ```

use tenant_script_core::{DEFAULT_FORBIDDEN_GLOBALS, Error, Result, SandboxConfig};

/// Deny-list scanned by the static gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPolicy {
    deny_list: Vec<String>,
}

impl ScriptPolicy {
    /// Creates a policy over an explicit deny-list.
    #[must_use]
    pub fn new<S: Into<String>>(deny_list: impl IntoIterator<Item = S>) -> Self {
        Self {
            deny_list: deny_list.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates the policy described by the sandbox configuration.
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            deny_list: config.deny_list(),
        }
    }

    /// The identifiers this policy rejects, in scan order.
    #[must_use]
    pub fn deny_list(&self) -> &[String] {
        &self.deny_list
    }

    /// Returns the first deny-listed identifier found in `script`.
    #[must_use]
    pub fn forbidden_usage(&self, script: &str) -> Option<&str> {
        self.deny_list
            .iter()
            .find(|name| script.contains(name.as_str()))
            .map(String::as_str)
    }

    /// Runs the gate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForbiddenGlobalUsage`] naming the first match.
    pub fn check(&self, script: &str) -> Result<()> {
        match self.forbidden_usage(script) {
            Some(name) => {
                tracing::warn!(identifier = name, "script rejected by static gate");
                Err(Error::ForbiddenGlobalUsage {
                    name: name.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

impl Default for ScriptPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN_GLOBALS.iter().copied())
    }
}
