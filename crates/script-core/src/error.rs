//! Error types for the tenant script sandbox.
//!
//! Every failure a script can cause is one variant of [`Error`]. The
//! script-facing variants render exactly the text that ends up in an
//! [`ExecutionResult`](crate::ExecutionResult), so callers and tests can match
//! on stable strings such as `"Field is masked"` or `"Timeout"`.
//!
//! # Examples
//!
//! ```
//! use tenant_script_core::{Error, Result};
//!
//! fn require_name(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(Error::ArgumentError {
//!             message: "field name required".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = require_name("").unwrap_err();
//! assert!(err.is_argument_error());
//! assert_eq!(err.to_string(), "field name required");
//! ```

use thiserror::Error;

/// Main error type for the tenant script sandbox.
#[derive(Error, Debug)]
pub enum Error {
    /// A capability was called with invalid arguments.
    ///
    /// Raised by `ui.getField("")`, `ui.setField("", ..)` and
    /// `repo.call("", ..)`.
    #[error("{message}")]
    ArgumentError {
        /// Human readable description of the bad argument
        message: String,
    },

    /// The static gate found a forbidden identifier in the script text.
    #[error("Forbidden global usage: {name}")]
    ForbiddenGlobalUsage {
        /// The deny-listed identifier that matched
        name: String,
    },

    /// The script could not be compiled into the expected program shape.
    #[error("Compilation error: {details}")]
    CompilationError {
        /// Parser diagnostic, including line and column
        details: String,
    },

    /// The script tried to write a field covered by the mask policy.
    ///
    /// The display text is fixed; the field name is kept for logging only.
    #[error("Field is masked")]
    MaskedFieldViolation {
        /// Name of the masked field
        field: String,
    },

    /// The script threw, or a runtime fault occurred while evaluating it.
    ///
    /// `message` is already rendered the way `String(error)` would render it,
    /// e.g. `Error: boom` or `ReferenceError: x is not defined`.
    #[error("{message}")]
    RuntimeError {
        /// Rendered error value
        message: String,
    },

    /// Execution did not settle within the caller-supplied bound.
    #[error("Timeout")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// A host accessor reported a failure.
    #[error("{message}")]
    HostError {
        /// Message supplied by the host
        message: String,
    },

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// The script provider has no script under the requested id.
    #[error("Script not found: {script_id} (tenant {tenant_id})")]
    ScriptNotFound {
        /// Tenant that owns the script
        tenant_id: String,
        /// Requested script id
        script_id: String,
    },

    /// Retrieving a script body failed.
    #[error("Script retrieval failed: {message}")]
    SourceError {
        /// Description of the retrieval failure
        message: String,
        /// Underlying error cause
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The isolated runner could not be started or lost its worker.
    ///
    /// The dispatcher treats this as "runner unavailable" and falls through
    /// to the next execution path.
    #[error("Isolate unavailable: {message}")]
    IsolateUnavailable {
        /// Description of the failure
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization failure
        message: String,
        /// Underlying serde error
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl Error {
    /// Creates an [`Error::ArgumentError`].
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::ArgumentError {
            message: message.into(),
        }
    }

    /// Creates an [`Error::RuntimeError`] from a rendered message.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::RuntimeError {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an argument error.
    #[must_use]
    pub const fn is_argument_error(&self) -> bool {
        matches!(self, Self::ArgumentError { .. })
    }

    /// Returns `true` if the static gate rejected the script.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_core::Error;
    ///
    /// let err = Error::ForbiddenGlobalUsage { name: "window".to_string() };
    /// assert!(err.is_forbidden_global());
    /// assert_eq!(err.to_string(), "Forbidden global usage: window");
    /// ```
    #[must_use]
    pub const fn is_forbidden_global(&self) -> bool {
        matches!(self, Self::ForbiddenGlobalUsage { .. })
    }

    /// Returns `true` if this is a compilation error.
    #[must_use]
    pub const fn is_compilation_error(&self) -> bool {
        matches!(self, Self::CompilationError { .. })
    }

    /// Returns `true` if a masked field write was refused.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_core::Error;
    ///
    /// let err = Error::MaskedFieldViolation { field: "ssn".to_string() };
    /// assert!(err.is_masked_field());
    /// assert_eq!(err.to_string(), "Field is masked");
    /// ```
    #[must_use]
    pub const fn is_masked_field(&self) -> bool {
        matches!(self, Self::MaskedFieldViolation { .. })
    }

    /// Returns `true` if this is a script runtime error.
    #[must_use]
    pub const fn is_runtime_error(&self) -> bool {
        matches!(self, Self::RuntimeError { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` if the requested script does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ScriptNotFound { .. })
    }

    /// Returns `true` if the isolated runner is unavailable.
    #[must_use]
    pub const fn is_isolate_unavailable(&self) -> bool {
        matches!(self, Self::IsolateUnavailable { .. })
    }

    /// Returns `true` for the errors a script itself can provoke.
    ///
    /// These are the variants that are converted into a failed
    /// [`ExecutionResult`](crate::ExecutionResult) rather than propagated.
    #[must_use]
    pub const fn is_script_failure(&self) -> bool {
        matches!(
            self,
            Self::ArgumentError { .. }
                | Self::ForbiddenGlobalUsage { .. }
                | Self::CompilationError { .. }
                | Self::MaskedFieldViolation { .. }
                | Self::RuntimeError { .. }
                | Self::Timeout { .. }
                | Self::HostError { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;
