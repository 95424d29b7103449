//! Configuration types for the tenant script sandbox.
//!
//! [`SandboxConfig`] controls timeouts, the static deny-list, interpreter
//! limits and which execution strategy the dispatcher installs. It can be
//! built in code or loaded from a TOML file.
//!
//! # Examples
//!
//! ```
//! use tenant_script_core::{ExecutionStrategy, SandboxConfig};
//! use std::time::Duration;
//!
//! let config = SandboxConfig::default();
//! assert_eq!(config.timeout(), Duration::from_millis(2000));
//! assert_eq!(config.strategy, ExecutionStrategy::Isolated);
//!
//! let custom = SandboxConfig::builder()
//!     .timeout_ms(500)
//!     .strategy(ExecutionStrategy::InProcess)
//!     .mask_field("ssn")
//!     .build();
//! assert!(custom.validate().is_ok());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifiers that grant ambient host authority and are rejected by the
/// static gate.
pub const DEFAULT_FORBIDDEN_GLOBALS: &[&str] = &[
    "window",
    "document",
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "eval",
    "Function",
    "process",
    "require",
    "globalThis",
];

/// How the dispatcher executes scripts.
///
/// Chosen once from configuration; there is no environment probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// Run each script in a dedicated isolate worker (recommended).
    #[default]
    Isolated,
    /// Run scripts with the restricted in-process evaluator only.
    InProcess,
}

impl ExecutionStrategy {
    /// Returns the configuration spelling of the strategy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::InProcess => "in-process",
        }
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "isolated" | "isolate" => Ok(Self::Isolated),
            "in-process" | "inprocess" | "in_process" => Ok(Self::InProcess),
            _ => Err(Error::ConfigError {
                message: format!("unknown execution strategy: {s}"),
            }),
        }
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Execution bound for one invocation, in milliseconds.
    ///
    /// Default: 2000
    pub timeout_ms: u64,

    /// Execution strategy installed by the dispatcher.
    ///
    /// Default: isolated
    pub strategy: ExecutionStrategy,

    /// Deny-list scanned by the static gate.
    ///
    /// Default: [`DEFAULT_FORBIDDEN_GLOBALS`]
    pub forbidden_globals: Vec<String>,

    /// Identifiers appended to `forbidden_globals`.
    pub extra_forbidden: Vec<String>,

    /// Interpreter step budget; `None` relies on the timeout alone.
    ///
    /// Default: unset, so a never-settling script reports `Timeout`
    pub max_steps: Option<u64>,

    /// Largest accepted script body in bytes.
    ///
    /// Default: 64 KiB
    pub max_script_bytes: usize,

    /// Deepest accepted expression/statement nesting, also the deepest
    /// array/object value a script may build.
    ///
    /// Default: 64, at most [`Self::MAX_DEPTH_CEILING`]
    pub max_depth: usize,

    /// Number of compiled programs kept in the LRU cache.
    ///
    /// Default: 64
    pub cache_capacity: usize,

    /// Fields scripts may never write.
    pub mask_fields: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            strategy: ExecutionStrategy::default(),
            forbidden_globals: DEFAULT_FORBIDDEN_GLOBALS
                .iter()
                .map(ToString::to_string)
                .collect(),
            extra_forbidden: Vec::new(),
            max_steps: None,
            max_script_bytes: Self::DEFAULT_MAX_SCRIPT_BYTES,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            mask_fields: Vec::new(),
        }
    }
}

impl SandboxConfig {
    /// Default execution timeout: 2 seconds
    pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

    /// Default maximum script size: 64 KiB
    pub const DEFAULT_MAX_SCRIPT_BYTES: usize = 64 * 1024;

    /// Default maximum nesting depth
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// Largest accepted `max_depth`; interpreter recursion is bounded by it
    pub const MAX_DEPTH_CEILING: usize = 256;

    /// Default compiled-program cache capacity
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;

    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Returns the execution timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the effective deny-list: the base list followed by the extras,
    /// without duplicates.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_core::SandboxConfig;
    ///
    /// let config = SandboxConfig::builder().forbid("localStorage").build();
    /// let list = config.deny_list();
    /// assert_eq!(list.first().map(String::as_str), Some("window"));
    /// assert_eq!(list.last().map(String::as_str), Some("localStorage"));
    /// ```
    #[must_use]
    pub fn deny_list(&self) -> Vec<String> {
        let mut list: Vec<String> = Vec::with_capacity(
            self.forbidden_globals.len() + self.extra_forbidden.len(),
        );
        for name in self.forbidden_globals.iter().chain(&self.extra_forbidden) {
            if !list.contains(name) {
                list.push(name.clone());
            }
        }
        list
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if:
    /// - the timeout is zero
    /// - the cache capacity is zero
    /// - the script size or depth limit is zero
    /// - the depth limit is above [`Self::MAX_DEPTH_CEILING`]
    /// - the step budget is set to zero
    /// - a deny-list entry is empty
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(config_error("timeout_ms must be greater than zero"));
        }
        if self.cache_capacity == 0 {
            return Err(config_error("cache_capacity must be greater than zero"));
        }
        if self.max_script_bytes == 0 {
            return Err(config_error("max_script_bytes must be greater than zero"));
        }
        if self.max_depth == 0 {
            return Err(config_error("max_depth must be greater than zero"));
        }
        if self.max_depth > Self::MAX_DEPTH_CEILING {
            return Err(Error::ConfigError {
                message: format!("max_depth must be at most {}", Self::MAX_DEPTH_CEILING),
            });
        }
        if self.max_steps == Some(0) {
            return Err(config_error("max_steps must be greater than zero when set"));
        }
        if self
            .forbidden_globals
            .iter()
            .chain(&self.extra_forbidden)
            .any(|name| name.trim().is_empty())
        {
            return Err(config_error("forbidden identifiers cannot be empty"));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the document is malformed or fails
    /// validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_core::{ExecutionStrategy, SandboxConfig};
    ///
    /// let config = SandboxConfig::from_toml_str(r#"
    ///     timeout_ms = 250
    ///     strategy = "in-process"
    ///     mask_fields = ["ssn"]
    /// "#).unwrap();
    /// assert_eq!(config.timeout_ms, 250);
    /// assert_eq!(config.strategy, ExecutionStrategy::InProcess);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::ConfigError {
            message: format!("invalid sandbox config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded sandbox config");
        Ok(config)
    }

    /// Loads configuration from `path` if given, else from the default
    /// location if that file exists, else returns defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a config file exists but is invalid.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => Self::load(default),
            _ => Ok(Self::default()),
        }
    }

    /// Default config file location: `<config dir>/tenant-script/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tenant-script").join("config.toml"))
    }
}

fn config_error(message: &str) -> Error {
    Error::ConfigError {
        message: message.to_string(),
    }
}

/// Builder for [`SandboxConfig`].
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    config: SandboxConfig,
}

impl SandboxConfigBuilder {
    /// Sets the execution timeout in milliseconds.
    #[must_use]
    pub const fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Sets the execution timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the execution strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Appends an identifier to the deny-list.
    #[must_use]
    pub fn forbid(mut self, name: impl Into<String>) -> Self {
        self.config.extra_forbidden.push(name.into());
        self
    }

    /// Sets the interpreter step budget.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.config.max_steps = Some(steps);
        self
    }

    /// Clears the step budget; only the timeout bounds execution.
    #[must_use]
    pub const fn unlimited_steps(mut self) -> Self {
        self.config.max_steps = None;
        self
    }

    /// Sets the largest accepted script body.
    #[must_use]
    pub const fn max_script_bytes(mut self, bytes: usize) -> Self {
        self.config.max_script_bytes = bytes;
        self
    }

    /// Sets the deepest accepted nesting.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Sets the compiled-program cache capacity.
    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Adds a masked field.
    #[must_use]
    pub fn mask_field(mut self, field: impl Into<String>) -> Self {
        self.config.mask_fields.push(field.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SandboxConfig {
        self.config
    }
}
