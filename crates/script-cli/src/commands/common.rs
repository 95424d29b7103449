//! Common utilities shared across CLI commands.
//!
//! Provides config resolution, script loading and `name=value` parsing.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tenant_script_core::{ExecutionStrategy, SandboxConfig};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Timeout override in milliseconds
    pub timeout_ms: Option<u64>,
    /// Strategy override
    pub strategy: Option<ExecutionStrategy>,
    /// Extra masked fields
    pub mask: Vec<String>,
}

/// Loads the sandbox configuration and applies overrides.
///
/// Without `--config` the default location is used when it exists.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the result is invalid.
///
/// # Examples
///
/// ```
/// use tenant_script_cli::commands::common::{ConfigOverrides, resolve_config};
///
/// let config = resolve_config(&ConfigOverrides {
///     timeout_ms: Some(250),
///     mask: vec!["ssn".to_string()],
///     ..ConfigOverrides::default()
/// })
/// .unwrap();
/// assert_eq!(config.timeout_ms, 250);
/// assert!(config.mask_fields.contains(&"ssn".to_string()));
/// ```
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<SandboxConfig> {
    let mut config = match &overrides.config {
        Some(path) => SandboxConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SandboxConfig::load_or_default(None).context("failed to load default config")?,
    };

    if let Some(timeout_ms) = overrides.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy;
    }
    for field in &overrides.mask {
        if !config.mask_fields.contains(field) {
            config.mask_fields.push(field.clone());
        }
    }

    config.validate().context("invalid sandbox configuration")?;
    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}

/// Reads a script file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))
}

/// Parses `name=value` into a field seed.
///
/// The value is read as JSON when it parses, otherwise as a plain string.
///
/// # Errors
///
/// Returns an error if there is no `=` or the name is empty.
///
/// # Examples
///
/// ```
/// use tenant_script_cli::commands::common::parse_field;
/// use serde_json::json;
///
/// assert_eq!(parse_field("age=42").unwrap(), ("age".to_string(), json!(42)));
/// assert_eq!(parse_field("country=US").unwrap(), ("country".to_string(), json!("US")));
/// assert!(parse_field("novalue").is_err());
/// ```
pub fn parse_field(pair: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = pair.split_once('=') else {
        bail!("invalid field '{pair}': expected name=value");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid field '{pair}': empty name");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_field_variants() {
        assert_eq!(parse_field("ok=true").unwrap().1, json!(true));
        assert_eq!(parse_field("tags=[\"a\"]").unwrap().1, json!(["a"]));
        assert_eq!(parse_field("note=a=b").unwrap(), ("note".to_string(), json!("a=b")));
        assert_eq!(parse_field("empty=").unwrap().1, json!(""));
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn test_resolve_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms = 900\nmask_fields = [\"ssn\"]").unwrap();

        let config = resolve_config(&ConfigOverrides {
            config: Some(file.path().to_path_buf()),
            strategy: Some(ExecutionStrategy::InProcess),
            mask: vec!["ssn".to_string(), "salary".to_string()],
            ..ConfigOverrides::default()
        })
        .unwrap();

        assert_eq!(config.timeout_ms, 900);
        assert_eq!(config.strategy, ExecutionStrategy::InProcess);
        assert_eq!(config.mask_fields, vec!["ssn", "salary"]);
    }

    #[test]
    fn test_resolve_config_rejects_zero_timeout() {
        let err = resolve_config(&ConfigOverrides {
            timeout_ms: Some(0),
            ..ConfigOverrides::default()
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid sandbox configuration"));
    }

    #[test]
    fn test_read_script_missing_file() {
        let err = read_script(Path::new("/definitely/not/here.js")).unwrap_err();
        assert!(err.to_string().contains("failed to read script"));
    }
}
