//! Check command implementation.
//!
//! Runs the static gate and the compiler over a script without executing it.

use super::common::{ConfigOverrides, read_script, resolve_config};
use crate::formatters;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tenant_script_core::cli::{ExitCode, OutputFormat};
use tenant_script_runtime::compiler::ScriptCompiler;

/// Outcome of one `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Script file that was checked
    pub file: String,
    /// Whether the script would be accepted
    pub valid: bool,
    /// Top-level statements in the accepted program
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<usize>,
    /// Rejection reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks a script file.
///
/// # Errors
///
/// Returns an error for unreadable input or invalid configuration.
pub fn execute(file: &Path, overrides: &ConfigOverrides) -> Result<CheckReport> {
    let config = resolve_config(overrides)?;
    let script = read_script(file)?;
    let compiler = ScriptCompiler::new(&config);

    let report = match compiler.compile(&script) {
        Ok(program) => CheckReport {
            file: file.display().to_string(),
            valid: true,
            statements: Some(program.len()),
            error: None,
        },
        Err(err) => CheckReport {
            file: file.display().to_string(),
            valid: false,
            statements: None,
            error: Some(err.to_string()),
        },
    };
    Ok(report)
}

/// Runs the check command.
///
/// # Errors
///
/// Returns an error for unreadable input, invalid configuration or
/// formatting failures.
pub fn run(file: &Path, overrides: &ConfigOverrides, output_format: OutputFormat) -> Result<ExitCode> {
    let report = execute(file, overrides)?;
    println!("{}", formatters::format_output(&report, output_format)?);
    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::SCRIPT_FAILED
    })
}
