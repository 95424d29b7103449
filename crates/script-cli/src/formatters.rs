//! Output formatters for CLI commands.
//!
//! Every command report goes through [`format_output`], so `--format` behaves
//! the same for `run` and `check`.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tenant_script_core::cli::OutputFormat;

/// Formats a report according to the requested output format.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized.
///
/// # Examples
///
/// ```
/// use tenant_script_cli::formatters::format_output;
/// use tenant_script_core::cli::OutputFormat;
/// use tenant_script_core::ExecutionResult;
///
/// let output = format_output(&ExecutionResult::ok(), OutputFormat::Json)?;
/// assert!(output.contains("\"success\": true"));
///
/// let output = format_output(&ExecutionResult::failure("Timeout"), OutputFormat::Text)?;
/// assert_eq!(output, "success=false\nerror=Timeout");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::format(data),
        OutputFormat::Text => text::format(data),
        OutputFormat::Pretty => pretty::format(data),
    }
}

/// JSON output formatting.
pub mod json {
    use super::{Result, Serialize};

    /// Formats data as indented JSON.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Formats data as single-line JSON.
    pub fn format_compact<T: Serialize>(data: &T) -> Result<String> {
        Ok(serde_json::to_string(data)?)
    }
}

/// Plain text output formatting.
///
/// Objects become one `key=value` line per entry. Strings are written raw,
/// nested values as compact JSON.
pub mod text {
    use super::{Result, Serialize, json};
    use serde_json::Value;

    /// Formats data as `key=value` lines.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let Value::Object(entries) = value else {
            return json::format_compact(&value);
        };

        let lines = entries
            .iter()
            .map(|(key, value)| format!("{key}={}", scalar(value)))
            .collect::<Vec<_>>();
        Ok(lines.join("\n"))
    }

    fn scalar(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Pretty (human-readable) output formatting.
pub mod pretty {
    use super::{Colorize, Result, Serialize};
    use serde_json::Value;
    use tenant_script_core::ExecutionResult;

    /// Formats data as colorized, indented output.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        Ok(format_value(&value, 0))
    }

    /// One-line summary of a script outcome.
    #[must_use]
    pub fn status_line(result: &ExecutionResult, elapsed_ms: u64) -> String {
        let timing = format!("({elapsed_ms} ms)").dimmed();
        match result.error.as_deref() {
            None if result.success => format!("{} script completed {timing}", "✓".green().bold()),
            error => format!(
                "{} script failed: {} {timing}",
                "✗".red().bold(),
                error.unwrap_or("unknown error").red()
            ),
        }
    }

    fn format_value(value: &Value, indent: usize) -> String {
        let indent_str = "  ".repeat(indent);
        let next_indent_str = "  ".repeat(indent + 1);

        match value {
            Value::Null => "null".dimmed().to_string(),
            Value::Bool(b) => b.to_string().yellow().to_string(),
            Value::Number(n) => n.to_string().cyan().to_string(),
            Value::String(s) => format!("\"{}\"", s.green()),
            Value::Array(items) if items.is_empty() => "[]".to_string(),
            Value::Object(entries) if entries.is_empty() => "{}".to_string(),
            Value::Array(items) => {
                let body = items
                    .iter()
                    .map(|item| format!("{next_indent_str}{}", format_value(item, indent + 1)))
                    .collect::<Vec<_>>()
                    .join(",\n");
                format!("[\n{body}\n{indent_str}]")
            }
            Value::Object(entries) => {
                let body = entries
                    .iter()
                    .map(|(key, val)| {
                        format!(
                            "{next_indent_str}{}: {}",
                            key.blue().bold(),
                            format_value(val, indent + 1)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(",\n");
                format!("{{\n{body}\n{indent_str}}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tenant_script_core::ExecutionResult;

    #[derive(Serialize)]
    struct Report {
        file: String,
        valid: bool,
        statements: usize,
        fields: serde_json::Value,
    }

    fn report() -> Report {
        Report {
            file: "form.js".to_string(),
            valid: true,
            statements: 3,
            fields: json!({"country": "US"}),
        }
    }

    #[test]
    fn test_json_format() {
        let output = json::format(&report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["statements"], json!(3));
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_json_format_compact() {
        let output = json::format_compact(&report()).unwrap();
        assert!(!output.contains('\n'));
        assert!(output.contains("\"file\":\"form.js\""));
    }

    #[test]
    fn test_text_format_key_value_lines() {
        let output = text::format(&report()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert!(lines.contains(&"file=form.js"));
        assert!(lines.contains(&"valid=true"));
        assert!(lines.contains(&"statements=3"));
        assert!(lines.contains(&"fields={\"country\":\"US\"}"));
    }

    #[test]
    fn test_text_format_non_object() {
        assert_eq!(text::format(&vec![1, 2]).unwrap(), "[1,2]");
    }

    #[test]
    fn test_pretty_format() {
        colored::control::set_override(false);
        let output = pretty::format(&report()).unwrap();
        assert!(output.contains("file: \"form.js\""));
        assert!(output.contains("country: \"US\""));
        assert!(output.starts_with("{\n"));
    }

    #[test]
    fn test_pretty_empty_collections() {
        colored::control::set_override(false);
        let output = pretty::format(&json!({"effects": [], "fields": {}})).unwrap();
        assert!(output.contains("effects: []"));
        assert!(output.contains("fields: {}"));
    }

    #[test]
    fn test_status_line() {
        colored::control::set_override(false);
        let ok = pretty::status_line(&ExecutionResult::ok(), 12);
        assert_eq!(ok, "✓ script completed (12 ms)");

        let failed = pretty::status_line(&ExecutionResult::failure("Timeout"), 5);
        assert_eq!(failed, "✗ script failed: Timeout (5 ms)");
    }

    #[test]
    fn test_format_output_dispatch() {
        let data = report();
        assert!(format_output(&data, OutputFormat::Json).unwrap().contains("\"valid\""));
        assert!(format_output(&data, OutputFormat::Text).unwrap().contains("valid=true"));
    }
}
