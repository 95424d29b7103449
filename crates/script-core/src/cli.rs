//! CLI-specific types.
//!
//! Strong types for output selection and process exit status, shared by the
//! `tenant-script` binary and anything that embeds its commands.
//!
//! # Examples
//!
//! ```
//! use tenant_script_core::cli::{ExitCode, OutputFormat};
//!
//! let format: OutputFormat = "json".parse().unwrap();
//! assert_eq!(format, OutputFormat::Json);
//! assert_eq!(ExitCode::SCRIPT_FAILED.as_i32(), 1);
//! ```

use std::fmt;
use std::str::FromStr;

/// CLI output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// JSON output for machine parsing
    Json,
    /// Compact single-line output for scripts
    Text,
    /// Colored output for human reading
    #[default]
    Pretty,
}

impl OutputFormat {
    /// Returns the string representation of the format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "pretty" => Ok(Self::Pretty),
            _ => Err(crate::Error::argument(format!(
                "invalid output format: '{s}' (expected: json, text, or pretty)"
            ))),
        }
    }
}

/// CLI exit code with semantic meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// The script ran and succeeded (exit code 0).
    pub const SUCCESS: Self = Self(0);

    /// The script ran and failed (exit code 1).
    pub const SCRIPT_FAILED: Self = Self(1);

    /// Invalid input, arguments or configuration (exit code 2).
    pub const INVALID_INPUT: Self = Self(2);

    /// The script did not settle in time (exit code 4).
    pub const TIMEOUT: Self = Self(4);

    /// Creates an exit code from an integer value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }

    /// Returns the exit code as an integer.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Checks if the exit code represents success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Maps an execution outcome to an exit code.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_core::ExecutionResult;
    /// use tenant_script_core::cli::ExitCode;
    ///
    /// assert_eq!(ExitCode::for_result(&ExecutionResult::ok()), ExitCode::SUCCESS);
    /// assert_eq!(ExitCode::for_result(&ExecutionResult::failure("Timeout")), ExitCode::TIMEOUT);
    /// ```
    #[must_use]
    pub fn for_result(result: &crate::ExecutionResult) -> Self {
        if result.success {
            Self::SUCCESS
        } else if result.is_timeout() {
            Self::TIMEOUT
        } else {
            Self::SCRIPT_FAILED
        }
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionResult;

    #[test]
    fn test_output_format_roundtrip() {
        for format in [OutputFormat::Json, OutputFormat::Text, OutputFormat::Pretty] {
            assert_eq!(format.as_str().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn test_output_format_invalid() {
        let err = "yaml".parse::<OutputFormat>().unwrap_err();
        assert!(err.is_argument_error());
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn test_exit_code_for_result() {
        assert!(ExitCode::for_result(&ExecutionResult::ok()).is_success());
        assert_eq!(
            ExitCode::for_result(&ExecutionResult::failure("Error: boom")),
            ExitCode::SCRIPT_FAILED
        );
        assert_eq!(i32::from(ExitCode::TIMEOUT), 4);
    }
}
