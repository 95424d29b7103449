//! Tenant script CLI.
//!
//! Runs and checks tenant form scripts locally against an in-memory form,
//! using the same sandbox the host application embeds.
//!
//! # Examples
//!
//! ```bash
//! # Run a script on form load
//! tenant-script run customer_form.js --tenant acme --form Customer_Form_v1
//!
//! # Simulate submit with a seeded field and a masked one
//! tenant-script run customer_form.js --event before-submit \
//!     --field email=a@b.c --mask ssn
//!
//! # Validate a script without running it
//! tenant-script --format json check customer_form.js
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tenant_script_cli::commands::{self, common::ConfigOverrides, run::RunOptions};
use tenant_script_core::cli::{ExitCode, OutputFormat};
use tenant_script_core::{ExecutionStrategy, FormEvent};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tenant script sandbox runner.
#[derive(Parser, Debug)]
#[command(name = "tenant-script")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    format: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script against an in-memory form.
    ///
    /// Exits 0 when the script completes, 1 when it fails and 4 on timeout.
    Run {
        /// Script file
        file: PathBuf,

        /// Lifecycle event (form-load, before-submit, after-submit, field-change)
        #[arg(short, long, default_value = "form-load")]
        event: FormEvent,

        /// Tenant identifier
        #[arg(long, default_value = "local", env = "TENANT_SCRIPT_TENANT")]
        tenant: String,

        /// Form identifier
        #[arg(long, default_value = "form")]
        form: String,

        /// Initial field value as NAME=VALUE (JSON or plain string)
        #[arg(long = "field", num_args = 1)]
        fields: Vec<String>,

        /// Additional masked field
        #[arg(long = "mask", num_args = 1)]
        mask: Vec<String>,

        /// Timeout override in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Execution strategy override (isolated, in-process)
        #[arg(long)]
        strategy: Option<ExecutionStrategy>,

        /// Sandbox config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that a script passes the static gate and parses.
    Check {
        /// Script file
        file: PathBuf,

        /// Sandbox config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let output_format = cli
        .format
        .parse::<OutputFormat>()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let exit_code = match execute_command(cli.command, output_format).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::INVALID_INPUT
        }
    };

    std::process::exit(exit_code.as_i32());
}

/// Initializes logging on stderr.
///
/// `RUST_LOG` wins unless `--verbose` is given.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Routes a command to its handler.
async fn execute_command(command: Commands, output_format: OutputFormat) -> Result<ExitCode> {
    match command {
        Commands::Run {
            file,
            event,
            tenant,
            form,
            fields,
            mask,
            timeout_ms,
            strategy,
            config,
        } => {
            let options = RunOptions {
                file,
                event,
                form_id: form,
                tenant_id: tenant,
                fields,
                overrides: ConfigOverrides {
                    config,
                    timeout_ms,
                    strategy,
                    mask,
                },
            };
            commands::run::run(options, output_format).await
        }
        Commands::Check { file, config } => {
            let overrides = ConfigOverrides {
                config,
                ..ConfigOverrides::default()
            };
            commands::check::run(&file, &overrides, output_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_run_defaults() {
        let cli = Cli::parse_from(["tenant-script", "run", "form.js"]);
        if let Commands::Run {
            file,
            event,
            form,
            strategy,
            ..
        } = cli.command
        {
            assert_eq!(file, PathBuf::from("form.js"));
            assert_eq!(event, FormEvent::FormLoad);
            assert_eq!(form, "form");
            assert_eq!(strategy, None);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parsing_run_full() {
        let cli = Cli::parse_from([
            "tenant-script",
            "run",
            "form.js",
            "--event",
            "before-submit",
            "--tenant",
            "acme",
            "--field",
            "email=a@b.c",
            "--field",
            "age=42",
            "--mask",
            "ssn",
            "--timeout-ms",
            "250",
            "--strategy",
            "in-process",
        ]);
        if let Commands::Run {
            event,
            tenant,
            fields,
            mask,
            timeout_ms,
            strategy,
            ..
        } = cli.command
        {
            assert_eq!(event, FormEvent::BeforeSubmit);
            assert_eq!(tenant, "acme");
            assert_eq!(fields, vec!["email=a@b.c", "age=42"]);
            assert_eq!(mask, vec!["ssn"]);
            assert_eq!(timeout_ms, Some(250));
            assert_eq!(strategy, Some(ExecutionStrategy::InProcess));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parsing_check() {
        let cli = Cli::parse_from(["tenant-script", "check", "form.js", "-c", "sandbox.toml"]);
        if let Commands::Check { config, .. } = cli.command {
            assert_eq!(config, Some(PathBuf::from("sandbox.toml")));
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_rejects_unknown_event() {
        assert!(Cli::try_parse_from(["tenant-script", "run", "form.js", "--event", "nope"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["tenant-script", "check", "form.js", "--verbose", "--log-json"]);
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert_eq!(cli.format, "pretty");
    }

    #[test]
    fn test_cli_output_format_custom() {
        let cli = Cli::parse_from(["tenant-script", "--format", "json", "check", "form.js"]);
        assert_eq!(cli.format.parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }
}
