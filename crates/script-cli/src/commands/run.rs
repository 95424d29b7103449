//! Run command implementation.
//!
//! Runs a script file against an in-memory form and reports the outcome,
//! the effects the form received and its final field values.

use super::common::{ConfigOverrides, parse_field, read_script, resolve_config};
use crate::formatters::{self, pretty};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Instant;
use tenant_script_core::cli::{ExitCode, OutputFormat};
use tenant_script_core::{ExecutionContext, ExecutionResult, FormEvent, FormId, TenantId};
use tenant_script_runtime::{Dispatcher, FormState, HostCall, SdkConfig, create_sdk};
use tracing::info;

/// Options of the `run` command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Script file
    pub file: PathBuf,
    /// Lifecycle event to simulate
    pub event: FormEvent,
    /// Form identifier placed in the context
    pub form_id: String,
    /// Tenant identifier placed in the context
    pub tenant_id: String,
    /// Initial field values as `name=value`
    pub fields: Vec<String>,
    /// Configuration and its overrides
    pub overrides: ConfigOverrides,
}

/// Outcome of one `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Script outcome
    #[serde(flatten)]
    pub result: ExecutionResult,
    /// Final submit-blocked flag
    pub submit_blocked: bool,
    /// Effects the form received, in order
    pub effects: Vec<HostCall>,
    /// Field values after the run
    pub fields: Map<String, Value>,
    /// Strategy the dispatcher was configured with
    pub strategy: String,
    /// Wall-clock time of the run
    pub elapsed_ms: u64,
}

/// Runs a script and builds its report.
///
/// # Errors
///
/// Returns an error for unreadable input or invalid configuration. Script
/// failures are part of the report.
pub async fn execute(options: &RunOptions) -> Result<RunReport> {
    let config = resolve_config(&options.overrides)?;
    let script = read_script(&options.file)?;

    let form = options
        .fields
        .iter()
        .map(|pair| parse_field(pair))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .fold(FormState::new(), |form, (name, value)| form.with_field(name, value));

    let api = create_sdk(
        SdkConfig::masking(config.mask_fields.iter().cloned()),
        form.accessors(),
    );
    let context = ExecutionContext::new(
        options.event,
        FormId::new(options.form_id.clone()),
        TenantId::new(options.tenant_id.clone()),
    );

    info!("Running script: {}", options.file.display());
    let dispatcher = Dispatcher::from_config(&config);
    let start = Instant::now();
    let result = dispatcher.run(&script, &api, &context).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(RunReport {
        result,
        submit_blocked: api.ui.is_submit_blocked(),
        effects: form.effects(),
        fields: form.fields(),
        strategy: config.strategy.as_str().to_string(),
        elapsed_ms,
    })
}

/// Runs the run command.
///
/// # Errors
///
/// Returns an error for unreadable input, invalid configuration or
/// formatting failures.
pub async fn run(options: RunOptions, output_format: OutputFormat) -> Result<ExitCode> {
    let report = execute(&options).await?;

    if output_format == OutputFormat::Pretty {
        println!("{}", pretty::status_line(&report.result, report.elapsed_ms));
    }
    println!("{}", formatters::format_output(&report, output_format)?);

    Ok(ExitCode::for_result(&report.result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tenant_script_core::ExecutionStrategy;

    fn script_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn options(file: &tempfile::NamedTempFile) -> RunOptions {
        RunOptions {
            file: file.path().to_path_buf(),
            event: FormEvent::FormLoad,
            form_id: "Customer_Form_v1".to_string(),
            tenant_id: "acme".to_string(),
            fields: Vec::new(),
            overrides: ConfigOverrides {
                strategy: Some(ExecutionStrategy::InProcess),
                ..ConfigOverrides::default()
            },
        }
    }

    #[tokio::test]
    async fn test_run_reports_effects_and_fields() {
        let file = script_file("ui.setField('country', 'US'); ui.toast(context.tenantId);");
        let mut options = options(&file);
        options.fields = vec!["email=a@b.c".to_string()];

        let report = execute(&options).await.unwrap();
        assert!(report.result.success);
        assert_eq!(report.fields["country"], json!("US"));
        assert_eq!(report.fields["email"], json!("a@b.c"));
        assert_eq!(report.effects.len(), 2);
        assert_eq!(report.strategy, "in-process");
    }

    #[tokio::test]
    async fn test_run_masked_field_fails() {
        let file = script_file("ui.setField('ssn', '1');");
        let mut options = options(&file);
        options.overrides.mask = vec!["ssn".to_string()];

        let report = execute(&options).await.unwrap();
        assert!(!report.result.success);
        assert_eq!(
            ExitCode::for_result(&report.result),
            ExitCode::SCRIPT_FAILED
        );
    }

    #[tokio::test]
    async fn test_run_before_submit_blocks() {
        let file = script_file(
            "if (context.event === 'BeforeSubmit' && !ui.getField('email')) { ui.blockSubmit(true); }",
        );
        let mut options = options(&file);
        options.event = FormEvent::BeforeSubmit;

        let report = execute(&options).await.unwrap();
        assert!(report.submit_blocked);
    }

    #[tokio::test]
    async fn test_run_report_serializes_flat() {
        let file = script_file("const a = 1;");
        let report = execute(&options(&file)).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], json!(true));
        assert!(json.get("error").is_none());
        assert_eq!(json["submit_blocked"], json!(false));
    }

    #[tokio::test]
    async fn test_run_bad_field_is_an_error() {
        let file = script_file("const a = 1;");
        let mut options = options(&file);
        options.fields = vec!["broken".to_string()];
        assert!(execute(&options).await.is_err());
    }
}
