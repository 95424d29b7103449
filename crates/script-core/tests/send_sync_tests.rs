//! Tests to verify that public types can cross thread and task boundaries.

use tenant_script_core::cli::{ExitCode, OutputFormat};
use tenant_script_core::stats::DispatchStats;
use tenant_script_core::traits::ScriptProvider;
use tenant_script_core::*;

const fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_domain_types_are_send_sync() {
    assert_send_sync::<TenantId>();
    assert_send_sync::<FormId>();
    assert_send_sync::<ScriptId>();
    assert_send_sync::<RecordId>();
    assert_send_sync::<FormEvent>();
    assert_send_sync::<ExecutionContext>();
    assert_send_sync::<ExecutionResult>();
    assert_send_sync::<ScriptSource>();
}

#[test]
fn test_config_types_are_send_sync() {
    assert_send_sync::<SandboxConfig>();
    assert_send_sync::<SandboxConfigBuilder>();
    assert_send_sync::<ExecutionStrategy>();
    assert_send_sync::<OutputFormat>();
    assert_send_sync::<ExitCode>();
    assert_send_sync::<DispatchStats>();
}

#[test]
fn test_error_is_send_sync() {
    assert_send_sync::<Error>();
}

#[test]
fn test_provider_trait_object_is_send_sync() {
    assert_send_sync::<std::sync::Arc<dyn ScriptProvider>>();
}
