//! Performance tests for the tenant script runtime.
//!
//! Tests performance characteristics:
//! - Compilation cache hits
//! - Per-invocation overhead of each path
//! - Throughput under concurrent invocations

use std::sync::Arc;
use std::time::{Duration, Instant};
use tenant_script_core::{ExecutionContext, ExecutionStrategy, SandboxConfig};
use tenant_script_runtime::compiler::ScriptCompiler;
use tenant_script_runtime::{Dispatcher, FormState, SdkConfig, create_sdk};

const SCRIPT: &str = "
    let total = 0;
    for (let i = 0; i < 200; i += 1) {
        total += i;
    }
    if (total !== 19900) { throw new Error('wrong total'); }
    ui.setField('total', total);
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tenant_script_runtime=info")
        .with_test_writer()
        .try_init();
}

/// Second compilation of the same text is served from the cache.
#[test]
fn test_compilation_cache_hit() {
    init_tracing();
    let compiler = ScriptCompiler::new(&SandboxConfig::default());

    let start = Instant::now();
    let first = compiler.compile(SCRIPT).unwrap();
    let uncached = start.elapsed();

    let start = Instant::now();
    let second = compiler.compile(SCRIPT).unwrap();
    let cached = start.elapsed();

    tracing::info!("Uncached: {:?}, cached: {:?}", uncached, cached);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.cache().len(), 1);
}

/// The cache never grows past its capacity.
#[test]
fn test_cache_capacity_bounded() {
    let config = SandboxConfig::builder().cache_capacity(4).build();
    let compiler = ScriptCompiler::new(&config);
    for i in 0..16 {
        compiler.compile(&format!("const a = {i};")).unwrap();
    }
    assert_eq!(compiler.cache().len(), 4);
}

#[tokio::test]
async fn test_invocation_overhead() {
    init_tracing();
    for strategy in [ExecutionStrategy::InProcess, ExecutionStrategy::Isolated] {
        let dispatcher = Dispatcher::from_config(&SandboxConfig::builder().strategy(strategy).build());
        let start = Instant::now();
        for _ in 0..20 {
            let form = FormState::new();
            let api = create_sdk(SdkConfig::default(), form.accessors());
            let result = dispatcher.run(SCRIPT, &api, &ExecutionContext::default()).await;
            assert!(result.success, "{result:?}");
        }
        let elapsed = start.elapsed();
        tracing::info!("{} x20: {:?}", strategy.as_str(), elapsed);
        assert!(elapsed < Duration::from_secs(10));

        let stats = dispatcher.stats();
        assert_eq!(stats.total_runs, 20);
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_throughput() {
    init_tracing();
    let dispatcher = Arc::new(Dispatcher::from_config(&SandboxConfig::default()));
    let start = Instant::now();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let form = FormState::new();
                let api = create_sdk(SdkConfig::default(), form.accessors());
                let result = dispatcher.run(SCRIPT, &api, &ExecutionContext::default()).await;
                (result, form.field("total"))
            })
        })
        .collect();

    for handle in handles {
        let (result, total) = handle.await.unwrap();
        assert!(result.success, "{result:?}");
        assert_eq!(total, Some(serde_json::json!(19900)));
    }
    tracing::info!("32 concurrent isolated runs: {:?}", start.elapsed());
    assert_eq!(dispatcher.stats().isolated_runs, 32);
}
