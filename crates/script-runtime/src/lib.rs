//! Tenant script execution runtime.
//!
//! Runs tenant-authored form scripts against an explicit capability API
//! (`ui`, `workflow`, `repo`) with no ambient host authority. Scripts pass
//! a static deny-list gate, are parsed by a restricted interpreter and run
//! either on an isolate thread or in process, always bounded by a timeout.
//!
//! # Architecture
//!
//! - [`sdk`] builds the per-invocation capability object
//! - [`compiler`] vets and caches scripts ([`security`], [`cache`])
//! - [`evaluator`] and [`isolate`] are the two execution paths
//! - [`dispatcher`] picks the path for each invocation
//! - [`session`] binds a form to its script and lifecycle events

#![warn(missing_docs, missing_debug_implementations)]

pub mod cache;
pub mod capability;
pub mod compiler;
pub mod dispatcher;
pub mod evaluator;
pub mod host;
pub mod interp;
pub mod isolate;
pub mod monitor;
pub mod provider;
pub mod runner;
pub mod sdk;
pub mod security;
pub mod session;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use evaluator::InProcessEvaluator;
pub use host::{FormState, HostAccessors, HostCall};
pub use isolate::IsolatedRunner;
pub use runner::ScriptRunner;
pub use sdk::{CapabilityApi, MaskPolicy, SdkConfig, create_sdk};
pub use session::{FormSession, ScriptRef, SubmitDecision};
