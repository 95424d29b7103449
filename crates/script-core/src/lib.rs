//! Core types, configuration and errors for the tenant script sandbox.
//!
//! This crate provides the foundational types shared by the runtime and the
//! CLI.
//!
//! # Architecture
//!
//! The core consists of:
//! - Strong domain types (`TenantId`, `FormId`, `ExecutionContext`, `ExecutionResult`)
//! - The error taxonomy every execution path reports through
//! - Sandbox configuration (`SandboxConfig`, `ExecutionStrategy`)
//! - Script sources and the `ScriptProvider` retrieval trait

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod source;
mod types;

pub mod cli;
pub mod stats;
pub mod traits;

pub use config::{DEFAULT_FORBIDDEN_GLOBALS, ExecutionStrategy, SandboxConfig, SandboxConfigBuilder};
pub use error::{Error, Result};
pub use source::{SCRIPT_BODY_KEYS, ScriptSource};
pub use types::{
    ExecutionContext, ExecutionResult, FormEvent, FormId, RecordId, ScriptId, TenantId,
};
