//! Tenant script CLI library.
//!
//! Exposes the command implementations and output formatters behind the
//! `tenant-script` binary so they can be tested and embedded.

pub mod commands;
pub mod formatters;
