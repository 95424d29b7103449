//! Command implementations for the tenant script CLI.
//!
//! Each command module parses nothing itself: `main` hands it typed options,
//! it does the work and formats output according to the requested format.

pub mod check;
pub mod common;
pub mod run;
