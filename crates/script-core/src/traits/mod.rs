//! Core traits for the tenant script sandbox.
//!
//! - `provider` - script retrieval
//!
//! Runner traits live next to the runners in the runtime crate because
//! they are expressed in terms of the capability API.

mod provider;

pub use provider::ScriptProvider;
