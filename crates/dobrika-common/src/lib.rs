//! # Dobrika Common
//!
//! Error types and small shared domain types used by every harness crate.
//!
//! The harness drives the Dobrika search service strictly over HTTP, so the
//! only things shared across crates are the error taxonomy and the notion of
//! where the service lives.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{HarnessError, HarnessResult};
pub use types::ServiceAddress;
