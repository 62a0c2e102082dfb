//! # Dobrika Process
//!
//! Low-level primitives the supervisor is built from:
//! - Port selection for the server under test
//! - Process-group termination (graceful and forced)
//! - Process / process-group existence checks
//! - Executable validation

pub mod check;
pub mod port;
pub mod terminate;
pub mod validation;

// Re-export main functions
pub use check::*;
pub use port::*;
pub use terminate::*;
pub use validation::*;
