//! Lifecycle management for the Dobrika server under test.
//!
//! [`ProcessSupervisor`] spawns the server in its own process group with an
//! assembled environment, captures its output, waits for `/healthz` and tears
//! the whole group down again. [`HarnessContext`] wraps that in a per-run
//! value that can also point at an externally managed service.

pub mod config;
pub mod context;
pub mod environment;
pub mod process;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use context::{HarnessContext, HarnessOptions};
pub use environment::LaunchEnvironment;
pub use process::ServerProcess;
pub use supervisor::{ProcessSupervisor, StartRequest};
