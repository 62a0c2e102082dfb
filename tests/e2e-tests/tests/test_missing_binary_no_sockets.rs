//! A missing server binary is reported before the harness opens any socket.
//!
//! Runs alone in its own test binary: it exhausts the descriptor table.
#![cfg(target_os = "linux")]

use dobrika_common::HarnessError;
use dobrika_supervisor::{HarnessContext, HarnessOptions};
use e2e_tests::{supervisor, test_config};
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use std::fs::File;
use std::path::PathBuf;

#[tokio::test(flavor = "current_thread")]
async fn test_missing_binary_reported_with_no_free_descriptors() {
    let sup = supervisor(test_config());
    let options = HarnessOptions {
        run_server: true,
        binary: Some(PathBuf::from("/nonexistent/dobrika_server_main")),
        ..Default::default()
    };

    let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).unwrap();
    setrlimit(Resource::RLIMIT_NOFILE, soft.min(256), hard).unwrap();

    let mut held = Vec::new();
    while let Ok(file) = File::open("/dev/null") {
        held.push(file);
    }
    let socket_blocked = std::net::TcpListener::bind("127.0.0.1:0").is_err();

    let result = HarnessContext::acquire_with(options, sup).await;

    drop(held);
    setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

    assert!(socket_blocked, "descriptor table was not exhausted");
    let err = result.unwrap_err();
    assert!(matches!(err, HarnessError::NotFound { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 2);
}
