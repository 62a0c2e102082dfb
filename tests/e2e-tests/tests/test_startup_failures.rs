//! Startup failures: nothing is left running and the right error comes back.

use dobrika_common::HarnessError;
use dobrika_supervisor::StartRequest;
use e2e_tests::assertions::assert_group_gone;
use e2e_tests::{read_pid_file, stub_request, supervisor, test_config, wait_until};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_missing_binary_fails_before_spawn() {
    let port = dobrika_process::pick_free_port(None).unwrap();
    let sup = supervisor(test_config());

    let err = sup
        .start(StartRequest::new("/nonexistent/dobrika_server_main", port))
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::NotFound { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 2);
    // Nobody ever listened on the port.
    assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
}

#[tokio::test]
async fn test_empty_binary_is_configuration_error() {
    let sup = supervisor(test_config());
    let err = sup.start(StartRequest::new("", 1)).await.unwrap_err();
    assert!(matches!(err, HarnessError::Configuration { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_never_healthy_times_out_and_kills_server() {
    let mut config = test_config();
    config.startup_timeout = Duration::from_secs(1);
    let sup = supervisor(config);

    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("server.pid");
    let request = stub_request([
        "--never-healthy".to_string(),
        "--pid-file".to_string(),
        pid_file.display().to_string(),
    ]);
    let port = request.port;

    let started = Instant::now();
    let err = sup.start(request).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(8), "returned after {:?}", elapsed);
    match &err {
        HarnessError::HealthTimeout { last_error, .. } => {
            assert_eq!(last_error.as_deref(), Some("HTTP 503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 3);

    let (pid, storage) = read_pid_file(&pid_file).expect("stub server wrote its pid file");
    assert_group_gone(pid, Duration::from_secs(5)).await.unwrap();
    assert!(!storage.exists(), "owned storage left at {}", storage.display());
    assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
}

#[tokio::test]
async fn test_abandoned_start_tears_down_server() {
    let mut config = test_config();
    config.startup_timeout = Duration::from_secs(30);
    let sup = supervisor(config);

    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("server.pid");
    let request = stub_request([
        "--never-healthy".to_string(),
        "--pid-file".to_string(),
        pid_file.display().to_string(),
    ]);

    // Give up on the start once the server is up but still unhealthy, the
    // way the load tester does when interrupted during startup.
    let finished = tokio::select! {
        _ = sup.start(request) => true,
        _ = wait_until(Duration::from_secs(5), || read_pid_file(&pid_file).is_some()) => false,
    };
    assert!(!finished, "start returned before it was abandoned");

    let (pid, storage) = read_pid_file(&pid_file).expect("stub server wrote its pid file");
    assert_group_gone(pid, Duration::from_secs(5)).await.unwrap();
    assert!(!storage.exists(), "owned storage left at {}", storage.display());
}
