//! Teardown: graceful stop, escalation, stragglers and idempotency.

use dobrika_supervisor::SupervisorConfig;
use e2e_tests::assertions::{assert_group_gone, assert_process_gone, expect_stdout_line};
use e2e_tests::{stub_request, supervisor, test_config, wait_until};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_stop_is_idempotent() {
    let sup = supervisor(test_config());
    let mut server = sup.start(stub_request(Vec::<String>::new())).await.unwrap();
    let pgid = server.pgid();

    sup.stop(&mut server).await;
    sup.stop(&mut server).await;

    assert!(server.is_stopped());
    assert_group_gone(pgid, Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_stop_after_server_exited_on_its_own() {
    let sup = supervisor(test_config());
    let mut server = sup
        .start(stub_request(["--exit-after-ms", "300"]))
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || !server.is_running()).await);

    let started = Instant::now();
    sup.stop(&mut server).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!server.storage_dir().exists());
}

#[tokio::test]
async fn test_stop_escalates_when_sigterm_ignored() {
    let sup = supervisor(SupervisorConfig {
        grace_period: Duration::from_millis(500),
        ..test_config()
    });
    let mut server = sup
        .start(stub_request(["--ignore-sigterm"]))
        .await
        .unwrap();
    let pgid = server.pgid();

    let started = Instant::now();
    sup.stop(&mut server).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "stopped after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "stopped after {:?}", elapsed);
    assert_group_gone(pgid, Duration::from_secs(5)).await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_group_teardown_reaches_grandchild() {
    let sup = supervisor(test_config());
    let mut server = sup
        .start(stub_request(["--spawn-grandchild"]))
        .await
        .unwrap();

    let line = expect_stdout_line(&server, "grandchild pid=", Duration::from_secs(2))
        .await
        .unwrap();
    let grandchild: u32 = line
        .rsplit('=')
        .next()
        .and_then(|pid| pid.trim().parse().ok())
        .expect("grandchild pid");

    let pgid = server.pgid();
    sup.stop(&mut server).await;

    assert_process_gone(grandchild, Duration::from_secs(5)).await.unwrap();
    assert_group_gone(pgid, Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_dropped_handle_kills_group() {
    let sup = supervisor(test_config());
    let server = sup.start(stub_request(Vec::<String>::new())).await.unwrap();
    let pgid = server.pgid();
    let storage = server.storage_dir().to_path_buf();

    drop(server);

    assert_group_gone(pgid, Duration::from_secs(5)).await.unwrap();
    assert!(!storage.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dropped_handle_kills_stragglers_after_leader_exit() {
    let sup = supervisor(test_config());
    let mut server = sup
        .start(stub_request(["--spawn-grandchild", "--exit-after-ms", "1000"]))
        .await
        .unwrap();

    let line = expect_stdout_line(&server, "grandchild pid=", Duration::from_secs(2))
        .await
        .unwrap();
    let grandchild: u32 = line
        .rsplit('=')
        .next()
        .and_then(|pid| pid.trim().parse().ok())
        .expect("grandchild pid");

    assert!(wait_until(Duration::from_secs(5), || !server.is_running()).await);
    // The leader is gone but its child still holds the group.
    assert!(assert_process_gone(grandchild, Duration::from_millis(100)).await.is_err());

    let storage = server.storage_dir().to_path_buf();
    drop(server);

    assert_process_gone(grandchild, Duration::from_secs(5)).await.unwrap();
    assert!(!storage.exists());
}

#[tokio::test]
async fn test_caller_storage_survives_stop() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(test_config());
    let mut server = sup
        .start(stub_request(Vec::<String>::new()).with_storage_dir(dir.path()))
        .await
        .unwrap();

    assert!(!server.owns_storage());
    sup.stop(&mut server).await;
    assert!(dir.path().exists());
}
