//! Startup through the health gate, then real workloads against the stub.

use dobrika_workload::{extract_queries, search_payloads, WorkloadRunner};
use e2e_tests::assertions::{assert_group_gone, expect_stdout_line};
use e2e_tests::{sample_tasks, stub_request, supervisor, test_config};
use std::time::Duration;

#[tokio::test]
async fn test_delayed_health_then_index_batch() {
    let sup = supervisor(test_config());
    let mut server = sup
        .start(stub_request(["--health-delay-ms", "300"]))
        .await
        .expect("stub should become healthy within 2s");

    let ready = server.ready_report().expect("ready report").clone();
    assert!(ready.attempts > 1, "health gate should have retried: {:?}", ready);
    assert!(ready.waited >= Duration::from_millis(300));

    let runner = WorkloadRunner::new();
    let report = runner
        .run(&server.address().url("/index"), &sample_tasks(10), 4)
        .await
        .unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.successes, 10);
    assert_eq!(report.failures, 0);
    assert!(report.p95_ms >= report.p50_ms);
    assert!(report.p50_ms >= 0.0);

    let pgid = server.pgid();
    let storage = server.storage_dir().to_path_buf();
    sup.stop(&mut server).await;

    assert_group_gone(pgid, Duration::from_secs(5)).await.unwrap();
    assert!(!storage.exists(), "owned storage should be removed");
}

#[tokio::test]
async fn test_search_phase_after_indexing() {
    let sup = supervisor(test_config());
    let mut server = sup.start(stub_request(Vec::<String>::new())).await.unwrap();

    let tasks = sample_tasks(5);
    let runner = WorkloadRunner::new();
    runner
        .run(&server.address().url("/index"), &tasks, 2)
        .await
        .unwrap();

    let queries = extract_queries(&tasks);
    assert!(queries.contains(&"bicycle".to_string()));

    let payloads = search_payloads(&queries, 20, &mut rand_rng());
    let report = runner
        .run(&server.address().url("/search"), &payloads, 8)
        .await
        .unwrap();
    assert_eq!(report.successes, 20);

    sup.stop(&mut server).await;
}

#[tokio::test]
async fn test_launch_environment_reaches_server() {
    let sup = supervisor(test_config());
    let request = stub_request(Vec::<String>::new()).with_env("DOBRIKA_LOG_REQUESTS", "1");
    let port = request.port;
    let mut server = sup.start(request).await.unwrap();

    expect_stdout_line(&server, &format!("listening on 127.0.0.1:{}", port), Duration::from_secs(2))
        .await
        .unwrap();
    // The health gate's own probes are logged once request logging is on.
    expect_stdout_line(&server, "GET /healthz", Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(server.env().get("DOBRIKA_LOG_REQUESTS"), Some("1"));
    assert_eq!(server.env().get("DOBRIKA_COLD_MIN"), Some("30"));

    sup.stop(&mut server).await;
}

fn rand_rng() -> impl rand::Rng {
    use rand::SeedableRng;
    rand::rngs::StdRng::seed_from_u64(42)
}
