//! Stand-in for the Dobrika search server.
//!
//! Listens on `DOBRIKA_ADDR:DOBRIKA_PORT` and implements just enough of the
//! HTTP surface for the harness: `/healthz`, `/index` and `/search`. Flags
//! make it misbehave in the ways the supervisor has to cope with.

use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Stub Dobrika server for harness E2E tests
#[derive(Parser, Debug)]
#[command(name = "stubserver")]
struct Args {
    /// Answer /healthz with 503 until this many milliseconds after startup
    #[arg(long, default_value = "0")]
    health_delay_ms: u64,

    /// Never report healthy
    #[arg(long)]
    never_healthy: bool,

    /// Keep running after SIGTERM / Ctrl+Break
    #[arg(long)]
    ignore_sigterm: bool,

    /// Spawn a long-lived child process in the same process group
    #[arg(long)]
    spawn_grandchild: bool,

    /// Exit on its own after this many milliseconds
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Write our pid and storage directory, one per line, to this file
    #[arg(long, value_name = "FILE")]
    pid_file: Option<PathBuf>,
}

struct State {
    started: Instant,
    health_delay: Duration,
    never_healthy: bool,
    log_requests: bool,
    indexed: Mutex<Vec<String>>,
    search_limit: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();

    let args = Args::parse();
    info!("Starting stubserver with args: {:?}", args);

    let addr = std::env::var("DOBRIKA_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = match std::env::var("DOBRIKA_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        Some(port) => port,
        None => {
            error!("DOBRIKA_PORT is not set or invalid");
            std::process::exit(1);
        }
    };
    let db_path = std::env::var("DOBRIKA_DB_PATH").unwrap_or_default();
    info!("Storage directory: {}", db_path);

    if let Some(path) = &args.pid_file {
        let content = format!("{}\n{}\n", std::process::id(), db_path);
        if let Err(e) = std::fs::write(path, content) {
            error!("Failed to write pid file {}: {}", path.display(), e);
        }
    }

    let state = Arc::new(State {
        started: Instant::now(),
        health_delay: Duration::from_millis(args.health_delay_ms),
        never_healthy: args.never_healthy,
        log_requests: std::env::var("DOBRIKA_LOG_REQUESTS").map(|v| v == "1").unwrap_or(false),
        indexed: Mutex::new(Vec::new()),
        search_limit: std::env::var("DOBRIKA_SEARCH_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20),
    });

    let _grandchild = if args.spawn_grandchild {
        spawn_grandchild()
    } else {
        None
    };

    let bind_addr = format!("{}:{}", addr, port);
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    println!("listening on {}", bind_addr);

    tokio::spawn(accept_loop(listener, state));

    if let Some(ms) = args.exit_after_ms {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            info!("Exit timer ({} ms) reached, exiting", ms);
            std::process::exit(0);
        });
    }

    wait_for_shutdown(args.ignore_sigterm).await;
    info!("Stubserver stopped gracefully");
}

async fn accept_loop(listener: TcpListener, state: Arc<State>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error: {}", e);
            }
        });
    }
}

async fn handle(state: Arc<State>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    if state.log_requests {
        println!("{} {}", method, path);
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/healthz") => {
            if state.never_healthy || state.started.elapsed() < state.health_delay {
                reply(StatusCode::SERVICE_UNAVAILABLE, "starting")
            } else {
                reply(StatusCode::OK, "ok")
            }
        }
        (Method::POST, "/index") => {
            let body = req.into_body().collect().await?.to_bytes();
            match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(doc) => match doc.get("task_id").and_then(|v| v.as_str()) {
                    Some(id) => {
                        state.indexed.lock().push(id.to_string());
                        reply(StatusCode::OK, r#"{"status":"ok"}"#)
                    }
                    None => reply(StatusCode::BAD_REQUEST, r#"{"status":"missing task_id"}"#),
                },
                Err(_) => reply(StatusCode::BAD_REQUEST, r#"{"status":"invalid json"}"#),
            }
        }
        (Method::POST, "/search") => {
            let body = req.into_body().collect().await?.to_bytes();
            if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
                reply(StatusCode::BAD_REQUEST, r#"{"status":"invalid json"}"#)
            } else {
                let ids: Vec<String> = state
                    .indexed
                    .lock()
                    .iter()
                    .take(state.search_limit)
                    .cloned()
                    .collect();
                let body = serde_json::json!({ "status": "ok", "task_id": ids });
                reply(StatusCode::OK, body.to_string())
            }
        }
        _ => reply(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

fn reply(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn spawn_grandchild() -> Option<std::process::Child> {
    #[cfg(unix)]
    let mut cmd = {
        let mut cmd = std::process::Command::new("sleep");
        cmd.arg("300");
        cmd
    };

    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = std::process::Command::new("ping");
        cmd.args(["-n", "300", "127.0.0.1"]);
        cmd
    };

    cmd.stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    match cmd.spawn() {
        Ok(child) => {
            println!("grandchild pid={}", child.id());
            Some(child)
        }
        Err(e) => {
            error!("Failed to spawn grandchild: {}", e);
            None
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(ignore_sigterm: bool) {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigterm), Ok(mut sigint)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) else {
        error!("Failed to install signal handlers");
        std::process::exit(1);
    };

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                if ignore_sigterm {
                    info!("Received SIGTERM, ignoring");
                    continue;
                }
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
        break;
    }
}

#[cfg(windows)]
async fn wait_for_shutdown(ignore_sigterm: bool) {
    use tokio::signal::windows::ctrl_break;

    let mut ctrl_break = match ctrl_break() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install Ctrl+Break handler: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        ctrl_break.recv().await;
        if ignore_sigterm {
            info!("Received Ctrl+Break, ignoring");
            continue;
        }
        info!("Received Ctrl+Break");
        break;
    }
}
