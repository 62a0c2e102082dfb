use anyhow::{anyhow, bail, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use dobrika_common::HarnessError;
use dobrika_supervisor::{HarnessContext, HarnessOptions, SupervisorConfig};
use dobrika_workload::{extract_queries, load_tasks, search_payloads, WorkloadReport, WorkloadRunner};

/// Dobrika server load tester
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host (default: DOBRIKA_ADDR / DOBRIKA_HOST or 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Server port; preferred port when starting the server (default: DOBRIKA_PORT or 8088)
    #[arg(long)]
    port: Option<u16>,

    /// Database directory used when starting the server (default: a temporary directory)
    #[arg(long, value_name = "DIR")]
    db: Option<PathBuf>,

    /// JSON file with tasks to index
    #[arg(long, value_name = "FILE", default_value = "dev/data/bullets.json")]
    tasks_file: PathBuf,

    /// Concurrent requests in flight
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Max tasks to index from the tasks file
    #[arg(long, default_value_t = 50)]
    index_limit: usize,

    /// Number of search requests to execute
    #[arg(long, default_value_t = 200)]
    search_requests: usize,

    /// Start the server binary as a subprocess
    #[arg(long)]
    run_server: bool,

    /// Path to the server binary (default: DOBRIKA_BINARY or build/dobrika_server_main)
    #[arg(long, value_name = "FILE")]
    binary: Option<PathBuf>,

    /// Seconds to wait for server readiness
    #[arg(long, default_value_t = 20.0)]
    startup_timeout: f64,

    /// Supervisor configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print each phase report as a JSON line
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Serialize)]
struct PhaseLine<'a> {
    phase: &'static str,
    #[serde(flatten)]
    report: &'a WorkloadReport,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    initialize_logging(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<HarnessError>()
        .map(HarnessError::exit_code)
        .unwrap_or(1)
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SupervisorConfig::load_from_file(path)?,
        None => SupervisorConfig::default(),
    };

    if !(args.startup_timeout.is_finite() && args.startup_timeout > 0.0) {
        bail!(HarnessError::configuration("--startup-timeout must be a positive number of seconds"));
    }
    config.startup_timeout = Duration::from_secs_f64(args.startup_timeout);
    config.probe_timeout = config.probe_timeout.min(config.startup_timeout);

    let options = harness_options(&args);

    if options.run_server {
        info!(
            binary = ?options.binary,
            host = %options.host,
            db = ?options.db_path,
            "Starting server"
        );
    }

    // One listener for the whole run. Abandoning `acquire` drops the half-started
    // server, which kills its process group and removes its storage.
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let context = tokio::select! {
        result = HarnessContext::acquire(options, config) => result?,
        _ = &mut shutdown => bail!("Interrupted while waiting for the server"),
    };
    println!("Server is ready at {}", context.base_url());

    let result = tokio::select! {
        result = run_phases(&context, &args) => result,
        _ = &mut shutdown => Err(anyhow!("Interrupted")),
    };

    context.release().await;
    result
}

fn harness_options(args: &Args) -> HarnessOptions {
    let env = HarnessOptions::from_env();
    HarnessOptions {
        run_server: args.run_server || env.run_server,
        binary: args
            .binary
            .clone()
            .or(env.binary)
            .or_else(|| Some(PathBuf::from("build/dobrika_server_main"))),
        host: args.host.clone().unwrap_or(env.host),
        port: args.port.or(env.port),
        db_path: args.db.clone().or(env.db_path),
    }
}

async fn run_phases(context: &HarnessContext, args: &Args) -> Result<()> {
    let tasks = load_tasks(&args.tasks_file, args.index_limit)?;
    let runner = WorkloadRunner::new();
    let address = context.address();

    println!(
        "Indexing {} tasks with concurrency={} ...",
        tasks.len(),
        args.concurrency
    );
    let index = runner
        .run(&address.url("/index"), &tasks, args.concurrency)
        .await?;
    print_report("index", "Indexed", &index, args.json)?;

    let queries = extract_queries(&tasks);
    println!(
        "Running {} searches (unique terms={}) ...",
        args.search_requests,
        queries.len()
    );
    let payloads = search_payloads(&queries, args.search_requests, &mut rand::thread_rng());
    let search = runner
        .run(&address.url("/search"), &payloads, args.concurrency)
        .await?;
    print_report("search", "Search ok", &search, args.json)?;

    if index.failures > 0 || search.failures > 0 {
        warn!(
            index_failures = index.failures,
            search_failures = search.failures,
            "Some requests failed"
        );
    }

    Ok(())
}

fn print_report(phase: &'static str, label: &str, report: &WorkloadReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&PhaseLine { phase, report })?);
    } else {
        println!("{} {}", label, report);
    }
    Ok(())
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) else {
            warn!("Failed to install signal handlers");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
