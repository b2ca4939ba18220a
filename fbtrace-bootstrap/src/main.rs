// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Entry point: parse the CLI, bootstrap config and logging, and run
//! whichever subcommand was requested. Mirrors the teacher's
//! composition-root pattern at a fraction of the size, since this
//! front end only ever wires one sink to one synthetic producer
//! (`SPEC_FULL.md` §6).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use fbtrace::{create_default_sink, delete_sink, EventSink, ProcedureContext, SinkParams};
use fbtrace_bootstrap::cli::{Cli, Command};
use fbtrace_bootstrap::shutdown::ShutdownCoordinator;
use fbtrace_domain::Statistics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();
    let config = fbtrace::config::FbtraceConfig::load(config_path)?;
    let verbosity = if cli.verbose > 0 { "debug" } else { config.log_verbosity.as_str() };
    fbtrace::logging::init_logging(verbosity);

    match cli.command {
        Command::Record {
            path,
            duration,
            producer_threads,
            event_rate_hz,
        } => run_record(&path, duration, producer_threads, event_rate_hz, &config.sink_params()).await,
        Command::Stats {
            duration,
            producer_threads,
            event_rate_hz,
        } => {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("fbtrace-stats.bin");
            run_record(&path, duration, producer_threads, event_rate_hz, &config.sink_params()).await
        }
    }
}

/// Creates a sink at `path`, drives `producer_threads` synthetic
/// producer threads against it for `duration`, tears the sink down,
/// and prints the resulting statistics as Prometheus text exposition.
async fn run_record(
    path: &std::path::Path,
    duration: Duration,
    producer_threads: usize,
    event_rate_hz: u64,
    params: &SinkParams,
) -> anyhow::Result<()> {
    let statistics = Arc::new(Statistics::new());
    let (sink, handles) = create_default_sink(path, Arc::clone(&statistics), *params)?;
    tracing::info!(path = %path.display(), "sink created");

    let coordinator = ShutdownCoordinator::new();
    let coordinator_for_wait = coordinator.clone();
    let wait_handle = tokio::spawn(async move {
        coordinator_for_wait.run_until(Some(duration)).await;
    });

    let producers: Vec<_> = (0..producer_threads.max(1))
        .map(|index| {
            let sink: Arc<dyn EventSink> = sink.clone();
            let token = coordinator.token();
            thread::spawn(move || run_producer(sink, index as u32, event_rate_hz, token))
        })
        .collect();

    wait_handle.await?;
    for producer in producers {
        let _ = producer.join();
    }

    delete_sink(sink, handles);

    let registry = fbtrace::metrics::MetricsRegistry::new();
    registry.sync(statistics.snapshot());
    println!("{}", registry.render());

    Ok(())
}

/// Synthetic stand-in for the instrumented process the real
/// instrumentation engine would be attached to: one thread per
/// producer, each repeatedly issuing a procedure-entry/exit pair at
/// roughly `event_rate_hz`, checking the shared cancellation token
/// between iterations rather than blocking on I/O.
fn run_producer(sink: Arc<dyn EventSink>, thread_id: u32, event_rate_hz: u64, token: fbtrace_bootstrap::shutdown::CancellationToken) {
    let process_id = std::process::id();
    let interval = if event_rate_hz == 0 {
        Duration::from_millis(1)
    } else {
        Duration::from_secs_f64(1.0 / event_rate_hz as f64)
    };
    let procedure = AtomicU32::new(0);

    while !token.is_cancelled() {
        let number = procedure.fetch_add(1, Ordering::Relaxed);
        let ctx = ProcedureContext {
            process_id,
            thread_id,
            caller_ip: 0x1000,
            return_value: 0,
        };
        sink.on_procedure_entry(&ctx, number);
        thread::sleep(interval);
        sink.on_procedure_exit(&ctx, number);
    }
}
