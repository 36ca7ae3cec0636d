use anyhow::Result;
use clap::{Parser, Subcommand};
use netactivity::config::{AppConfig, ServerConfig};
use netactivity::models::ActivitySignal;
use netactivity::poller::{self, PollerConfig};
use netactivity::publisher::Publisher;
use netactivity::sampler::NetDevSampler;
use netactivity::{routes, worker};
use std::path::PathBuf;
use tokio::sync::{oneshot, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

/// Samples interface traffic and publishes the per-tick byte delta to a tmpfs record.
#[derive(Parser)]
#[command(name = "netactivity", version, about)]
struct Args {
    /// Network interface to monitor (overrides monitoring.interface).
    interface: Option<String>,

    /// Config file (default: $CONFIG_FILE, then /etc/netactivity.toml if present).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Ignored when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the published record and log active/inactive transitions.
    Poll {
        /// Values strictly above this count as active (default: consumer.threshold).
        #[arg(long)]
        threshold: Option<u64>,

        /// Poll cadence in milliseconds (default: consumer.poll_interval_ms).
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let app_config = AppConfig::load(args.config.as_deref())?.with_interface(args.interface)?;

    match args.command {
        Some(Command::Poll {
            threshold,
            interval_ms,
        }) => run_poller(app_config, threshold, interval_ms).await,
        None => run_daemon(app_config).await,
    }
}

async fn run_daemon(app_config: AppConfig) -> Result<()> {
    let publisher = Publisher::new(&app_config.publishing.path, app_config.publishing.mode);
    publisher.prepare()?;
    if let Some(link) = &app_config.publishing.link_path {
        publisher.ensure_link(link)?;
    }
    let sampler = NetDevSampler::new(&app_config.monitoring.proc_net_dev);

    tracing::info!(
        interface = %app_config.monitoring.interface,
        source = %sampler.source().display(),
        record = %publisher.target().display(),
        sample_interval_ms = app_config.monitoring.sample_interval_ms,
        "Starting activity sampler"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut worker_handle = worker::spawn(
        worker::WorkerDeps {
            sampler,
            publisher,
            shutdown_rx,
        },
        worker::WorkerConfig {
            interface: app_config.monitoring.interface.clone(),
            sample_interval_ms: app_config.monitoring.sample_interval_ms,
            read_timeout_ms: app_config.monitoring.read_timeout_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
            retry: (&app_config.retry).into(),
        },
    );

    let server = serve(
        app_config.server.clone(),
        app_config.publishing.path.clone(),
        app_config.consumer.threshold,
    );

    tokio::select! {
        result = &mut worker_handle => {
            // The worker only ends on its own for unrecoverable failures.
            return result.map_err(|e| anyhow::anyhow!("worker task: {}", e))?;
        }
        result = server => {
            result?;
            tracing::warn!("HTTP server stopped; shutting down sampler");
            let _ = shutdown_tx.send(());
            worker_handle.await??;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            worker_handle.await??;
        }
    }

    Ok(())
}

/// Serves the read-only HTTP access path when enabled; otherwise never completes.
async fn serve(server: ServerConfig, record_path: PathBuf, threshold: u64) -> Result<()> {
    if !server.enabled {
        std::future::pending::<()>().await;
        return Ok(());
    }
    let app = routes::app(record_path, threshold);
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_poller(
    app_config: AppConfig,
    threshold: Option<u64>,
    interval_ms: Option<u64>,
) -> Result<()> {
    let threshold = threshold.unwrap_or(app_config.consumer.threshold);
    let poll_interval_ms = interval_ms.unwrap_or(app_config.consumer.poll_interval_ms);
    anyhow::ensure!(poll_interval_ms > 0, "--interval-ms must be > 0");

    let path = app_config
        .publishing
        .link_path
        .clone()
        .unwrap_or_else(|| app_config.publishing.path.clone());
    tracing::info!(record = %path.display(), threshold, poll_interval_ms, "Polling activity record");

    let (signal_tx, mut signal_rx) = watch::channel(ActivitySignal::NoSignal);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = poller::spawn(
        PollerConfig {
            path,
            poll_interval_ms,
            threshold,
        },
        signal_tx,
        shutdown_rx,
    );

    let transitions = async {
        while signal_rx.changed().await.is_ok() {
            let signal = *signal_rx.borrow_and_update();
            tracing::info!(signal = ?signal, "activity");
        }
    };

    tokio::select! {
        _ = transitions => {}
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }
    let _ = shutdown_tx.send(());
    handle.await?;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
