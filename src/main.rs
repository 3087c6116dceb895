use anyhow::Result;
use clap::Parser;
use loadwatch::config::{AppConfig, StatsBackend};
use loadwatch::context::RunContext;
use loadwatch::docker_repo::{DockerCli, DockerRepo, StatsSource};
use loadwatch::finalizer::FinalizeOutcome;
use loadwatch::sysinfo_repo::SysinfoRepo;
use loadwatch::worker::{Session, SessionReport};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Samples container CPU, memory and process counts while a load test runs.
/// Stop with Ctrl-C; results are written to the configured output directory.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Architecture label (e.g. base, cache, search, proxy, full)
    arch: Option<String>,
    /// Number of simulated users in this test
    users: Option<String>,
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

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let args = Args::parse();
    let app_config = AppConfig::load()?;

    let arch = match args.arch {
        Some(a) => a,
        None => prompt("Architecture name (base/cache/search/proxy/full)")?,
    };
    let users = match args.users {
        Some(u) => u,
        None => prompt("Number of users")?,
    };

    let started_at = chrono::Local::now().naive_local();
    let ctx = RunContext::from_config(&app_config, &arch, &users, started_at);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        arch = %ctx.arch,
        users = %ctx.users,
        backend = ?app_config.sampling.backend,
        "start your load test now; press Ctrl-C to stop and save results"
    );

    let signals = tokio::spawn(listen_for_shutdown(ctx.stop_token()));

    let system = app_config
        .sampling
        .system_stats
        .then(|| Arc::new(SysinfoRepo::new()));
    let timeout = Duration::from_millis(app_config.sampling.runtime_timeout_ms);

    let report = match app_config.sampling.backend {
        StatsBackend::Api => run_session(ctx, DockerRepo::connect(timeout)?, system).await?,
        StatsBackend::Cli => {
            let cli = DockerCli::new(app_config.sampling.docker_binary.clone(), timeout);
            run_session(ctx, cli, system).await?
        }
    };
    signals.abort();

    if report.failed_writes > 0 {
        tracing::warn!(
            failed_writes = report.failed_writes,
            "some intermediate time series writes failed"
        );
    }
    match report.outcome {
        FinalizeOutcome::NothingToSave => {
            tracing::info!("no data to save");
        }
        FinalizeOutcome::Saved(artifacts) => {
            tracing::info!(
                samples = report.samples,
                timeseries = %artifacts.timeseries.display(),
                tabular = %artifacts.tabular.display(),
                summary = %artifacts.summary.display(),
                "results saved"
            );
        }
    }

    Ok(())
}

async fn run_session<S: StatsSource>(
    ctx: RunContext,
    source: S,
    system: Option<Arc<SysinfoRepo>>,
) -> Result<SessionReport> {
    Session::new(ctx, source, system).run().await
}

/// Cancels `stop` on SIGINT/SIGTERM. Later signals are only logged.
async fn listen_for_shutdown(stop: CancellationToken) {
    loop {
        if let Err(e) = shutdown_signal().await {
            tracing::warn!(error = %e, "cannot listen for shutdown signals");
            return;
        }
        if stop.is_cancelled() {
            tracing::info!("shutdown already in progress");
        } else {
            tracing::info!("Received shutdown signal; stopping collection");
            stop.cancel();
        }
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    anyhow::ensure!(!value.is_empty(), "{} must not be empty", label);
    Ok(value)
}
