//! wayfinderd — the Wayfinder daemon and operator CLI.
//!
//! # Usage
//!
//! ```text
//! wayfinderd run --config wayfinder.toml --data-dir /var/lib/wayfinder
//! wayfinderd refresh
//! wayfinderd resolve ar://ardrive --require-name-resolution
//! wayfinderd show
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wayfinder_core::{ResolutionRequest, ResolvePolicy};
use wayfinder_refresh::{Tick, TickOutcome, TokioTimers};
use wayfinder_resolve::Resolver;
use wayfinderd::{
    ApiState, build_router, build_scheduler, load_config, open_store, open_store_or_empty,
};

#[derive(Parser)]
#[command(name = "wayfinderd", about = "Wayfinder gateway cache and resolver")]
struct Cli {
    /// Path to wayfinder.toml (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the persistent cache.
    #[arg(long, global = true, default_value = "/var/lib/wayfinder")]
    data_dir: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the refresh loop and the resolve endpoint.
    Run {
        /// Override `[server] listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Run one refresh cycle now and print the outcome.
    Refresh,
    /// Resolve a reference against the cached ranking.
    Resolve {
        reference: String,
        #[arg(long)]
        require_name_resolution: bool,
        #[arg(long)]
        require_stake: bool,
    },
    /// Print the cached snapshot as JSON.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run { listen } => {
            let listen = match listen {
                Some(addr) => addr,
                None => config
                    .server
                    .listen
                    .parse()
                    .with_context(|| format!("invalid listen address {}", config.server.listen))?,
            };
            run_daemon(config, &cli.data_dir, listen).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Refresh => {
            let store = open_store(&cli.data_dir)?;
            // Timers are dropped with this process; a retry is not awaited.
            let (tick_tx, _tick_rx) = mpsc::channel(1);
            let timers = Arc::new(TokioTimers::new(tick_tx));
            let scheduler = build_scheduler(&config, store, timers)?;

            let outcome = scheduler.handle_tick(Tick::Manual).await;
            println!("{outcome:?}");
            Ok(match outcome {
                TickOutcome::Refreshed { .. } => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
        Command::Resolve {
            reference,
            require_name_resolution,
            require_stake,
        } => {
            let store = open_store_or_empty(&cli.data_dir);
            let resolver = Resolver::from_config(store, &config);
            let request = ResolutionRequest::new(
                reference,
                ResolvePolicy {
                    require_name_resolution,
                    require_stake,
                },
            );
            Ok(match resolver.resolve(&request) {
                Some(resolution) => {
                    println!("{}", resolution.url);
                    ExitCode::SUCCESS
                }
                None => ExitCode::FAILURE,
            })
        }
        Command::Show => {
            let store = open_store_or_empty(&cli.data_dir);
            println!("{}", serde_json::to_string_pretty(&*store.get())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wayfinder=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_daemon(
    config: wayfinder_core::WayfinderConfig,
    data_dir: &Path,
    listen: SocketAddr,
) -> anyhow::Result<()> {
    info!("Wayfinder daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(data_dir)?;

    let (tick_tx, tick_rx) = mpsc::channel(16);
    let timers = Arc::new(TokioTimers::new(tick_tx.clone()));
    let scheduler = Arc::new(build_scheduler(&config, store.clone(), timers)?);
    let resolver = Resolver::from_config(store.clone(), &config);
    info!(scheme = resolver.scheme(), "resolver initialized");

    // ── Start background tasks ─────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(tick) = scheduler.start() {
        info!("no cached gateways; refreshing now");
        tick_tx.send(tick).await?;
    }
    let refresh_handle = tokio::spawn(scheduler.clone().run(tick_rx, shutdown_rx));

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState {
        resolver,
        store,
        scheduler: Some(scheduler),
    });

    info!(%listen, "API server starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = refresh_handle.await;
    info!("Wayfinder daemon stopped");
    Ok(())
}
