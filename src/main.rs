#![forbid(unsafe_code)]

//! `deckhand` — container control-plane daemon binary.
//!
//! Bootstraps configuration, connects the container engine, and serves the
//! HTTP/WebSocket API until a shutdown signal arrives. Shutdown cancels
//! every live streaming session through the shared token before the server
//! drains.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use deckhand::api::{self, AppState};
use deckhand::config::GlobalConfig;
use deckhand::runtime::docker::DockerEngine;
use deckhand::runtime::ContainerEngine;
use deckhand::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "deckhand", about = "Single-host container control plane", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("deckhand server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => {
            let mut defaults = GlobalConfig::default();
            defaults.validate()?;
            defaults
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Connect the container engine ────────────────────
    // The client is lazy and stateless; per-call failures surface as
    // upstream errors on the endpoints that need it.
    let engine: Arc<dyn ContainerEngine> = Arc::new(DockerEngine::connect()?);
    info!("container engine client ready");

    // ── Build shared application state ──────────────────
    let ct = CancellationToken::new();
    let state = Arc::new(AppState::new(Arc::clone(&config), engine, ct.clone()));
    let router = api::router(state);

    // ── Serve until shutdown ────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .map_err(|err| {
            AppError::Config(format!("failed to bind {}: {err}", config.listen_addr))
        })?;
    info!(addr = %config.listen_addr, "server listening");

    let shutdown_ct = ct.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown_ct.cancel();
        })
        .await
        .map_err(|err| AppError::Config(format!("server error: {err}")))?;

    info!("deckhand shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
