#![doc = include_str!("../README.md")]

mod server;

use std::{future::IntoFuture, sync::Arc};

use anyhow::Context;
use clap::Parser;
use serialbox::SerialBox;
use server::config::{CliArgs, ServerConfig};
use server::seed::Seed;
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let serialbox = build_serialbox(&config)?;
    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config);

    let result = run_server(listener, serialbox, &config).await;
    providers.shutdown();
    result
}

fn build_serialbox(config: &ServerConfig) -> anyhow::Result<Arc<SerialBox>> {
    let serialbox = server::executors::register(SerialBox::builder(), config.expand_limit)
        .config(config.serialbox.clone())
        .build()
        .context("invalid serialbox configuration")?;

    if let Some(path) = &config.seed_file {
        let summary = Seed::from_file(path)?.apply(serialbox.admin())?;
        tracing::info!(
            pools = summary.pools,
            regions = summary.regions,
            response_rules = summary.response_rules,
            "loaded seed fixture from {}",
            path.display()
        );
    }
    Ok(Arc::new(serialbox))
}

async fn run_server(
    listener: TcpListener,
    serialbox: Arc<SerialBox>,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let (signalled_tx, signalled_rx) = oneshot::channel();
    let serve = axum::serve(listener, server::routes::router(serialbox))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        res = &mut serve => res?,
        _ = signalled_rx => {
            match tokio::time::timeout(config.shutdown_timeout, &mut serve).await {
                Ok(res) => res?,
                Err(_) => tracing::warn!(
                    timeout = ?config.shutdown_timeout,
                    "in-flight requests did not finish in time, exiting"
                ),
            }
        }
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting serialbox on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting serialbox on {} with {:?} overlap checks",
            config.server_addr,
            config.serialbox.overlap_check
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
