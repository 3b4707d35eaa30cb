#![doc = include_str!("../README.md")]

mod config;
mod load;
mod telemetry;

use clap::Parser;
use config::{CliArgs, LoadConfig};
use telemetry::init_telemetry;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = LoadConfig::try_from(args)?;

    init_telemetry(config.log_json)?;
    log_startup_info(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime_threads)
        .enable_all()
        .build()?;

    let summary = runtime.block_on(load::run(&config, shutdown_signal()))?;
    summary.log();
    Ok(())
}

fn log_startup_info(config: &LoadConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting load run: {} tasks on {} permanent workers",
            config.tasks,
            config.pool.min_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
