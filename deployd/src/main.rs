//! deployd - Entry Point
//!
//! Listens for signed push webhooks and runs `make deploy` in a project folder,
//! one deployment at a time.

use clap::Parser;
use tracing::{error, info};

use deployd::app::cli::Cli;
use deployd::app::run::run;
use deployd::logs::init_logging;
use deployd::utils::version_info;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = init_logging(cli.log_options()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let version = version_info();
    info!(
        "deployd {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    let options = cli.into_app_options();
    info!("Running deployd with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("deployd stopped with an error: {e}");
        eprintln!("deployd: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
