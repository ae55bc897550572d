//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions, ServerOptions};
use crate::deploy::builder::CommandBuilder;
use crate::deploy::project::check_project_dir;
use crate::deploy::slot::{self, JobSlot};
use crate::errors::DeploydError;
use crate::filesys::file::File;
use crate::models::deployment::DeploymentStatus;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::status::store::{StatusHandle, StatusStore};
use crate::storage::status_file::load_status;
use crate::workers::deployer;

/// Run deployd until `shutdown_signal` resolves or the HTTP server fails
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeploydError> {
    info!("Initializing deployd...");
    options.validate()?;

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<DeploydError>(3);
    let mut shutdown_manager = ShutdownManager::new(
        shutdown_tx.clone(),
        options.lifecycle.clone(),
        options.server.shutdown_grace,
    );

    if let Err(e) = init(options, &shutdown_tx, fatal_tx, &mut shutdown_manager).await {
        error!("Failed to start deployd: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    let fatal = tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
            None
        }
        Some(e) = fatal_rx.recv() => {
            error!("Fatal error, shutting down: {}", e);
            Some(e)
        }
    };

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await?;

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    fatal_tx: mpsc::Sender<DeploydError>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeploydError> {
    check_project_dir(&options.deployer.project_dir).await?;

    let status_file = File::new(&options.status_file);
    let initial = load_initial_status(&status_file).await?;
    let status = init_status_store(initial, status_file, shutdown_manager)?;

    let slot = init_deployer_worker(
        options.deployer.clone(),
        status.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    let server_state = ServerState::new(options.secret, &options.branch, status, slot);
    init_http_server(
        &options.server,
        server_state,
        fatal_tx,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await
}

async fn load_initial_status(file: &File) -> Result<DeploymentStatus, DeploydError> {
    match load_status(file).await {
        Ok(Some(status)) => {
            info!(
                "Loaded last status '{}' from {}",
                status.state.label(),
                file.path().display()
            );
            Ok(status)
        }
        Ok(None) => {
            info!("No status file at {}, starting fresh", file.path().display());
            Ok(DeploymentStatus::not_started())
        }
        Err(e) => Err(DeploydError::StatusFileError(format!(
            "failed to load {}: {}",
            file.path().display(),
            e
        ))),
    }
}

fn init_status_store(
    initial: DeploymentStatus,
    file: File,
    shutdown_manager: &mut ShutdownManager,
) -> Result<StatusHandle, DeploydError> {
    info!("Initializing status store...");

    // Stopped by the shutdown manager once every writer has finished
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (status, handle) = StatusStore::spawn(
        initial,
        file,
        Box::pin(async move {
            let _ = stop_rx.await;
        }),
    );

    shutdown_manager.with_status_store(stop_tx, handle)?;
    Ok(status)
}

fn init_deployer_worker(
    options: deployer::Options,
    status: StatusHandle,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<JobSlot, DeploydError> {
    info!(
        "Initializing deployer worker for {}...",
        options.project_dir.display()
    );

    let (slot, mut triggers) = slot::channel();
    let builder = CommandBuilder::new(options.program, options.args, options.project_dir);

    let deployer_handle = tokio::spawn(async move {
        deployer::run(
            &builder,
            &status,
            &mut triggers,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_deployer_worker_handle(deployer_handle)?;
    Ok(slot)
}

async fn init_http_server(
    options: &ServerOptions,
    server_state: ServerState,
    fatal_tx: mpsc::Sender<DeploydError>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeploydError> {
    info!("Initializing HTTP server...");

    let server_handle = serve(
        options,
        Arc::new(server_state),
        async move {
            let _ = shutdown_rx.recv().await;
        },
        fatal_tx,
    )
    .await?;

    shutdown_manager.with_http_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct StatusStoreShutdownParams {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    server_grace: Duration,
    http_server_handle: Option<JoinHandle<()>>,
    deployer_worker_handle: Option<JoinHandle<()>>,
    status_store: Option<StatusStoreShutdownParams>,
}

impl ShutdownManager {
    pub fn new(
        shutdown_tx: broadcast::Sender<()>,
        lifecycle_options: LifecycleOptions,
        server_grace: Duration,
    ) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            server_grace,
            http_server_handle: None,
            deployer_worker_handle: None,
            status_store: None,
        }
    }

    pub fn with_status_store(
        &mut self,
        stop_tx: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    ) -> Result<(), DeploydError> {
        if self.status_store.is_some() {
            return Err(DeploydError::ShutdownError("status_store already set".to_string()));
        }
        self.status_store = Some(StatusStoreShutdownParams { stop_tx, handle });
        Ok(())
    }

    pub fn with_deployer_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DeploydError> {
        if self.deployer_worker_handle.is_some() {
            return Err(DeploydError::ShutdownError("deployer_handle already set".to_string()));
        }
        self.deployer_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_http_server_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DeploydError> {
        if self.http_server_handle.is_some() {
            return Err(DeploydError::ShutdownError("server_handle already set".to_string()));
        }
        self.http_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DeploydError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DeploydError> {
        info!("Shutting down deployd...");

        // 1. HTTP server, given a short grace period to drain connections
        if let Some(mut handle) = self.http_server_handle.take() {
            match tokio::time::timeout(self.server_grace, &mut handle).await {
                Ok(result) => result.map_err(|e| DeploydError::ShutdownError(e.to_string()))?,
                Err(_) => {
                    warn!(
                        "HTTP server did not drain within {:?}, closing remaining connections",
                        self.server_grace
                    );
                    handle.abort();
                }
            }
        }

        // 2. Deployer worker, which finishes any deployment in progress
        if let Some(handle) = self.deployer_worker_handle.take() {
            handle.await.map_err(|e| DeploydError::ShutdownError(e.to_string()))?;
        }

        // 3. Status store, after the last status has been queued
        if let Some(store) = self.status_store.take() {
            let _ = store.stop_tx.send(());
            store
                .handle
                .await
                .map_err(|e| DeploydError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
