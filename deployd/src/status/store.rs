//! Status store actor
//!
//! The store is the single owner of the last known [`DeploymentStatus`]. Every
//! read and write goes through its command channel, so a `Get` issued after a
//! `Save` always observes that save. Each save is persisted before the next
//! command is handled; a failed write is logged and the in-memory value stays
//! authoritative.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::DeploydError;
use crate::filesys::file::File;
use crate::models::deployment::{DeploymentState, DeploymentStatus};
use crate::storage::status_file::save_status;

/// Capacity of the status command channel
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Message handled by the status store
#[derive(Debug)]
pub enum StatusCommand {
    /// Overwrite and persist the current status
    Save(DeploymentStatus),

    /// Reply with a snapshot of the current status
    Get(oneshot::Sender<DeploymentStatus>),
}

/// Cloneable handle used to talk to the status store
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<StatusCommand>,
}

impl StatusHandle {
    /// Record a new status. Returns once the command is queued.
    pub async fn save(
        &self,
        state: DeploymentState,
        output: impl Into<String>,
    ) -> Result<(), DeploydError> {
        self.tx
            .send(StatusCommand::Save(DeploymentStatus::new(state, output)))
            .await
            .map_err(|_| DeploydError::StatusStoreClosed("save rejected".to_string()))
    }

    /// Fetch the current status
    pub async fn get(&self) -> Result<DeploymentStatus, DeploydError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StatusCommand::Get(reply_tx))
            .await
            .map_err(|_| DeploydError::StatusStoreClosed("get rejected".to_string()))?;
        reply_rx
            .await
            .map_err(|_| DeploydError::StatusStoreClosed("no reply".to_string()))
    }
}

/// The status store actor
pub struct StatusStore {
    status: DeploymentStatus,
    file: File,
    rx: mpsc::Receiver<StatusCommand>,
}

impl StatusStore {
    /// Spawn the store with its initial status
    pub fn spawn(
        initial: DeploymentStatus,
        file: File,
        shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> (StatusHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let store = Self {
            status: initial,
            file,
            rx,
        };
        let handle = tokio::spawn(store.run(shutdown_signal));
        (StatusHandle { tx }, handle)
    }

    async fn run(mut self, mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>) {
        info!(
            "Status store starting with last status '{}'",
            self.status.state.label()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    self.drain().await;
                    break;
                }
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
            }
        }

        info!("Status store stopped");
    }

    /// Handle commands that were queued before shutdown
    async fn drain(&mut self) {
        self.rx.close();
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd).await;
        }
    }

    async fn handle(&mut self, cmd: StatusCommand) {
        match cmd {
            StatusCommand::Save(status) => {
                debug!("Saving status '{}'", status.state.label());
                self.status = status;
                if let Err(e) = save_status(&self.file, &self.status).await {
                    error!(
                        "Failed to write status file {}: {}",
                        self.file.path().display(),
                        e
                    );
                }
            }
            StatusCommand::Get(reply) => {
                // The requester may have gone away; nothing to do then.
                let _ = reply.send(self.status.clone());
            }
        }
    }
}
