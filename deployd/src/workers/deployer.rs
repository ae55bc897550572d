//! Deployment worker
//!
//! Consumes triggers one at a time and runs the build to completion before
//! looking at the next one. Shutdown is only observed between deployments, so
//! an in-flight build always finishes and records its outcome.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::deploy::builder::{Builder, DEFAULT_ARGS, DEFAULT_PROGRAM};
use crate::deploy::slot::Trigger;
use crate::models::deployment::DeploymentState;
use crate::status::store::StatusHandle;

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Folder the build runs in
    pub project_dir: PathBuf,

    /// Build executable
    pub program: PathBuf,

    /// Build arguments
    pub args: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::new(),
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: DEFAULT_ARGS.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

/// Run the deployer worker
pub async fn run<B>(
    builder: &B,
    status: &StatusHandle,
    triggers: &mut mpsc::Receiver<Trigger>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    B: Builder + ?Sized,
{
    info!("Deployer worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                return;
            }
            trigger = triggers.recv() => match trigger {
                Some(trigger) => {
                    info!("Got a deployment to run");
                    deploy(builder, status).await;
                    // Releases the slot only after the outcome is recorded
                    drop(trigger);
                }
                None => {
                    info!("Trigger channel closed, deployer worker stopping...");
                    return;
                }
            },
        }
    }
}

/// Run one deployment cycle, recording each transition
pub async fn deploy<B>(builder: &B, status: &StatusHandle)
where
    B: Builder + ?Sized,
{
    // Must be queued before the build starts so readers see it while running
    if let Err(e) = status.save(DeploymentState::Started, "").await {
        error!("Failed to record deployment start: {}", e);
    }

    let outcome = builder.build().await;
    debug!(target: "job_output", "{}", outcome.output);

    let state = if outcome.success {
        info!("Deployment completed");
        DeploymentState::Succeeded
    } else {
        warn!("Deployment failed");
        DeploymentState::Failed
    };

    if let Err(e) = status.save(state, outcome.output).await {
        error!("Failed to record deployment outcome: {}", e);
    }
}
