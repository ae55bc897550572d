//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::DeploydError;
use crate::workers::deployer;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Shared webhook secret
    pub secret: SecretString,

    /// File the last deployment status is persisted to
    pub status_file: PathBuf,

    /// Only deploy on pushes to this branch; empty accepts any branch
    pub branch: String,

    /// Server configuration
    pub server: ServerOptions,

    /// Deployer worker options
    pub deployer: deployer::Options,
}

impl AppOptions {
    pub fn new(project_dir: impl Into<PathBuf>, secret: SecretString, status_file: impl Into<PathBuf>) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            secret,
            status_file: status_file.into(),
            branch: String::new(),
            server: ServerOptions::default(),
            deployer: deployer::Options {
                project_dir: project_dir.into(),
                ..Default::default()
            },
        }
    }

    /// Reject option sets the daemon cannot start with
    pub fn validate(&self) -> Result<(), DeploydError> {
        if self.secret.expose_secret().is_empty() {
            return Err(DeploydError::ConfigError(
                "You have to specify a secret using --secret".to_string(),
            ));
        }
        if self.deployer.project_dir.as_os_str().is_empty() {
            return Err(DeploydError::ConfigError(
                "You have to specify a project folder using --project".to_string(),
            ));
        }
        if self.status_file.as_os_str().is_empty() {
            return Err(DeploydError::ConfigError(
                "You have to specify a status file using --status-file".to_string(),
            ));
        }
        if self.server.address.is_empty() {
            return Err(DeploydError::ConfigError(
                "You have to specify an address to listen on using --host".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown, in-flight deployment included
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(300),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Interface and port to listen on
    pub address: String,

    /// Largest accepted request body
    pub max_body_bytes: usize,

    /// Time given to open connections to drain on shutdown
    pub shutdown_grace: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9876".to_string(),
            max_body_bytes: 25 * 1024 * 1024,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
