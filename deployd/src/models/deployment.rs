//! Deployment models

use serde::{Deserialize, Serialize};

/// Output recorded before the first deployment ever ran
pub const NOT_STARTED_OUTPUT: &str = "not started";

/// State of the most recent deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// No deployment has run yet
    NotStarted,

    /// A deployment is running
    Started,

    /// The last deployment exited successfully
    Succeeded,

    /// The last deployment failed or could not be launched
    Failed,
}

impl DeploymentState {
    /// Label used in the status file
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentState::NotStarted => "not started",
            DeploymentState::Started => "started",
            DeploymentState::Succeeded => "ok",
            DeploymentState::Failed => "failed",
        }
    }

    /// Parse a status file label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "not started" => Some(DeploymentState::NotStarted),
            "started" => Some(DeploymentState::Started),
            "ok" => Some(DeploymentState::Succeeded),
            "failed" => Some(DeploymentState::Failed),
            _ => None,
        }
    }
}

/// The last known deployment outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    /// Deployment state
    pub state: DeploymentState,

    /// Combined stdout/stderr of the last run
    pub output: String,
}

impl DeploymentStatus {
    pub fn new(state: DeploymentState, output: impl Into<String>) -> Self {
        Self {
            state,
            output: output.into(),
        }
    }

    /// Status of a daemon that has never deployed
    pub fn not_started() -> Self {
        Self::new(DeploymentState::NotStarted, NOT_STARTED_OUTPUT)
    }
}

impl Default for DeploymentStatus {
    fn default() -> Self {
        Self::not_started()
    }
}
