//! Server state

use secrecy::SecretString;

use crate::deploy::slot::JobSlot;
use crate::models::event::branch_ref;
use crate::status::store::StatusHandle;

/// Server state shared across handlers
pub struct ServerState {
    /// Shared webhook secret
    pub secret: SecretString,

    /// Fully qualified reference accepted for deployments, if filtering
    pub branch_ref: Option<String>,

    /// Status store handle
    pub status: StatusHandle,

    /// Deployment slot
    pub slot: JobSlot,
}

impl ServerState {
    /// An empty `branch` accepts pushes to any branch
    pub fn new(secret: SecretString, branch: &str, status: StatusHandle, slot: JobSlot) -> Self {
        let branch_ref = if branch.is_empty() {
            None
        } else {
            Some(branch_ref(branch))
        };

        Self {
            secret,
            branch_ref,
            status,
            slot,
        }
    }
}
