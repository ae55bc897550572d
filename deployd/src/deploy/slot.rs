//! Single deployment slot
//!
//! Triggers travel over a channel of capacity one. Each trigger owns the only
//! slot permit, and the executor drops it once the deployment has finished and
//! its outcome has been recorded. While a deployment is pending or running,
//! further triggers are refused immediately instead of being queued.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Request to run one deployment. Holding it holds the slot.
#[derive(Debug)]
pub struct Trigger {
    _slot: OwnedSemaphorePermit,
}

/// Why a trigger was not scheduled
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("a deployment is already pending or running")]
    Busy,

    #[error("the deployment worker has stopped")]
    Closed,
}

/// Sending side of the deployment slot, shared by request handlers
#[derive(Debug, Clone)]
pub struct JobSlot {
    permits: Arc<Semaphore>,
    tx: mpsc::Sender<Trigger>,
}

/// Create a slot and the receiver the executor consumes triggers from
pub fn channel() -> (JobSlot, mpsc::Receiver<Trigger>) {
    let (tx, rx) = mpsc::channel(1);
    let slot = JobSlot {
        permits: Arc::new(Semaphore::new(1)),
        tx,
    };
    (slot, rx)
}

impl JobSlot {
    /// Claim the slot without waiting
    pub fn try_schedule(&self) -> Result<(), ScheduleError> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => ScheduleError::Busy,
                TryAcquireError::Closed => ScheduleError::Closed,
            })?;

        self.tx
            .try_send(Trigger { _slot: permit })
            .map_err(|e| match e {
                TrySendError::Full(_) => ScheduleError::Busy,
                TrySendError::Closed(_) => ScheduleError::Closed,
            })
    }

    /// Whether a trigger would currently be accepted
    pub fn is_free(&self) -> bool {
        self.permits.available_permits() > 0 && !self.tx.is_closed()
    }
}
