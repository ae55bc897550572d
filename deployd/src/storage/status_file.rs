//! Persisted status record
//!
//! The record is plain text: the state label on the first line, followed by
//! the captured output verbatim (which may itself span many lines).

use std::io::ErrorKind;

use crate::errors::DeploydError;
use crate::filesys::file::File;
use crate::models::deployment::{DeploymentState, DeploymentStatus};

/// Encode a status record
pub fn encode(status: &DeploymentStatus) -> String {
    format!("{}\n{}", status.state.label(), status.output)
}

/// Decode a status record
pub fn decode(raw: &str) -> Result<DeploymentStatus, DeploydError> {
    let (label, output) = raw.split_once('\n').ok_or_else(|| {
        DeploydError::StatusFileError("missing separator after status label".to_string())
    })?;
    let state = DeploymentState::from_label(label).ok_or_else(|| {
        DeploydError::StatusFileError(format!("unknown status label: {:?}", label))
    })?;
    Ok(DeploymentStatus::new(state, output))
}

/// Load the status record, returning `None` when no record exists yet
pub async fn load_status(file: &File) -> Result<Option<DeploymentStatus>, DeploydError> {
    let bytes = match file.read_bytes().await {
        Ok(bytes) => bytes,
        Err(DeploydError::IoError(e)) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let raw = String::from_utf8(bytes)
        .map_err(|e| DeploydError::StatusFileError(format!("not valid UTF-8: {}", e)))?;
    decode(&raw).map(Some)
}

/// Overwrite the status record
pub async fn save_status(file: &File, status: &DeploymentStatus) -> Result<(), DeploydError> {
    file.write_atomic(encode(status).as_bytes()).await
}
