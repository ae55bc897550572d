//! Project folder validation

use std::path::Path;

use tokio::fs;

use crate::errors::DeploydError;

/// Build descriptor expected in the project folder
pub const BUILD_DESCRIPTOR: &str = "Makefile";

/// Check that the project folder contains a build descriptor
pub async fn check_project_dir(project_dir: &Path) -> Result<(), DeploydError> {
    let descriptor = project_dir.join(BUILD_DESCRIPTOR);
    match fs::metadata(&descriptor).await {
        Ok(_) => Ok(()),
        Err(e) => Err(DeploydError::InvalidProject(format!(
            "{}: {}",
            descriptor.display(),
            e
        ))),
    }
}
