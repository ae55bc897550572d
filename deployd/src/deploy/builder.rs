//! External build step

use std::io::Read;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Default build executable
pub const DEFAULT_PROGRAM: &str = "/usr/bin/make";

/// Default build arguments
pub const DEFAULT_ARGS: &[&str] = &["deploy"];

/// Result of one build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Whether the build exited with status zero
    pub success: bool,

    /// Combined stdout and stderr
    pub output: String,
}

impl BuildOutcome {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Something that runs one build to completion
#[async_trait]
pub trait Builder: Send + Sync {
    /// Run the build. Never fails: launch errors become a failed outcome.
    async fn build(&self) -> BuildOutcome;
}

/// Runs an external command in the project folder
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    args: Vec<String>,
    project_dir: PathBuf,
}

impl CommandBuilder {
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            project_dir: project_dir.into(),
        }
    }

    fn describe(&self) -> String {
        let mut cmd = self.program.display().to_string();
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        cmd
    }
}

#[async_trait]
impl Builder for CommandBuilder {
    async fn build(&self) -> BuildOutcome {
        info!("Running '{}' in {}", self.describe(), self.project_dir.display());

        // Both streams share one pipe so the output keeps the order it was written in
        let (mut reader, stdout_writer) = match os_pipe::pipe() {
            Ok(pipe) => pipe,
            Err(e) => {
                error!("Failed to create output pipe: {}", e);
                return BuildOutcome::failed(format!("Failed to launch {}: {}", self.describe(), e));
            }
        };
        let stderr_writer = match stdout_writer.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                error!("Failed to create output pipe: {}", e);
                return BuildOutcome::failed(format!("Failed to launch {}: {}", self.describe(), e));
            }
        };

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(stdout_writer)
            .stderr(stderr_writer);
        let spawned = command.spawn();
        // Release our copies of the write end, or the reader never sees EOF
        drop(command);

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to launch '{}': {}", self.describe(), e);
                return BuildOutcome::failed(format!("Failed to launch {}: {}", self.describe(), e));
            }
        };

        let read = tokio::task::spawn_blocking(move || {
            let mut combined = Vec::new();
            let result = reader.read_to_end(&mut combined);
            (combined, result)
        })
        .await;
        let combined = match read {
            Ok((combined, Ok(_))) => combined,
            Ok((combined, Err(e))) => {
                error!("Failed to read build output: {}", e);
                combined
            }
            Err(e) => {
                error!("Build output reader failed: {}", e);
                Vec::new()
            }
        };

        let output = String::from_utf8_lossy(&combined).into_owned();
        match child.wait().await {
            Ok(status) if status.success() => {
                debug!("Build exited with {}", status);
                BuildOutcome::succeeded(output)
            }
            Ok(status) => {
                debug!("Build exited with {}", status);
                BuildOutcome::failed(output)
            }
            Err(e) => {
                error!("Failed to wait for build: {}", e);
                BuildOutcome::failed(output)
            }
        }
    }
}
