//! Command line interface

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

use crate::app::options::AppOptions;
use crate::logs::{LogLevel, LogOptions};
use crate::utils::LONG_VERSION;

/// Run `make deploy` in a project folder whenever a signed push webhook arrives
#[derive(Debug, Parser)]
#[command(name = "deployd", version = LONG_VERSION, about)]
pub struct Cli {
    /// Project folder containing the Makefile
    #[arg(long)]
    pub project: PathBuf,

    /// Interface and port to listen on
    #[arg(long, default_value = "127.0.0.1:9876")]
    pub host: String,

    /// Github webhook secret
    #[arg(long, env = "DEPLOYD_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Status file
    #[arg(long)]
    pub status_file: PathBuf,

    /// Restrict deployd to only trigger on a specific branch change. A plain
    /// name is matched as refs/heads/<name>; a full reference starting with
    /// refs/ is matched as given
    #[arg(long, default_value = "")]
    pub branch: String,

    /// Verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Seconds to wait for a running deployment when shutting down
    #[arg(long, default_value_t = 300)]
    pub shutdown_timeout: u64,
}

impl Cli {
    /// Logging options selected by the flags
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: if self.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Warn
            },
            json_format: self.json_logs,
            ..Default::default()
        }
    }

    /// Application options selected by the flags
    pub fn into_app_options(self) -> AppOptions {
        let mut options = AppOptions::new(
            self.project,
            SecretString::from(self.secret),
            self.status_file,
        );
        options.branch = self.branch;
        options.server.address = self.host;
        options.lifecycle.max_shutdown_delay = Duration::from_secs(self.shutdown_timeout);
        options
    }
}
