//! deployd library
//!
//! Core modules for the webhook-triggered deployment daemon.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod status;
pub mod storage;
pub mod utils;
pub mod workers;
