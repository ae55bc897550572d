//! Persistent storage

pub mod status_file;
