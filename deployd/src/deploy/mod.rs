//! Deployment module

pub mod builder;
pub mod project;
pub mod slot;
