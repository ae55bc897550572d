//! Deployment status tracking

pub mod store;
