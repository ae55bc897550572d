//! Request authentication

pub mod signature;
