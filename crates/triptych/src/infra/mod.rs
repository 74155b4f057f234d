//! Infrastructure adapters for configuration and the editor host.

pub mod config;
pub mod host;
