//! Application layer orchestrating domain logic and infrastructure.

pub mod classify;
pub mod matcher;
pub mod resolve;
pub mod session;
pub mod split;
