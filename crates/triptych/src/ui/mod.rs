//! Presentation layer: the command-line front end.

pub mod cli;
