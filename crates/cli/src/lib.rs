//! Recplay CLI
//!
//! Command-line interface for recording browser sessions, managing saved
//! tests and replaying them, either through the daemon or locally.

pub mod client;
pub mod commands;
pub mod output;
