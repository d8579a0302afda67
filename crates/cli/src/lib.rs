//! Ring inspection tool for cache cluster configurations.
//!
//! Builds the same ring a client would build from a server list and
//! options, without connecting to anything, and answers:
//! - which server a key routes to
//! - how many points and how much key space each server owns
//! - how the server list was parsed

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
