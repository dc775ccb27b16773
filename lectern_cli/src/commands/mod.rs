//! CLI subcommand implementations.

pub mod cache;
pub mod config;
pub mod limit;
