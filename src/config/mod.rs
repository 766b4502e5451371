//! Configuration module for luac-batch
//!
//! Provides types and parsing for `luac-batch.toml` run configuration.

pub mod loader;
pub mod schema;

pub use loader::{load_config, merge_cli_overrides, CliOverrides, ConfigError};
pub use schema::*;
