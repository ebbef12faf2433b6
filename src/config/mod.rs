//! Configuration module for the asset pipeline
//!
//! Provides types and parsing for `assetline.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, deep_merge, find_config, find_config_from, load_config, merge_cli_overrides,
    CliOverrides, ConfigError, CONFIG_FILENAME,
};
pub use schema::*;
