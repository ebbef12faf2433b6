//! Assetline - declarative multi-stage asset pipeline
//!
//! This library provides functionality to:
//! - Load an `assetline.toml` rule table with per-mode overrides
//! - Run every source through the transform chain of its first matching rule
//! - Publish hashed outputs and an asset manifest atomically
//! - Rebuild incrementally on change and serve the output root

pub mod artifact;
pub mod build;
pub mod cli;
pub mod config;
pub mod mode;
pub mod output;
pub mod rules;
#[cfg(feature = "serve")]
pub mod serve;
pub mod transforms;
pub mod watch;
