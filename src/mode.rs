//! Run modes and the optional-stage flags they select.
//!
//! The mode never changes the shape of a pipeline. It only decides which
//! optional stages run, and components consult [`StageFlags`] rather than
//! the mode itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ProfileConfig;

/// Configuration variant for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fast, unminified, source-mapped builds
    #[default]
    Development,
    /// Minified builds with content-hashed file names
    Production,
}

impl RunMode {
    /// Lowercase name, matching the serde representation and `[env.*]` keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(RunMode::Development),
            "prod" | "production" => Ok(RunMode::Production),
            other => Err(format!("unknown mode '{}' (expected development or production)", other)),
        }
    }
}

/// Which optional stages are active for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    /// Run `Stage::Minify` units and minify inside units that support it
    pub minify: bool,
    /// Emit source maps next to scripts and styles
    pub source_maps: bool,
    /// Render `[hash]` tokens in output templates
    pub hash_names: bool,
    /// Replace the output directory instead of merging into it
    pub clean: bool,
}

impl StageFlags {
    /// Default flags for a mode.
    pub fn for_mode(mode: RunMode) -> Self {
        match mode {
            RunMode::Development => {
                Self { minify: false, source_maps: true, hash_names: false, clean: true }
            }
            RunMode::Production => {
                Self { minify: true, source_maps: false, hash_names: true, clean: true }
            }
        }
    }

    /// Apply per-profile overrides from the configuration.
    pub fn with_profile(mut self, profile: &ProfileConfig) -> Self {
        if let Some(minify) = profile.minify {
            self.minify = minify;
        }
        if let Some(source_maps) = profile.source_maps {
            self.source_maps = source_maps;
        }
        if let Some(hash_names) = profile.hash_names {
            self.hash_names = hash_names;
        }
        if let Some(clean) = profile.clean {
            self.clean = clean;
        }
        self
    }
}
