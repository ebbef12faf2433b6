//! Configuration loading and discovery for `assetline.toml`
//!
//! Provides functions to find, load, and merge configuration. A mode-specific
//! override is deep-merged over the base configuration before it is
//! deserialized, replacing the "base config + merge utility" pattern with a
//! single documented merge function ([`deep_merge`]).

use super::schema::{
    default_rules, AssetConfig, BuildSection, CssConfig, ProfilesConfig, ProjectConfig,
    ServeConfig, TemplatesConfig, WatchConfig,
};
use crate::mode::RunMode;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Value;

/// Config file name searched for when no path is given.
pub const CONFIG_FILENAME: &str = "assetline.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing error
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Merged document does not match the schema
    #[error("Invalid configuration: {0}")]
    Schema(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", bullet_list(.0))]
    Validation(Vec<String>),
}

fn bullet_list(errors: &[String]) -> String {
    errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override source directory
    pub src: Option<PathBuf>,
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Dev server port
    pub port: Option<u16>,
    /// Dev server host
    pub host: Option<String>,
}

/// Find assetline.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetline.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration for a run mode.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`]. If no config file is found, returns [`default_config`].
///
/// The effective mode is `mode` if given, else `build.mode` from the file.
/// Overrides for that mode are merged in this order:
/// 1. the `[env.<mode>]` table of the main file
/// 2. a sibling `assetline.<mode>.toml`, if present
pub fn load_config(path: Option<&Path>, mode: Option<RunMode>) -> Result<AssetConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p, mode),
        None => {
            let mut config = default_config();
            if let Some(mode) = mode {
                config.build.mode = mode;
            }
            Ok(config)
        }
    }
}

fn read_toml(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    toml::from_str(&contents)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

fn load_config_file(path: &Path, mode: Option<RunMode>) -> Result<AssetConfig, ConfigError> {
    let mut document = read_toml(path)?;

    let mode = match mode {
        Some(mode) => mode,
        None => document
            .get("build")
            .and_then(|b| b.get("mode"))
            .and_then(|m| m.as_str())
            .map(|m| m.parse::<RunMode>())
            .transpose()
            .map_err(|e| ConfigError::Validation(vec![format!("build.mode: {}", e)]))?
            .unwrap_or_default(),
    };

    let env_override = document
        .as_table_mut()
        .and_then(|t| t.remove("env"))
        .and_then(|env| env.get(mode.as_str()).cloned());
    if let Some(overlay) = env_override {
        deep_merge(&mut document, overlay);
    }

    let sibling = path.with_file_name(format!("assetline.{}.toml", mode.as_str()));
    if sibling.exists() {
        let overlay = read_toml(&sibling)?;
        deep_merge(&mut document, overlay);
    }

    let mut config: AssetConfig = document.try_into()?;
    config.build.mode = mode;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Deep-merge `overlay` into `base`.
///
/// Tables merge key by key, recursively. Any other value in the overlay
/// (scalars and arrays alike) replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Create a default configuration when no assetline.toml is found.
///
/// Uses the built-in rule table and names the project after the current
/// directory.
pub fn default_config() -> AssetConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    AssetConfig {
        project: ProjectConfig {
            name: project_name,
            src: PathBuf::from("src"),
            out: PathBuf::from("build"),
        },
        build: BuildSection::default(),
        rules: default_rules(),
        profiles: ProfilesConfig::default(),
        css: CssConfig::default(),
        templates: TemplatesConfig::default(),
        watch: WatchConfig::default(),
        serve: ServeConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut AssetConfig, overrides: &CliOverrides) {
    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(jobs) = overrides.jobs {
        config.build.jobs = Some(jobs.max(1));
    }

    if let Some(port) = overrides.port {
        config.serve.port = port;
    }

    if let Some(ref host) = overrides.host {
        config.serve.host = host.clone();
    }
}
