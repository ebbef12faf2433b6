//! Build context containing configuration and state for a run.

use crate::config::AssetConfig;
use crate::mode::{RunMode, StageFlags};
use crate::transforms::TransformOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build context containing configuration and paths for a pipeline run.
///
/// The run mode is fixed when the context is created; every component reads
/// the derived [`StageFlags`] instead of consulting the mode.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: AssetConfig,
    /// Project root directory (where assetline.toml is located)
    project_root: PathBuf,
    /// Run mode, taken from `build.mode`
    mode: RunMode,
    /// Optional stages selected by the mode and profile overrides
    flags: StageFlags,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration (already merged for its mode)
    /// - `project_root` - The project root directory
    pub fn new(config: AssetConfig, project_root: PathBuf) -> Self {
        let mode = config.build.mode;
        let flags = StageFlags::for_mode(mode).with_profile(config.profiles.for_mode(mode));
        Self { config, project_root, mode, flags, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// The run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Active optional stages.
    pub fn flags(&self) -> &StageFlags {
        &self.flags
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override individual stage flags.
    pub fn with_flags(mut self, flags: StageFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of worker threads, if configured.
    pub fn jobs(&self) -> Option<usize> {
        self.config.build.jobs
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Public URL for a destination relative to the output root.
    pub fn public_url(&self, destination: &str) -> String {
        crate::output::public_url(&self.config.build.public_path, destination)
    }

    /// Options handed to transform units, without an asset map.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            minify: self.flags.minify,
            source_maps: self.flags.source_maps,
            mode: self.mode,
            css_targets: self.config.css.targets,
            vars: self.config.templates.vars.clone(),
            assets: Arc::default(),
            public_path: self.config.build.public_path.clone(),
        }
    }
}
