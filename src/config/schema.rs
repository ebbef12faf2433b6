//! Configuration schema types for `assetline.toml`
//!
//! Defines the structure and validation rules for project configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::artifact::AssetKind;
use crate::mode::RunMode;

/// What to do with a source file that no rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Copy the file unchanged using `build.passthrough_output`
    #[default]
    Passthrough,
    /// Fail the build
    Error,
    /// Leave the file out of the build (logged as a warning)
    Skip,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output root
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Build behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Run mode when none is given on the command line
    #[serde(default)]
    pub mode: RunMode,
    /// Policy for files no rule matches
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
    /// Output template for passthrough files
    #[serde(default = "default_passthrough_output")]
    pub passthrough_output: String,
    /// Glob patterns (relative to the source root) never considered as sources
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Prefix for `{{ asset "..." }}` references in templates
    #[serde(default)]
    pub public_path: String,
    /// Write a JSON asset manifest with this name into the output root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_file: Option<String>,
    /// Number of worker threads (defaults to available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            unmatched: UnmatchedPolicy::default(),
            passthrough_output: default_passthrough_output(),
            ignore: default_ignore(),
            public_path: String::new(),
            manifest_file: None,
            jobs: None,
        }
    }
}

fn default_passthrough_output() -> String {
    "[path][name].[ext]".to_string()
}

fn default_ignore() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/.*".to_string()]
}

/// A single rule: matcher plus transform chain plus output template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Rule name used in diagnostics
    pub name: String,
    /// Regular expression tested against the `/`-separated relative path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Glob patterns; at least one must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Glob patterns; none may match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Declared source kind (defaults to the first unit's accepted kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AssetKind>,
    /// Transform unit names, applied in order
    #[serde(default, rename = "use")]
    pub chain: Vec<String>,
    /// Output naming template
    #[serde(default = "default_passthrough_output")]
    pub output: String,
}

impl RuleConfig {
    /// Create a regex-matched rule.
    pub fn new(name: &str, test: &str, chain: &[&str], output: &str) -> Self {
        Self {
            name: name.to_string(),
            test: Some(test.to_string()),
            include: Vec::new(),
            exclude: Vec::new(),
            kind: None,
            chain: chain.iter().map(|s| s.to_string()).collect(),
            output: output.to_string(),
        }
    }

    /// Set the declared kind.
    pub fn with_kind(mut self, kind: AssetKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Optional stage flag overrides for one run mode
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_names: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,
}

/// Per-mode profiles
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub development: ProfileConfig,
    #[serde(default)]
    pub production: ProfileConfig,
}

impl ProfilesConfig {
    /// Profile for a mode.
    pub fn for_mode(&self, mode: RunMode) -> &ProfileConfig {
        match mode {
            RunMode::Development => &self.development,
            RunMode::Production => &self.production,
        }
    }
}

/// Browser versions for CSS prefixing and syntax lowering (major versions)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CssTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firefox: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safari: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<u32>,
}

impl CssTargets {
    pub fn is_empty(&self) -> bool {
        *self == CssTargets::default()
    }
}

/// CSS settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CssConfig {
    #[serde(default)]
    pub targets: CssTargets,
}

/// Template settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemplatesConfig {
    /// Variables available as `{{ name }}`
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Inject a polling reload script into served HTML
    #[serde(default = "default_true")]
    pub live_reload: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), live_reload: true }
    }
}

/// Complete assetline.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Build behavior
    #[serde(default)]
    pub build: BuildSection,
    /// Rule table, first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
    /// Stage flag overrides per mode
    #[serde(default)]
    pub profiles: ProfilesConfig,
    #[serde(default)]
    pub css: CssConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Built-in rule table, used when a config declares no rules.
///
/// Mirrors a typical static-site setup: scripts and styles under `js/` and
/// `css/`, HTML pages at the root, images/fonts copied into folders.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::new("scripts", r"\.m?js$", &["script"], "js/[name].[hash].[ext]"),
        RuleConfig::new("sass", r"\.s[ac]ss$", &["sass", "css"], "css/[name].[hash].[ext]"),
        RuleConfig::new("css", r"\.css$", &["css"], "css/[name].[hash].[ext]"),
        RuleConfig::new("pages", r"\.html?$", &["template", "html-minify"], "[path][name].html"),
        RuleConfig::new("svg", r"\.svg$", &["svgo"], "img/[name].[ext]"),
        RuleConfig::new("favicon", r"(^|/)favicon\.ico$", &[], "[name].[ext]")
            .with_kind(AssetKind::Image),
        RuleConfig::new("images", r"\.(png|jpe?g|gif|webp|avif|ico)$", &[], "img/[name].[ext]")
            .with_kind(AssetKind::Image),
        RuleConfig::new("fonts", r"\.(woff2?|ttf|otf|eot)$", &[], "fonts/[name].[ext]")
            .with_kind(AssetKind::Font),
    ]
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "rules.styles.use")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetline.toml: '{}' {}", self.field, self.message)
    }
}

impl AssetConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if overlaps(&self.project.src, &self.project.out) {
            errors.push(ConfigValidationError {
                field: "project.out".to_string(),
                message: "must not be the source directory, contain it or lie inside it"
                    .to_string(),
            });
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                errors.push(ConfigValidationError {
                    field: format!("rules.{}", rule.name),
                    message: "duplicate rule name".to_string(),
                });
            }
            if rule.test.is_none() && rule.include.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("rules.{}", rule.name),
                    message: "needs a 'test' regex or 'include' globs".to_string(),
                });
            }
        }

        if self.build.jobs == Some(0) {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.serve.port == 0 {
            errors.push(ConfigValidationError {
                field: "serve.port".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Whether `src` and `out` are the same directory or one contains the other.
///
/// `.` components are ignored, so `./src` and `src` compare equal.
fn overlaps(src: &Path, out: &Path) -> bool {
    let src = normalize(src);
    let out = normalize(out);
    if src.is_absolute() != out.is_absolute() {
        return false;
    }
    src.starts_with(&out) || out.starts_with(&src)
}

fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}
