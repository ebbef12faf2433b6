//! Transform units
//!
//! A transform unit maps one typed [`Artifact`] to zero or more artifacts of
//! its declared output kind. Units are pure: their output depends only on the
//! input artifact and the [`TransformOptions`] handed in by the pipeline, so
//! repeated runs produce byte-identical output.
//!
//! Built-in units:
//!
//! | name | accepts → produces | stage |
//! |---|---|---|
//! | `script` | script → script | always |
//! | `sass` | sass → style | always |
//! | `css` | style → style | always |
//! | `template` | template → markup | always |
//! | `html-minify` | markup → markup | minify |
//! | `svgo` | vector → vector | minify |

pub mod css;
pub mod markup;
pub mod sass;
pub mod script;
pub mod svg;
pub mod template;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::artifact::{Artifact, AssetKind};
use crate::config::CssTargets;
use crate::mode::{RunMode, StageFlags};

pub use css::CssUnit;
pub use markup::HtmlMinify;
pub use sass::SassUnit;
pub use script::ScriptUnit;
pub use svg::SvgOptimize;
pub use template::TemplateUnit;

/// When a unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Every run
    Always,
    /// Only when minification is enabled; otherwise the input passes through
    Minify,
}

/// A unit's rejection of its input.
///
/// The pipeline adds the source path and unit name when reporting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TransformError {
    /// Underlying cause
    pub message: String,
    /// 1-indexed line in the unit's input, if known
    pub line: Option<usize>,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), line: None }
    }

    pub fn with_line(line: usize, message: impl Into<String>) -> Self {
        Self { message: message.into(), line: Some(line) }
    }

    /// Input that is not valid UTF-8.
    pub fn not_utf8(err: std::str::Utf8Error) -> Self {
        Self::new(format!("input is not valid UTF-8: {}", err))
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Everything a unit may consult besides its input.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Minify output where the unit supports it
    pub minify: bool,
    /// Attach source maps where the unit supports it
    pub source_maps: bool,
    /// Run mode name, exposed to templates as `{{ mode }}`
    pub mode: RunMode,
    /// Browser targets for CSS prefixing
    pub css_targets: CssTargets,
    /// Template variables
    pub vars: BTreeMap<String, String>,
    /// Source path (relative, `/`-separated) to public output path
    pub assets: Arc<BTreeMap<String, String>>,
    /// Prefix applied to public output paths, exposed as `{{ public_path }}`
    pub public_path: String,
}

impl TransformOptions {
    /// Options derived from stage flags.
    pub fn from_flags(mode: RunMode, flags: &StageFlags) -> Self {
        Self { minify: flags.minify, source_maps: flags.source_maps, mode, ..Default::default() }
    }
}

/// A pipeline stage: accepts one kind, produces one kind.
pub trait Transform: Send + Sync {
    /// Name used in rule chains and diagnostics.
    fn name(&self) -> &str;

    /// Kind of artifact this unit consumes.
    fn accepts(&self) -> AssetKind;

    /// Kind of artifact this unit produces.
    fn produces(&self) -> AssetKind;

    /// Whether this unit is optional.
    fn stage(&self) -> Stage {
        Stage::Always
    }

    /// Whether this unit reads [`TransformOptions::assets`]. Chains holding
    /// such a unit run after every other chain so the asset map is complete.
    fn needs_assets(&self) -> bool {
        false
    }

    /// Transform one artifact.
    fn apply(
        &self,
        input: Artifact,
        options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError>;
}

impl fmt::Debug for dyn Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name(), self.accepts(), self.produces())
    }
}

/// Named collection of transform units.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    units: BTreeMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in unit.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ScriptUnit);
        registry.register(SassUnit);
        registry.register(CssUnit);
        registry.register(TemplateUnit);
        registry.register(HtmlMinify);
        registry.register(SvgOptimize);
        registry
    }

    /// Register a unit under its own name, replacing any previous one.
    pub fn register<T: Transform + 'static>(&mut self, unit: T) {
        self.units.insert(unit.name().to_string(), Arc::new(unit));
    }

    /// Look up a unit by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.units.get(name).cloned()
    }

    /// Registered unit names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.units.keys()).finish()
    }
}

/// Run a chain of units over one artifact.
///
/// Every artifact produced by unit *i* is fed to unit *i + 1*. `Minify`
/// stages are skipped when minification is off. Errors carry the name of
/// the failing unit.
pub fn run_chain(
    chain: &[Arc<dyn Transform>],
    input: Artifact,
    options: &TransformOptions,
) -> Result<Vec<Artifact>, (String, TransformError)> {
    let mut current = vec![input];

    for unit in chain {
        if unit.stage() == Stage::Minify && !options.minify {
            tracing::trace!(unit = unit.name(), "skipping inactive minify stage");
            continue;
        }

        let mut next = Vec::with_capacity(current.len());
        for artifact in current {
            let produced =
                unit.apply(artifact, options).map_err(|e| (unit.name().to_string(), e))?;
            next.extend(produced);
        }
        current = next;
    }

    Ok(current)
}
