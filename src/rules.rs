//! Rule table: which chain of transform units applies to which source.
//!
//! Rules are compiled once per pipeline. Compilation validates every chain
//! so type mismatches surface before any file is read or written.

use glob::Pattern;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::artifact::{to_slash, AssetKind};
use crate::config::RuleConfig;
use crate::output::{OutputTemplate, TemplateError};
use crate::transforms::{Transform, TransformRegistry};

/// Error compiling the rule table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuleError {
    /// A chain names a unit that is not registered
    #[error("rule '{rule}': unknown transform unit '{unit}'")]
    UnknownUnit { rule: String, unit: String },

    /// Adjacent units (or the declared kind and the first unit) disagree
    #[error(
        "rule '{rule}': unit '{unit}' at position {position} accepts {expected} \
         but would receive {found}"
    )]
    ChainTypeMismatch {
        rule: String,
        position: usize,
        unit: String,
        expected: AssetKind,
        found: AssetKind,
    },

    /// The `test` regex does not compile
    #[error("rule '{rule}': invalid test pattern: {source}")]
    InvalidRegex {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// An `include`/`exclude` glob does not compile
    #[error("rule '{rule}': invalid glob '{pattern}': {source}")]
    InvalidGlob {
        rule: String,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The output template does not parse
    #[error("rule '{rule}': {source}")]
    InvalidTemplate {
        rule: String,
        #[source]
        source: TemplateError,
    },

    /// Neither `test` nor `include` is set
    #[error("rule '{rule}' has no test or include matcher")]
    NoMatcher { rule: String },
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule name from the configuration
    pub name: String,
    test: Option<Regex>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    /// Declared source kind, or the first unit's accepted kind
    pub kind: Option<AssetKind>,
    /// Units in application order
    pub chain: Vec<Arc<dyn Transform>>,
    /// Output naming template
    pub output: OutputTemplate,
}

impl Rule {
    /// Whether this rule applies to a source path (relative to the source root).
    pub fn matches(&self, path: &Path) -> bool {
        let path = to_slash(path);

        if let Some(test) = &self.test {
            if !test.is_match(&path) {
                return false;
            }
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(&path)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(&path))
    }

    /// Kind of a source handled by this rule.
    pub fn kind_for(&self, path: &Path) -> AssetKind {
        self.kind.unwrap_or_else(|| AssetKind::from_path(path))
    }

    /// Whether any unit reads the asset map.
    pub fn needs_assets(&self) -> bool {
        self.chain.iter().any(|unit| unit.needs_assets())
    }

    /// Unit names in application order.
    pub fn unit_names(&self) -> Vec<&str> {
        self.chain.iter().map(|unit| unit.name()).collect()
    }
}

/// Ordered list of compiled rules. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

fn compile_globs(rule: &str, patterns: &[String]) -> Result<Vec<Pattern>, RuleError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| RuleError::InvalidGlob {
                rule: rule.to_string(),
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

fn compile_rule(config: &RuleConfig, registry: &TransformRegistry) -> Result<Rule, RuleError> {
    let name = config.name.clone();

    if config.test.is_none() && config.include.is_empty() {
        return Err(RuleError::NoMatcher { rule: name });
    }

    let test = config
        .test
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|source| RuleError::InvalidRegex { rule: name.clone(), source })?;
    let include = compile_globs(&name, &config.include)?;
    let exclude = compile_globs(&name, &config.exclude)?;
    let output = OutputTemplate::parse(&config.output)
        .map_err(|source| RuleError::InvalidTemplate { rule: name.clone(), source })?;

    let chain = config
        .chain
        .iter()
        .map(|unit| {
            registry
                .get(unit)
                .ok_or_else(|| RuleError::UnknownUnit { rule: name.clone(), unit: unit.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let kind = config.kind.or_else(|| chain.first().map(|unit| unit.accepts()));

    if let Some(mut current) = kind {
        for (position, unit) in chain.iter().enumerate() {
            if unit.accepts() != current {
                return Err(RuleError::ChainTypeMismatch {
                    rule: name,
                    position,
                    unit: unit.name().to_string(),
                    expected: unit.accepts(),
                    found: current,
                });
            }
            current = unit.produces();
        }
    }

    Ok(Rule { name, test, include, exclude, kind, chain, output })
}

impl RuleTable {
    /// Compile and validate rules against a registry of units.
    pub fn compile(
        configs: &[RuleConfig],
        registry: &TransformRegistry,
    ) -> Result<Self, RuleError> {
        let rules = configs
            .iter()
            .map(|config| compile_rule(config, registry))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(rules = rules.len(), "compiled rule table");
        Ok(Self { rules })
    }

    /// First rule matching `path`.
    pub fn resolve(&self, path: &Path) -> Option<&Rule> {
        self.resolve_index(path).map(|index| &self.rules[index])
    }

    /// Index of the first rule matching `path`.
    pub fn resolve_index(&self, path: &Path) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(path))
    }

    /// Rule at `index`.
    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}
