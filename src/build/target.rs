//! Build target definitions.
//!
//! A build target is one source file together with what the pipeline will
//! do with it: run a rule's chain or copy it through unchanged.

use crate::artifact::{to_slash, AssetKind};
use std::path::{Path, PathBuf};

/// What happens to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetAction {
    /// Run the chain of the rule at this index of the rule table
    Rule(usize),
    /// No rule matched; copy verbatim to the passthrough template
    Passthrough,
}

/// Execution wave. Every [`Wave::Assets`] target finishes before any
/// [`Wave::Templates`] target starts, so templates see a complete asset map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Wave {
    /// Chains without template units
    Assets,
    /// Chains containing a unit that reads the asset map
    Templates,
}

impl std::fmt::Display for Wave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Wave::Assets => write!(f, "assets"),
            Wave::Templates => write!(f, "templates"),
        }
    }
}

/// A build target representing work to be done for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Source path relative to the source root
    pub source: PathBuf,
    /// Kind assigned by the matching rule
    pub kind: AssetKind,
    /// Rule chain or passthrough
    pub action: TargetAction,
    /// Execution wave
    pub wave: Wave,
}

impl BuildTarget {
    /// Create a target handled by a rule.
    pub fn rule(source: PathBuf, kind: AssetKind, index: usize, wave: Wave) -> Self {
        Self { source, kind, action: TargetAction::Rule(index), wave }
    }

    /// Create a passthrough target.
    pub fn passthrough(source: PathBuf) -> Self {
        let kind = AssetKind::from_path(&source);
        Self { source, kind, action: TargetAction::Passthrough, wave: Wave::Assets }
    }

    /// Source rendered with `/` separators, as used in manifests and the
    /// asset map.
    pub fn id(&self) -> String {
        to_slash(&self.source)
    }
}

/// The set of targets for a run, in source order.
#[derive(Debug, Default, Clone)]
pub struct BuildPlan {
    /// All targets in the build
    targets: Vec<BuildTarget>,
    /// Sources skipped by the unmatched policy
    skipped: Vec<PathBuf>,
}

impl BuildPlan {
    /// Create a new empty build plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target to the plan.
    pub fn add_target(&mut self, target: BuildTarget) {
        self.targets.push(target);
    }

    /// Record a source that will not be built.
    pub fn add_skipped(&mut self, source: PathBuf) {
        self.skipped.push(source);
    }

    /// Get all targets in the plan.
    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Sources skipped by the unmatched policy.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Targets of one wave, in source order.
    pub fn wave(&self, wave: Wave) -> impl Iterator<Item = &BuildTarget> {
        self.targets.iter().filter(move |t| t.wave == wave)
    }

    /// Target for a source, if planned.
    pub fn target_for(&self, source: &Path) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.source == source)
    }

    /// Get the number of targets in the plan.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Keep only targets whose source satisfies `keep`.
    pub fn filter<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&BuildTarget) -> bool,
    {
        self.targets.retain(|t| keep(t));
        self
    }
}
