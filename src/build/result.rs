//! Build result types.
//!
//! Contains types for representing the outcome of full and incremental runs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::{to_slash, AssetKind};
use crate::build::PipelineManifest;

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Every output of the run, keyed by destination
    pub manifest: PipelineManifest,
    /// Number of sources that went through a chain or passthrough
    pub sources: usize,
    /// Sources skipped by the unmatched policy
    pub skipped: Vec<PathBuf>,
    /// Outputs dropped because an identical file already claimed the destination
    pub deduplicated: usize,
    /// Whether outputs were written to disk
    pub written: bool,
    /// Total build duration
    pub duration: Duration,
}

impl BuildReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Number of outputs in the manifest.
    pub fn output_count(&self) -> usize {
        self.manifest.len()
    }

    /// Number of outputs per produced kind.
    pub fn kind_counts(&self) -> BTreeMap<AssetKind, usize> {
        self.manifest.kind_counts()
    }

    /// Warnings collected during the run.
    pub fn warnings(&self) -> Vec<String> {
        self.skipped.iter().map(|p| format!("{}: no rule matches; skipped", to_slash(p))).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let verb = if self.written { "Build succeeded" } else { "Build checked" };
        lines.push(format!(
            "{}: {} outputs from {} sources, {} skipped in {:?}",
            verb,
            self.output_count(),
            self.sources,
            self.skipped.len(),
            self.duration
        ));

        let counts = self.kind_counts();
        if !counts.is_empty() {
            let parts: Vec<String> =
                counts.iter().map(|(kind, count)| format!("{} {}", count, kind)).collect();
            lines.push(format!("  {}", parts.join(", ")));
        }
        if self.deduplicated > 0 {
            lines.push(format!("  {} identical outputs deduplicated", self.deduplicated));
        }

        let warnings = self.warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}

/// Result of one incremental rebuild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Changed sources that were re-run (sorted)
    pub rebuilt: Vec<PathBuf>,
    /// Template sources re-rendered because an asset URL changed (sorted)
    pub rerendered: Vec<PathBuf>,
    /// Sources that no longer exist (sorted)
    pub deleted: Vec<PathBuf>,
    /// Destinations written (sorted)
    pub written: Vec<PathBuf>,
    /// Destinations removed from the output root (sorted)
    pub removed: Vec<PathBuf>,
    /// Rebuild duration
    pub duration: Duration,
}

impl RebuildReport {
    /// Whether the rebuild touched nothing.
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }

    /// One-line summary for watch output.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Rebuilt {} sources: {} written, {} removed",
            self.rebuilt.len() + self.rerendered.len(),
            self.written.len(),
            self.removed.len()
        );
        if !self.rerendered.is_empty() {
            line.push_str(&format!(" ({} templates re-rendered)", self.rerendered.len()));
        }
        line.push_str(&format!(" in {:?}", self.duration));
        line
    }
}
