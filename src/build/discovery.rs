//! Source file discovery for the build system.
//!
//! Walks the source root with a `**/*` glob, drops ignored paths and
//! classifies what remains against the rule table.

use crate::artifact::to_slash;
use crate::build::pipeline::staging_dir;
use crate::build::{BuildContext, BuildError, BuildPlan, BuildTarget, Wave};
use crate::config::UnmatchedPolicy;
use crate::rules::RuleTable;
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The source root does not exist or is not a directory
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
}

/// Discover every source file under `src_dir`.
///
/// # Arguments
/// - `src_dir` - Source root
/// - `ignore` - Glob patterns matched against `/`-separated relative paths
///
/// # Returns
/// Sorted paths relative to `src_dir`.
pub fn discover_sources(src_dir: &Path, ignore: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !src_dir.is_dir() {
        return Err(DiscoveryError::SourceNotFound(src_dir.to_path_buf()));
    }

    let ignore = ignore
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
        .collect::<Result<Vec<_>, _>>()?;

    let root = Pattern::escape(&src_dir.to_string_lossy());
    let pattern = format!("{}/**/*", root.trim_end_matches('/'));
    let paths = glob(&pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(src_dir) else {
                    continue;
                };
                let slashed = to_slash(relative);
                if ignore.iter().any(|p| p.matches(&slashed)) {
                    tracing::trace!(path = %slashed, "ignored");
                    continue;
                }
                files.push(relative.to_path_buf());
            }
            Err(e) => {
                // Log but continue on unreadable entries
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Discover all sources for a build context.
///
/// The output root and its staging directory are never sources, even when
/// they resolve inside the source root.
pub fn discover_all_sources(ctx: &BuildContext) -> Result<Vec<PathBuf>, DiscoveryError> {
    let src_dir = ctx.src_dir();
    let out_dir = ctx.out_dir();
    let excluded: Vec<PathBuf> = [staging_dir(&out_dir), out_dir]
        .iter()
        .filter_map(|dir| dir.strip_prefix(&src_dir).ok().map(Path::to_path_buf))
        .collect();

    let mut sources = discover_sources(&src_dir, &ctx.config().build.ignore)?;
    if !excluded.is_empty() {
        sources.retain(|path| !excluded.iter().any(|dir| path.starts_with(dir)));
    }
    Ok(sources)
}

/// Create a build plan from discovered sources.
///
/// Each source goes to the first matching rule. Unmatched sources follow the
/// configured [`UnmatchedPolicy`].
pub fn create_build_plan(
    ctx: &BuildContext,
    rules: &RuleTable,
    sources: &[PathBuf],
) -> Result<BuildPlan, BuildError> {
    let mut plan = BuildPlan::new();

    for source in sources {
        match rules.resolve_index(source).and_then(|i| rules.get(i).map(|rule| (i, rule))) {
            Some((index, rule)) => {
                let wave = if rule.needs_assets() { Wave::Templates } else { Wave::Assets };
                let kind = rule.kind_for(source);
                plan.add_target(BuildTarget::rule(source.clone(), kind, index, wave));
            }
            None => match ctx.config().build.unmatched {
                UnmatchedPolicy::Passthrough => {
                    plan.add_target(BuildTarget::passthrough(source.clone()))
                }
                UnmatchedPolicy::Error => {
                    return Err(BuildError::UnmatchedInput { path: source.clone() })
                }
                UnmatchedPolicy::Skip => {
                    tracing::warn!(path = %to_slash(source), "no rule matches; skipping");
                    plan.add_skipped(source.clone());
                }
            },
        }
    }

    Ok(plan)
}
