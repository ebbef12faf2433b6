//! Incremental rebuild support.
//!
//! An [`IncrementalSession`] runs one full build and keeps its manifest and
//! asset map in memory. Each [`IncrementalSession::rebuild`] then re-runs
//! only the sources that changed.
//!
//! # How It Works
//!
//! 1. Re-discover sources and classify them (no file is read yet)
//! 2. Drop the outputs of every changed or deleted source, together with
//!    those of any source sharing a deduplicated destination with it
//! 3. Re-run the asset-wave chains of those sources and update the asset map
//! 4. If any asset URL changed, re-render every template; otherwise only
//!    changed templates
//! 5. Insert the new outputs into the updated manifest, which detects
//!    collisions against everything already published
//! 6. Stage and move the new files into the output root, then delete
//!    outputs that no longer exist
//!
//! Nothing is written until every step of the batch succeeded, so a failed
//! rebuild leaves the last good output in place.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::{to_slash, OutputArtifact};
use crate::build::pipeline::{merge_staged, staging_dir, AssetMap, Assembly};
use crate::build::{
    BuildError, BuildPlan, BuildReport, BuildTarget, Pipeline, PipelineManifest, RebuildReport,
    Wave,
};

/// Pending changed paths, coalesced until the next rebuild.
#[derive(Debug, Default, Clone)]
pub struct RebuildQueue {
    pending: BTreeSet<PathBuf>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a path. A path already queued is superseded by the new trigger.
    ///
    /// Returns `true` if the path was not queued yet.
    pub fn push(&mut self, path: impl Into<PathBuf>) -> bool {
        self.pending.insert(path.into())
    }

    /// Queue several paths.
    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.pending.extend(paths.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued path, each once, in sorted order.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

/// A long-lived build that re-runs only what changed.
#[derive(Debug)]
pub struct IncrementalSession {
    pipeline: Pipeline,
    assembly: Assembly,
    plan: BuildPlan,
}

impl IncrementalSession {
    /// Run a full build and keep its state for later rebuilds.
    pub fn start(pipeline: Pipeline) -> Result<(Self, BuildReport), BuildError> {
        let start = Instant::now();
        let plan = pipeline.plan()?;
        let mut assembly = pipeline.assemble(&plan)?;
        pipeline.write_all(&assembly.manifest)?;

        let assets = std::mem::take(&mut assembly.assets);
        let report = pipeline.report(&plan, assembly, true).with_duration(start.elapsed());
        let assembly = Assembly {
            manifest: report.manifest.clone(),
            assets,
            deduplicated: report.deduplicated,
        };

        tracing::info!(
            outputs = report.output_count(),
            "initial build finished in {:?}",
            report.duration
        );
        Ok((Self { pipeline, assembly, plan }, report))
    }

    /// The pipeline driving this session.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Outputs currently published.
    pub fn manifest(&self) -> &PipelineManifest {
        &self.assembly.manifest
    }

    /// Current source to public URL map.
    pub fn assets(&self) -> &AssetMap {
        &self.assembly.assets
    }

    /// Re-run the given changed paths.
    ///
    /// Paths may be absolute or relative to the source root. Paths outside
    /// the source root, ignored paths and directories are dropped.
    pub fn rebuild(&mut self, changed: &[PathBuf]) -> Result<RebuildReport, BuildError> {
        let start = Instant::now();
        let ctx = self.pipeline.context();
        let src_dir = ctx.src_dir();

        let plan = self.pipeline.plan()?;
        let changed: BTreeSet<PathBuf> = changed
            .iter()
            .filter_map(|path| relative_to(&src_dir, path))
            .filter(|path| {
                self.is_known(path)
                    || plan.target_for(path).is_some()
                    || plan.skipped().contains(path)
            })
            .collect();

        if changed.is_empty() {
            return Ok(RebuildReport { duration: start.elapsed(), ..Default::default() });
        }

        // Sources sharing a deduplicated destination re-run with the changed one
        let mut rerun = changed.clone();
        for path in &changed {
            rerun.extend(self.assembly.manifest.co_claimants(path));
        }

        let mut report = RebuildReport::default();
        let mut next = Assembly {
            manifest: self.assembly.manifest.clone(),
            assets: self.assembly.assets.clone(),
            deduplicated: 0,
        };

        for path in &rerun {
            next.manifest.remove_source(path);
            next.assets.remove(&to_slash(path));
        }
        for path in &changed {
            match plan.target_for(path) {
                Some(_) => report.rebuilt.push(path.clone()),
                None if !src_dir.join(path).is_file() => report.deleted.push(path.clone()),
                None => {}
            }
        }

        let assets: Vec<&BuildTarget> =
            plan.wave(Wave::Assets).filter(|t| rerun.contains(&t.source)).collect();
        let produced = self.pipeline.execute_targets(&assets, &Arc::default())?;
        for (target, outputs) in assets.iter().zip(produced) {
            if let Some(url) = self.pipeline.asset_url(&outputs) {
                next.assets.insert(target.id(), url);
            }
            next.insert_all(outputs)?;
        }

        let assets_changed = next.assets != self.assembly.assets;
        let templates: Vec<&BuildTarget> = plan
            .wave(Wave::Templates)
            .filter(|t| assets_changed || rerun.contains(&t.source))
            .collect();
        for target in &templates {
            if !rerun.contains(&target.source) {
                next.manifest.remove_source(&target.source);
                report.rerendered.push(target.source.clone());
            }
        }
        if !templates.is_empty() {
            let asset_map = Arc::new(next.assets.clone());
            let produced = self.pipeline.execute_targets(&templates, &asset_map)?;
            for outputs in produced {
                next.insert_all(outputs)?;
            }
        }
        self.pipeline.check_manifest_file(&next.manifest)?;

        let touched: BTreeSet<&Path> = rerun
            .iter()
            .map(PathBuf::as_path)
            .chain(templates.iter().map(|t| t.source.as_path()))
            .collect();
        let writes: Vec<_> = next
            .manifest
            .iter()
            .filter(|o| touched.contains(o.source.as_path()))
            .filter(|o| {
                let previous = self.assembly.manifest.get(&o.destination);
                previous.map(|old| old.content != o.content).unwrap_or(true)
            })
            .collect();
        let removals: Vec<PathBuf> = self
            .assembly
            .manifest
            .iter()
            .filter(|o| !next.manifest.contains(&o.destination))
            .map(|o| o.destination.clone())
            .collect();

        self.commit(&writes, &removals, &next)?;

        report.written = writes.iter().map(|o| o.destination.clone()).collect();
        report.removed = removals;
        report.duration = start.elapsed();
        tracing::info!(
            rebuilt = report.rebuilt.len(),
            written = report.written.len(),
            removed = report.removed.len(),
            "rebuild finished in {:?}",
            report.duration
        );

        self.assembly = next;
        self.plan = plan;
        Ok(report)
    }

    fn is_known(&self, path: &Path) -> bool {
        self.plan.target_for(path).is_some() || self.plan.skipped().iter().any(|p| p == path)
    }

    /// Publish a rebuild: stage new files, move them in, delete stale ones.
    fn commit(
        &self,
        writes: &[&OutputArtifact],
        removals: &[PathBuf],
        next: &Assembly,
    ) -> Result<(), BuildError> {
        if writes.is_empty() && removals.is_empty() {
            return Ok(());
        }

        let out_dir = self.pipeline.context().out_dir();
        let staging = staging_dir(&out_dir);

        let result = self.pipeline.stage(&staging, writes.iter().copied()).and_then(|mut staged| {
            staged.extend(self.pipeline.stage_asset_manifest(&staging, &next.manifest)?);
            merge_staged(&staging, &out_dir, &staged)
        });
        if result.is_err() && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        result?;

        for destination in removals {
            let path = out_dir.join(destination);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(BuildError::Io { path, source }),
            }
        }
        Ok(())
    }
}

/// Path relative to the source root, or `None` when outside it.
fn relative_to(src_dir: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        path.strip_prefix(src_dir).ok().map(Path::to_path_buf)
    } else {
        Some(path.to_path_buf())
    }
}
