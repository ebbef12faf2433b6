//! Pipeline manifest: the complete mapping of destinations to outputs.
//!
//! The in-memory [`PipelineManifest`] is assembled during a run and is the
//! only place where destination collisions are detected. After a successful
//! write it can be persisted as an [`AssetManifestFile`], a JSON file that
//! maps every source to the URLs it was published under.
//!
//! # Manifest Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "mode": "production",
//!   "assets": {
//!     "sass/style.sass": [
//!       {
//!         "path": "css/style.3f2a91c0.css",
//!         "url": "/css/style.3f2a91c0.css",
//!         "hash": "3f2a91c0...",
//!         "kind": "style",
//!         "size": 1024
//!       }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::artifact::{to_slash, AssetKind, OutputArtifact};
use crate::build::BuildError;
use crate::mode::RunMode;
use crate::output::{content_hash, public_url};

/// Current asset manifest format version.
const MANIFEST_VERSION: u32 = 1;

/// Error during asset manifest operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Version mismatch
    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Outcome of inserting an output into the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// A new destination was added
    New,
    /// An identical output already claimed the destination
    Duplicate,
}

/// Destination-keyed set of outputs for one run.
///
/// Every destination maps to exactly one output. Two outputs with the same
/// destination and identical bytes collapse into the first; differing bytes
/// are a [`BuildError::Collision`]. Each destination remembers every source
/// that claimed it, so removing one of them keeps the shared output alive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineManifest {
    entries: BTreeMap<PathBuf, OutputArtifact>,
    claims: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl PipelineManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output, enforcing destination uniqueness.
    pub fn insert(&mut self, output: OutputArtifact) -> Result<Inserted, BuildError> {
        match self.entries.get(&output.destination) {
            Some(existing) if existing.content == output.content => {
                tracing::debug!(
                    destination = %output.url_path(),
                    first = %to_slash(&existing.source),
                    second = %to_slash(&output.source),
                    "identical output deduplicated"
                );
                self.claims.entry(output.destination).or_default().insert(output.source);
                Ok(Inserted::Duplicate)
            }
            Some(existing) => Err(BuildError::Collision {
                destination: output.destination.clone(),
                first: existing.source.clone(),
                second: output.source,
            }),
            None => {
                self.claims
                    .entry(output.destination.clone())
                    .or_default()
                    .insert(output.source.clone());
                self.entries.insert(output.destination.clone(), output);
                Ok(Inserted::New)
            }
        }
    }

    /// Output written to `destination`, if any.
    pub fn get(&self, destination: &Path) -> Option<&OutputArtifact> {
        self.entries.get(destination)
    }

    pub fn contains(&self, destination: &Path) -> bool {
        self.entries.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outputs in destination order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.entries.values()
    }

    /// Destinations claimed by `source`, in destination order.
    ///
    /// Includes destinations whose output was deduplicated into another
    /// source's identical output.
    pub fn destinations_for(&self, source: &Path) -> Vec<&Path> {
        self.claims
            .iter()
            .filter(|(_, sources)| sources.contains(source))
            .map(|(destination, _)| destination.as_path())
            .collect()
    }

    /// Every source claiming `destination`, in path order.
    pub fn claimants(&self, destination: &Path) -> Vec<&Path> {
        self.claims
            .get(destination)
            .map(|sources| sources.iter().map(PathBuf::as_path).collect())
            .unwrap_or_default()
    }

    /// Other sources that share at least one destination with `source`.
    pub fn co_claimants(&self, source: &Path) -> BTreeSet<PathBuf> {
        self.claims
            .values()
            .filter(|sources| sources.contains(source))
            .flatten()
            .filter(|s| s.as_path() != source)
            .cloned()
            .collect()
    }

    /// Withdraw `source` from every destination it claims.
    ///
    /// A destination is dropped once no source claims it; those outputs are
    /// returned. A shared output whose recorded source is withdrawn is
    /// reattributed to the next remaining claimant.
    pub fn remove_source(&mut self, source: &Path) -> Vec<OutputArtifact> {
        let destinations: Vec<PathBuf> = self
            .claims
            .iter()
            .filter(|(_, sources)| sources.contains(source))
            .map(|(destination, _)| destination.clone())
            .collect();

        let mut dropped = Vec::new();
        for destination in destinations {
            let Some(sources) = self.claims.get_mut(&destination) else {
                continue;
            };
            sources.remove(source);
            match sources.iter().next().cloned() {
                None => {
                    self.claims.remove(&destination);
                    dropped.extend(self.entries.remove(&destination));
                }
                Some(next) => {
                    if let Some(output) = self.entries.get_mut(&destination) {
                        if output.source == source {
                            output.source = next;
                        }
                    }
                }
            }
        }
        dropped
    }

    /// Number of outputs per produced kind.
    pub fn kind_counts(&self) -> BTreeMap<AssetKind, usize> {
        let mut counts = BTreeMap::new();
        for output in self.entries.values() {
            *counts.entry(output.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Total bytes across all outputs.
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|o| o.content.len() as u64).sum()
    }

    /// Serializable view keyed by source.
    pub fn to_asset_manifest(&self, mode: RunMode, public_path: &str) -> AssetManifestFile {
        let mut assets: BTreeMap<String, Vec<AssetEntry>> = BTreeMap::new();
        for output in self.entries.values() {
            let path = output.url_path();
            assets.entry(to_slash(&output.source)).or_default().push(AssetEntry {
                url: public_url(public_path, &path),
                path,
                hash: content_hash(&output.content, 64),
                kind: output.kind,
                size: output.content.len() as u64,
            });
        }
        AssetManifestFile { version: MANIFEST_VERSION, mode, assets }
    }
}

/// One published file in the asset manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Destination relative to the output root
    pub path: String,
    /// Public URL (`public_path` + destination)
    pub url: String,
    /// Full SHA-256 of the written bytes
    pub hash: String,
    /// Kind of the written content
    pub kind: AssetKind,
    /// Size in bytes
    pub size: u64,
}

/// On-disk JSON asset manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifestFile {
    /// Manifest format version
    pub version: u32,
    /// Mode the outputs were built in
    pub mode: RunMode,
    /// Outputs per source path
    pub assets: BTreeMap<String, Vec<AssetEntry>>,
}

impl AssetManifestFile {
    /// Load a manifest from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let manifest: AssetManifestFile = serde_json::from_reader(reader)?;

        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::VersionMismatch {
                expected: MANIFEST_VERSION,
                found: manifest.version,
            });
        }

        Ok(Some(manifest))
    }

    /// Save the manifest, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// URL of the first output of `source`, if recorded.
    pub fn url_for(&self, source: &str) -> Option<&str> {
        self.assets.get(source).and_then(|entries| entries.first()).map(|e| e.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output(dest: &str, source: &str, content: &str) -> OutputArtifact {
        OutputArtifact {
            destination: PathBuf::from(dest),
            source: PathBuf::from(source),
            kind: AssetKind::from_path(Path::new(dest)),
            content: content.as_bytes().to_vec(),
        }
    }

    // ========================================================================
    // PipelineManifest
    // ========================================================================

    #[test]
    fn test_insert_and_lookup() {
        let mut manifest = PipelineManifest::new();
        assert_eq!(manifest.insert(output("js/a.js", "a.js", "1")).unwrap(), Inserted::New);
        assert_eq!(manifest.insert(output("img/a.png", "a.png", "2")).unwrap(), Inserted::New);

        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains(Path::new("js/a.js")));
        assert_eq!(manifest.get(Path::new("img/a.png")).unwrap().source, PathBuf::from("a.png"));
    }

    #[test]
    fn test_identical_duplicate_is_deduplicated() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("static/logo.png", "a/logo.png", "same")).unwrap();
        let inserted = manifest.insert(output("static/logo.png", "b/logo.png", "same")).unwrap();

        assert_eq!(inserted, Inserted::Duplicate);
        assert_eq!(manifest.len(), 1);
        assert_eq!(
            manifest.get(Path::new("static/logo.png")).unwrap().source,
            PathBuf::from("a/logo.png")
        );
    }

    #[test]
    fn test_differing_duplicate_is_collision() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("static/logo.png", "a/logo.png", "one")).unwrap();
        let err = manifest.insert(output("static/logo.png", "b/logo.png", "two")).unwrap_err();

        match err {
            BuildError::Collision { destination, first, second } => {
                assert_eq!(destination, PathBuf::from("static/logo.png"));
                assert_eq!(first, PathBuf::from("a/logo.png"));
                assert_eq!(second, PathBuf::from("b/logo.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remove_source() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("js/a.js", "a.js", "code")).unwrap();
        manifest.insert(output("js/a.js.map", "a.js", "{}")).unwrap();
        manifest.insert(output("css/b.css", "b.css", "x")).unwrap();

        assert_eq!(manifest.destinations_for(Path::new("a.js")).len(), 2);
        let removed = manifest.remove_source(Path::new("a.js"));
        assert_eq!(removed.len(), 2);
        assert_eq!(manifest.len(), 1);
        assert!(manifest.destinations_for(Path::new("a.js")).is_empty());
    }

    #[test]
    fn test_remove_shared_source_keeps_output() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("static/logo.txt", "a/logo.txt", "same")).unwrap();
        manifest.insert(output("static/logo.txt", "b/logo.txt", "same")).unwrap();

        assert_eq!(
            manifest.claimants(Path::new("static/logo.txt")),
            vec![Path::new("a/logo.txt"), Path::new("b/logo.txt")]
        );
        assert_eq!(
            manifest.destinations_for(Path::new("b/logo.txt")),
            vec![Path::new("static/logo.txt")]
        );
        assert_eq!(
            manifest.co_claimants(Path::new("a/logo.txt")).into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("b/logo.txt")]
        );

        assert!(manifest.remove_source(Path::new("a/logo.txt")).is_empty());
        let shared = manifest.get(Path::new("static/logo.txt")).unwrap();
        assert_eq!(shared.source, PathBuf::from("b/logo.txt"));

        let removed = manifest.remove_source(Path::new("b/logo.txt"));
        assert_eq!(removed.len(), 1);
        assert!(manifest.is_empty());
        assert!(manifest.claimants(Path::new("static/logo.txt")).is_empty());
    }

    #[test]
    fn test_kind_counts_and_size() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("js/a.js", "a.js", "abc")).unwrap();
        manifest.insert(output("js/b.js", "b.js", "de")).unwrap();
        manifest.insert(output("img/c.png", "c.png", "f")).unwrap();

        let counts = manifest.kind_counts();
        assert_eq!(counts[&AssetKind::Script], 2);
        assert_eq!(counts[&AssetKind::Image], 1);
        assert_eq!(manifest.total_size(), 6);
    }

    // ========================================================================
    // AssetManifestFile
    // ========================================================================

    #[test]
    fn test_asset_manifest_entries() {
        let mut manifest = PipelineManifest::new();
        manifest.insert(output("css/style.abc.css", "sass/style.sass", "body{}")).unwrap();

        let file = manifest.to_asset_manifest(RunMode::Production, "/static");
        assert_eq!(file.mode, RunMode::Production);
        let entries = &file.assets["sass/style.sass"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "css/style.abc.css");
        assert_eq!(entries[0].url, "/static/css/style.abc.css");
        assert_eq!(entries[0].hash, content_hash(b"body{}", 64));
        assert_eq!(entries[0].size, 6);
        assert_eq!(file.url_for("sass/style.sass"), Some("/static/css/style.abc.css"));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("asset-manifest.json");

        let mut manifest = PipelineManifest::new();
        manifest.insert(output("js/a.js", "a.js", "x")).unwrap();
        let file = manifest.to_asset_manifest(RunMode::Development, "");
        file.save(&path).unwrap();

        let loaded = AssetManifestFile::load(&path).unwrap().unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_load_missing_and_version_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("asset-manifest.json");
        assert!(AssetManifestFile::load(&path).unwrap().is_none());

        fs::write(&path, r#"{"version": 99, "mode": "development", "assets": {}}"#).unwrap();
        assert!(matches!(
            AssetManifestFile::load(&path),
            Err(ManifestError::VersionMismatch { expected: 1, found: 99 })
        ));
    }
}
