//! Build pipeline orchestration.
//!
//! A run discovers sources, classifies them against the rule table, executes
//! every chain in two waves (plain assets first, then template-bearing
//! chains that read the asset map), assembles the destination manifest and
//! writes it to the output root in one staged step.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::artifact::{Artifact, AssetKind, OutputArtifact, SourceArtifact};
use crate::build::{
    create_build_plan, discover_all_sources, BuildContext, BuildPlan, BuildReport, BuildTarget,
    ChainJob, DiscoveryError, Inserted, ManifestError, ParallelBuild, PipelineManifest,
    TargetAction, Wave,
};
use crate::output::{OutputTemplate, TemplateError};
use crate::rules::{RuleError, RuleTable};
use crate::transforms::{Transform, TransformError, TransformOptions, TransformRegistry};

/// Source path (relative, `/`-separated) to the public URL of its first output.
pub type AssetMap = BTreeMap<String, String>;

/// Error during build execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Rule table failed to compile or validate
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// The passthrough output template does not parse
    #[error("Invalid passthrough output: {0}")]
    PassthroughTemplate(#[source] TemplateError),

    /// No rule matches a source and the unmatched policy is `error`
    #[error("No rule matches input '{}'", path.display())]
    UnmatchedInput { path: PathBuf },

    /// A unit rejected its input
    #[error("{}: {unit}: {source}", path.display())]
    Transform {
        path: PathBuf,
        unit: String,
        #[source]
        source: TransformError,
    },

    /// Two sources resolve to one destination with different content
    #[error(
        "Output collision at '{}': '{}' and '{}' produce different content",
        destination.display(),
        first.display(),
        second.display()
    )]
    Collision { destination: PathBuf, first: PathBuf, second: PathBuf },

    /// An output resolves to the configured asset manifest file
    #[error(
        "Output collision at '{}': '{}' resolves to the asset manifest file",
        destination.display(),
        input.display()
    )]
    ManifestCollision { destination: PathBuf, input: PathBuf },

    /// Reading a source or writing an output failed
    #[error("IO error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the asset manifest failed
    #[error("Asset manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError + '_ {
    move |source| BuildError::Io { path: path.to_path_buf(), source }
}

/// Outputs of a set of targets, before they are written.
#[derive(Debug, Default)]
pub(crate) struct Assembly {
    pub manifest: PipelineManifest,
    pub assets: AssetMap,
    pub deduplicated: usize,
}

/// Build pipeline for executing builds.
#[derive(Debug)]
pub struct Pipeline {
    /// Build context
    context: BuildContext,
    /// Compiled rule table
    rules: RuleTable,
    /// Output template for unmatched sources under the passthrough policy
    passthrough: OutputTemplate,
    /// Chain executor
    executor: ParallelBuild,
    /// Whether to do a dry run (don't write anything)
    dry_run: bool,
}

impl Pipeline {
    /// Create a pipeline using the built-in transform units.
    ///
    /// Compiles and validates the rule table; chain type mismatches are
    /// reported here, before any file is read.
    pub fn new(context: BuildContext) -> Result<Self, BuildError> {
        Self::with_registry(context, &TransformRegistry::with_builtins())
    }

    /// Create a pipeline resolving unit names against `registry`.
    pub fn with_registry(
        context: BuildContext,
        registry: &TransformRegistry,
    ) -> Result<Self, BuildError> {
        let rules = RuleTable::compile(&context.config().rules, registry)?;
        let passthrough = OutputTemplate::parse(&context.config().build.passthrough_output)
            .map_err(BuildError::PassthroughTemplate)?;
        let executor = match context.jobs() {
            Some(jobs) => ParallelBuild::new().with_jobs(jobs),
            None => ParallelBuild::new(),
        };
        Ok(Self { context, rules, passthrough, executor, dry_run: false })
    }

    /// Set dry-run mode (run every chain but don't write anything).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get the build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Get the compiled rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Discover sources and classify them, without reading any of them.
    pub fn plan(&self) -> Result<BuildPlan, BuildError> {
        let sources = discover_all_sources(&self.context)?;
        create_build_plan(&self.context, &self.rules, &sources)
    }

    /// Run the build pipeline and write the outputs.
    ///
    /// In dry-run mode this is [`Pipeline::run_in_memory`].
    pub fn run(&self) -> Result<BuildReport, BuildError> {
        if self.dry_run {
            return self.run_in_memory();
        }

        let start = Instant::now();
        let plan = self.plan()?;
        let assembly = self.assemble(&plan)?;
        self.write_all(&assembly.manifest)?;

        let report = self.report(&plan, assembly, true).with_duration(start.elapsed());
        tracing::info!(
            outputs = report.output_count(),
            sources = report.sources,
            out = %self.context.out_dir().display(),
            "build finished in {:?}",
            report.duration
        );
        Ok(report)
    }

    /// Run every chain and assemble the manifest without touching disk.
    pub fn run_in_memory(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let plan = self.plan()?;
        let assembly = self.assemble(&plan)?;
        Ok(self.report(&plan, assembly, false).with_duration(start.elapsed()))
    }

    pub(crate) fn report(
        &self,
        plan: &BuildPlan,
        assembly: Assembly,
        written: bool,
    ) -> BuildReport {
        BuildReport {
            manifest: assembly.manifest,
            sources: plan.len(),
            skipped: plan.skipped().to_vec(),
            deduplicated: assembly.deduplicated,
            written,
            duration: Default::default(),
        }
    }

    /// Execute both waves of a plan and collect every output.
    pub(crate) fn assemble(&self, plan: &BuildPlan) -> Result<Assembly, BuildError> {
        if self.context.is_verbose() {
            tracing::info!("Build plan: {} targets", plan.len());
            for target in plan.targets() {
                tracing::info!("  - {} ({}, {})", target.id(), target.kind, target.wave);
            }
        }

        let mut assembly = Assembly::default();

        let assets: Vec<&BuildTarget> = plan.wave(Wave::Assets).collect();
        let produced = self.execute_targets(&assets, &Arc::default())?;
        for (target, outputs) in assets.iter().zip(produced) {
            if let Some(url) = self.asset_url(&outputs) {
                assembly.assets.insert(target.id(), url);
            }
            assembly.insert_all(outputs)?;
        }

        let templates: Vec<&BuildTarget> = plan.wave(Wave::Templates).collect();
        if !templates.is_empty() {
            let produced = self.execute_targets(&templates, &Arc::new(assembly.assets.clone()))?;
            for outputs in produced {
                assembly.insert_all(outputs)?;
            }
        }
        self.check_manifest_file(&assembly.manifest)?;

        Ok(assembly)
    }

    /// Public URL of the primary output of a target.
    pub(crate) fn asset_url(&self, outputs: &[OutputArtifact]) -> Option<String> {
        outputs.first().map(|o| self.context.public_url(&o.url_path()))
    }

    /// Read, transform and place a set of targets.
    ///
    /// Results are in target order; each target's primary output comes first.
    pub(crate) fn execute_targets(
        &self,
        targets: &[&BuildTarget],
        assets: &Arc<AssetMap>,
    ) -> Result<Vec<Vec<OutputArtifact>>, BuildError> {
        let src_dir = self.context.src_dir();
        let sources = self
            .executor
            .map(targets, |target| read_source(&src_dir, target))
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let jobs: Vec<ChainJob<'_>> = targets
            .iter()
            .zip(&sources)
            .map(|(target, source)| ChainJob { source, chain: self.chain_for(target) })
            .collect();

        let options =
            TransformOptions { assets: Arc::clone(assets), ..self.context.transform_options() };
        let produced = self.executor.run_chains(&jobs, &options)?;

        Ok(targets
            .iter()
            .zip(produced)
            .map(|(target, artifacts)| self.place(target, artifacts))
            .collect())
    }

    fn chain_for(&self, target: &BuildTarget) -> &[Arc<dyn Transform>] {
        match target.action {
            TargetAction::Rule(index) => {
                self.rules.get(index).map(|r| r.chain.as_slice()).unwrap_or(&[])
            }
            TargetAction::Passthrough => &[],
        }
    }

    fn template_for(&self, target: &BuildTarget) -> &OutputTemplate {
        match target.action {
            TargetAction::Rule(index) => {
                self.rules.get(index).map(|r| &r.output).unwrap_or(&self.passthrough)
            }
            TargetAction::Passthrough => &self.passthrough,
        }
    }

    /// Resolve destinations for the artifacts of one target.
    ///
    /// A produced source map becomes a `<destination>.map` sidecar and the
    /// primary gets a `sourceMappingURL` comment. The hash covers the content
    /// before the comment is appended.
    fn place(&self, target: &BuildTarget, artifacts: Vec<Artifact>) -> Vec<OutputArtifact> {
        let template = self.template_for(target);
        let hash_names = self.context.flags().hash_names;
        let mut outputs = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let destination =
                template.resolve(&target.source, &artifact.path, &artifact.content, hash_names);
            let mut content = artifact.content;

            let sidecar = match artifact.source_map {
                Some(map) if artifact.kind.supports_source_map() => {
                    let map_destination = map_path(&destination);
                    let name = map_destination
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    content.extend_from_slice(source_map_comment(artifact.kind, &name).as_bytes());
                    Some(OutputArtifact {
                        destination: map_destination,
                        source: target.source.clone(),
                        kind: AssetKind::Other,
                        content: map.into_bytes(),
                    })
                }
                _ => None,
            };

            tracing::debug!(
                source = %target.id(),
                destination = %destination.display(),
                "resolved output"
            );
            outputs.push(OutputArtifact {
                destination,
                source: target.source.clone(),
                kind: artifact.kind,
                content,
            });
            outputs.extend(sidecar);
        }

        outputs
    }

    /// Write a complete manifest to the output root in one staged step.
    ///
    /// With the `clean` flag the output root is replaced; otherwise staged
    /// files are merged into it. On failure the staging directory is removed
    /// and the output root is left as it was.
    pub(crate) fn write_all(&self, manifest: &PipelineManifest) -> Result<(), BuildError> {
        let out_dir = self.context.out_dir();
        let staging = staging_dir(&out_dir);
        let clean = self.context.flags().clean;

        let result = self.stage(&staging, manifest.iter()).and_then(|mut staged| {
            staged.extend(self.stage_asset_manifest(&staging, manifest)?);

            if clean {
                if out_dir.exists() {
                    fs::remove_dir_all(&out_dir).map_err(io_error(&out_dir))?;
                }
                fs::rename(&staging, &out_dir).map_err(io_error(&out_dir))
            } else {
                merge_staged(&staging, &out_dir, &staged)
            }
        });

        if result.is_err() && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }

    /// Write outputs into a fresh staging directory.
    ///
    /// Returns the staged paths relative to the staging root.
    pub(crate) fn stage<'a>(
        &self,
        staging: &Path,
        outputs: impl IntoIterator<Item = &'a OutputArtifact>,
    ) -> Result<Vec<PathBuf>, BuildError> {
        if staging.exists() {
            fs::remove_dir_all(staging).map_err(io_error(staging))?;
        }
        fs::create_dir_all(staging).map_err(io_error(staging))?;

        let mut staged = Vec::new();
        for output in outputs {
            let path = staging.join(&output.destination);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::write(&path, &output.content).map_err(io_error(&path))?;
            staged.push(output.destination.clone());
        }
        Ok(staged)
    }
}

impl Pipeline {
    /// Destination of the JSON asset manifest, if configured.
    fn manifest_destination(&self) -> Option<PathBuf> {
        let name = self.context.config().build.manifest_file.as_deref()?;
        Some(Path::new(name).components().filter(|c| !matches!(c, Component::CurDir)).collect())
    }

    /// Fail if an output claims the asset manifest's destination.
    pub(crate) fn check_manifest_file(
        &self,
        manifest: &PipelineManifest,
    ) -> Result<(), BuildError> {
        match self.manifest_destination() {
            Some(destination) => match manifest.get(&destination) {
                Some(output) => Err(BuildError::ManifestCollision {
                    input: output.source.clone(),
                    destination,
                }),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Save the JSON asset manifest into the staging root, if configured.
    pub(crate) fn stage_asset_manifest(
        &self,
        staging: &Path,
        manifest: &PipelineManifest,
    ) -> Result<Option<PathBuf>, BuildError> {
        let Some(destination) = self.manifest_destination() else {
            return Ok(None);
        };
        self.check_manifest_file(manifest)?;
        let public_path = &self.context.config().build.public_path;
        let file = manifest.to_asset_manifest(self.context.mode(), public_path);
        file.save(&staging.join(&destination))?;
        Ok(Some(destination))
    }
}

impl Assembly {
    pub(crate) fn insert_all(&mut self, outputs: Vec<OutputArtifact>) -> Result<(), BuildError> {
        for output in outputs {
            if self.manifest.insert(output)? == Inserted::Duplicate {
                self.deduplicated += 1;
            }
        }
        Ok(())
    }
}

fn read_source(src_dir: &Path, target: &BuildTarget) -> Result<SourceArtifact, BuildError> {
    let path = src_dir.join(&target.source);
    let content = fs::read(&path).map_err(io_error(&path))?;
    Ok(SourceArtifact::new(target.source.clone(), target.kind, content))
}

/// Sibling staging directory for an output root: `build` → `.build.staging`.
pub(crate) fn staging_dir(out_dir: &Path) -> PathBuf {
    let name = out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".into());
    out_dir.with_file_name(format!(".{}.staging", name))
}

/// Move staged files into the output root, then drop the staging directory.
pub(crate) fn merge_staged(
    staging: &Path,
    out_dir: &Path,
    staged: &[PathBuf],
) -> Result<(), BuildError> {
    fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;
    for relative in staged {
        let from = staging.join(relative);
        let to = out_dir.join(relative);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::rename(&from, &to).map_err(io_error(&to))?;
    }
    fs::remove_dir_all(staging).map_err(io_error(staging))
}

fn map_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".map");
    destination.with_file_name(name)
}

fn source_map_comment(kind: AssetKind, name: &str) -> String {
    match kind {
        AssetKind::Style => format!("\n/*# sourceMappingURL={} */", name),
        _ => format!("\n//# sourceMappingURL={}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_config, AssetConfig, ProfileConfig, RuleConfig, UnmatchedPolicy};
    use crate::mode::RunMode;
    use crate::output::content_hash;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn create_test_context(config: AssetConfig) -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        (temp, ctx)
    }

    fn production() -> AssetConfig {
        let mut config = default_config();
        config.build.mode = RunMode::Production;
        config
    }

    #[test]
    fn test_pipeline_empty_build() {
        let (temp, ctx) = create_test_context(default_config());
        let report = Pipeline::new(ctx).unwrap().run().unwrap();

        assert_eq!(report.output_count(), 0);
        assert!(report.written);
        assert!(temp.path().join("build").is_dir());
    }

    #[test]
    fn test_pipeline_missing_source_root() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let err = Pipeline::new(ctx).unwrap().run().unwrap_err();
        assert!(matches!(err, BuildError::Discovery(DiscoveryError::SourceNotFound(_))));
    }

    #[test]
    fn test_pipeline_rule_error_before_io() {
        let mut config = default_config();
        config.rules = vec![RuleConfig::new("bad", r"\.sass$", &["sass", "script"], "[name].js")];
        let (temp, ctx) = create_test_context(config);

        assert!(matches!(Pipeline::new(ctx), Err(BuildError::Rule(_))));
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_pipeline_invalid_passthrough_template() {
        let mut config = default_config();
        config.build.passthrough_output = "[bogus]".to_string();
        let (_temp, ctx) = create_test_context(config);
        assert!(matches!(Pipeline::new(ctx), Err(BuildError::PassthroughTemplate(_))));
    }

    #[test]
    fn test_pipeline_plan() {
        let (temp, ctx) = create_test_context(default_config());
        create_test_file(temp.path(), "src/app.js", "let a = 1;");
        create_test_file(temp.path(), "src/index.html", "<p>x</p>");

        let plan = Pipeline::new(ctx).unwrap().plan().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.wave(Wave::Templates).count(), 1);
    }

    #[test]
    fn test_production_build_hashes_and_minifies() {
        let (temp, ctx) = create_test_context(production());
        create_test_file(temp.path(), "src/sass/style.sass", "$c: red\nbody\n  color: $c\n");

        let report = Pipeline::new(ctx).unwrap().run().unwrap();
        assert_eq!(report.output_count(), 1);

        let expected = format!("css/style.{}.css", content_hash(b"body{color:red}", 8));
        let written = fs::read_to_string(temp.path().join("build").join(&expected)).unwrap();
        assert_eq!(written, "body{color:red}");
    }

    #[test]
    fn test_development_build_writes_source_maps() {
        let (temp, ctx) = create_test_context(default_config());
        create_test_file(temp.path(), "src/app.js", "let a = 1;\nlet b = 2;\n");

        Pipeline::new(ctx).unwrap().run().unwrap();

        let out = temp.path().join("build/js");
        let script = fs::read_to_string(out.join("app.js")).unwrap();
        assert!(script.ends_with("\n//# sourceMappingURL=app.js.map"));
        let map = fs::read_to_string(out.join("app.js.map")).unwrap();
        assert!(map.contains("\"version\":3"));
    }

    #[test]
    fn test_templates_see_asset_urls() {
        let mut config = production();
        config.build.public_path = "/static".to_string();
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/app.js", "let a = 1;");
        create_test_file(
            temp.path(),
            "src/index.html",
            "<html>\n<body>\n<script src=\"{{ asset \"app.js\" }}\"></script>\n</body>\n</html>\n",
        );

        let report = Pipeline::new(ctx).unwrap().run().unwrap();
        let page = fs::read_to_string(temp.path().join("build/index.html")).unwrap();
        let script = report.manifest.destinations_for(Path::new("app.js"))[0].to_path_buf();

        assert!(page.contains(&format!("src=\"/static/{}\"", script.display())));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_passthrough_and_skip() {
        let (temp, ctx) = create_test_context(default_config());
        create_test_file(temp.path(), "src/docs/robots.txt", "User-agent: *");

        Pipeline::new(ctx).unwrap().run().unwrap();
        let copied = fs::read_to_string(temp.path().join("build/docs/robots.txt")).unwrap();
        assert_eq!(copied, "User-agent: *");

        let mut config = default_config();
        config.build.unmatched = UnmatchedPolicy::Skip;
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/robots.txt", "x");
        let report = Pipeline::new(ctx).unwrap().run().unwrap();
        assert_eq!(report.skipped, vec![PathBuf::from("robots.txt")]);
        assert!(!temp.path().join("build/robots.txt").exists());
    }

    #[test]
    fn test_collision_writes_nothing() {
        let mut config = default_config();
        config.rules = vec![RuleConfig::new("flat", r".*", &[], "static/[name].[ext]")];
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/a/logo.txt", "one");
        create_test_file(temp.path(), "src/b/logo.txt", "two");

        let err = Pipeline::new(ctx).unwrap().run().unwrap_err();
        assert!(matches!(err, BuildError::Collision { .. }));
        assert!(!temp.path().join("build").exists());
        assert!(!temp.path().join(".build.staging").exists());
    }

    #[test]
    fn test_identical_collision_is_deduplicated() {
        let mut config = default_config();
        config.rules = vec![RuleConfig::new("flat", r".*", &[], "static/[name].[ext]")];
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/a/logo.txt", "same");
        create_test_file(temp.path(), "src/b/logo.txt", "same");

        let report = Pipeline::new(ctx).unwrap().run().unwrap();
        assert_eq!(report.output_count(), 1);
        assert_eq!(report.deduplicated, 1);
    }

    #[test]
    fn test_output_at_manifest_file_is_collision() {
        let mut config = default_config();
        config.build.manifest_file = Some("./asset-manifest.json".to_string());
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/asset-manifest.json", "{\"mine\":true}");
        create_test_file(temp.path(), "build/asset-manifest.json", "{\"mine\":true}");

        match Pipeline::new(ctx.clone()).unwrap().run().unwrap_err() {
            BuildError::ManifestCollision { destination, input } => {
                assert_eq!(destination, PathBuf::from("asset-manifest.json"));
                assert_eq!(input, PathBuf::from("asset-manifest.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let on_disk = fs::read_to_string(temp.path().join("build/asset-manifest.json")).unwrap();
        assert_eq!(on_disk, "{\"mine\":true}");

        let dry_run = Pipeline::new(ctx).unwrap().with_dry_run(true).run();
        assert!(matches!(dry_run, Err(BuildError::ManifestCollision { .. })));
    }

    #[test]
    fn test_transform_error_carries_path_and_unit() {
        let (temp, ctx) = create_test_context(default_config());
        create_test_file(temp.path(), "src/broken.js", "let s = 'oops;\n");

        match Pipeline::new(ctx).unwrap().run().unwrap_err() {
            BuildError::Transform { path, unit, source } => {
                assert_eq!(path, PathBuf::from("broken.js"));
                assert_eq!(unit, "script");
                assert_eq!(source.line, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_clean_replaces_and_merge_keeps_stale_files() {
        let mut config = production();
        config.build.manifest_file = Some("asset-manifest.json".to_string());
        let (temp, ctx) = create_test_context(config);
        create_test_file(temp.path(), "src/a.txt", "a");
        create_test_file(temp.path(), "build/stale.txt", "old");

        Pipeline::new(ctx).unwrap().run().unwrap();
        assert!(!temp.path().join("build/stale.txt").exists());
        assert!(temp.path().join("build/asset-manifest.json").exists());

        let mut config = default_config();
        config.profiles.development = ProfileConfig { clean: Some(false), ..Default::default() };
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        create_test_file(temp.path(), "build/stale.txt", "old");
        Pipeline::new(ctx).unwrap().run().unwrap();
        assert!(temp.path().join("build/stale.txt").exists());
        assert!(temp.path().join("build/a.txt").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (temp, ctx) = create_test_context(default_config());
        create_test_file(temp.path(), "src/a.txt", "a");

        let report = Pipeline::new(ctx).unwrap().with_dry_run(true).run().unwrap();
        assert_eq!(report.output_count(), 1);
        assert!(!report.written);
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_staging_dir_and_map_path() {
        assert_eq!(staging_dir(Path::new("/p/build")), PathBuf::from("/p/.build.staging"));
        assert_eq!(map_path(Path::new("css/a.css")), PathBuf::from("css/a.css.map"));
        assert_eq!(
            source_map_comment(AssetKind::Style, "a.css.map"),
            "\n/*# sourceMappingURL=a.css.map */"
        );
    }
}
