//! Pipeline integration tests
//!
//! Runs whole builds against temporary projects:
//!
//! - Determinism across runs
//! - Passthrough copies and rule-table errors
//! - Destination collisions
//! - Production hashing of compiled styles
//! - Incremental rebuilds

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use assetline::build::{BuildContext, BuildError, IncrementalSession, Pipeline};
use assetline::config::{default_config, AssetConfig, RuleConfig};
use assetline::mode::RunMode;
use assetline::output::content_hash;
use assetline::rules::RuleError;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a test file with content, creating parent directories.
fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn create_project(config: AssetConfig) -> (TempDir, BuildContext) {
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

/// Every file under `dir`, keyed by its slash-separated relative path.
fn read_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut files = BTreeMap::new();
    walk(dir, dir, &mut files);
    files
}

fn sample_site(root: &Path) {
    create_test_file(
        root,
        "src/js/app.js",
        "// entry\nlet greeting = 'hi';\nconsole.log(greeting);\n",
    );
    create_test_file(root, "src/sass/style.sass", "$c: #336699\nbody\n  color: $c\n");
    create_test_file(root, "src/css/print.css", "@media print { body { margin: 0; } }\n");
    create_test_file(
        root,
        "src/index.html",
        "<html>\n  <head>\n    \
         <link rel=\"stylesheet\" href=\"{{ asset \"sass/style.sass\" }}\">\n  \
         </head>\n  <body>\n    \
         <script src=\"{{ asset \"js/app.js\" }}\"></script>\n  \
         </body>\n</html>\n",
    );
    create_test_file(root, "src/robots.txt", "User-agent: *\n");
}

// ============================================================================
// Full Builds
// ============================================================================

#[test]
fn test_builds_are_deterministic() {
    for config in [default_config(), production()] {
        let (temp, ctx) = create_project(config);
        sample_site(temp.path());

        Pipeline::new(ctx.clone()).unwrap().run().unwrap();
        let first = read_tree(&temp.path().join("build"));
        Pipeline::new(ctx).unwrap().run().unwrap();
        let second = read_tree(&temp.path().join("build"));

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}

#[test]
fn test_production_site_resolves_hashed_urls() {
    let (temp, ctx) = create_project(production());
    sample_site(temp.path());

    let report = Pipeline::new(ctx).unwrap().run().unwrap();
    let page = fs::read_to_string(temp.path().join("build/index.html")).unwrap();

    for source in ["js/app.js", "sass/style.sass"] {
        let destinations = report.manifest.destinations_for(Path::new(source));
        assert_eq!(destinations.len(), 1, "{source}");
        let url = format!("/{}", destinations[0].display());
        assert!(page.contains(&url), "page should reference {url}");
    }
    assert!(!page.contains("{{"));
    assert!(report.summary().starts_with("Build succeeded: 5 outputs from 5 sources"));
}

#[test]
fn test_passthrough_copies_verbatim() {
    let (temp, ctx) = create_project(default_config());
    create_test_file(temp.path(), "src/data/feed.xml", "<rss>\n</rss>\n");

    let report = Pipeline::new(ctx).unwrap().run().unwrap();
    assert_eq!(report.output_count(), 1);
    assert_eq!(
        fs::read_to_string(temp.path().join("build/data/feed.xml")).unwrap(),
        "<rss>\n</rss>\n"
    );
}

#[test]
fn test_chain_type_mismatch_fails_before_io() {
    let mut config = default_config();
    config.rules = vec![RuleConfig::new("styles", r"\.sass$", &["sass", "script"], "[name].js")];
    let (temp, ctx) = create_project(config);
    create_test_file(temp.path(), "src/style.sass", "body\n  color: red\n");

    let err = Pipeline::new(ctx).unwrap_err();
    assert!(matches!(err, BuildError::Rule(RuleError::ChainTypeMismatch { .. })));
    assert!(!temp.path().join("build").exists());
}

#[test]
fn test_collision_writes_zero_files() {
    let mut config = default_config();
    config.rules = vec![RuleConfig::new("flat", r"\.txt$", &[], "[name].[ext]")];
    let (temp, ctx) = create_project(config);
    create_test_file(temp.path(), "src/en/notes.txt", "hello");
    create_test_file(temp.path(), "src/fr/notes.txt", "bonjour");

    match Pipeline::new(ctx).unwrap().run().unwrap_err() {
        BuildError::Collision { destination, first, second } => {
            assert_eq!(destination, PathBuf::from("notes.txt"));
            assert_eq!(first, PathBuf::from("en/notes.txt"));
            assert_eq!(second, PathBuf::from("fr/notes.txt"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp.path().join("build").exists());
}

#[test]
fn test_sass_rule_produces_one_hashed_stylesheet() {
    let mut config = production();
    config.rules =
        vec![RuleConfig::new("sass", r"\.sass$", &["sass", "css"], "css/style.[hash].css")];
    let (temp, ctx) = create_project(config);
    create_test_file(temp.path(), "src/style.sass", "body\n  color: red\n");

    let expected = format!("css/style.{}.css", content_hash(b"body{color:red}", 8));
    for _ in 0..2 {
        let report = Pipeline::new(ctx.clone()).unwrap().run().unwrap();
        assert_eq!(report.output_count(), 1);
        let files = read_tree(&temp.path().join("build"));
        assert_eq!(files.keys().collect::<Vec<_>>(), vec![&expected]);
    }
}

#[test]
fn test_same_stem_different_extensions_do_not_collide() {
    let mut config = default_config();
    config.rules = vec![RuleConfig::new("images", r"\.(png|jpg)$", &[], "img/[name].[ext]")];
    let (temp, ctx) = create_project(config);
    create_test_file(temp.path(), "src/a.png", "png-bytes");
    create_test_file(temp.path(), "src/a.jpg", "jpg-bytes");

    let report = Pipeline::new(ctx).unwrap().run().unwrap();
    assert_eq!(report.output_count(), 2);
    assert_eq!(fs::read(temp.path().join("build/img/a.png")).unwrap(), b"png-bytes");
    assert_eq!(fs::read(temp.path().join("build/img/a.jpg")).unwrap(), b"jpg-bytes");
}

#[test]
fn test_asset_manifest_file_lists_outputs() {
    let mut config = production();
    config.build.manifest_file = Some("asset-manifest.json".to_string());
    let (temp, ctx) = create_project(config);
    sample_site(temp.path());

    Pipeline::new(ctx).unwrap().run().unwrap();
    let manifest = fs::read_to_string(temp.path().join("build/asset-manifest.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();

    assert_eq!(json["mode"], "production");
    assert!(json["assets"]["js/app.js"][0]["url"].as_str().unwrap().starts_with("/js/app."));
}

#[test]
fn test_output_root_inside_source_root_is_not_rediscovered() {
    let mut config = default_config();
    config.project.src = PathBuf::from(".");
    let (temp, ctx) = create_project(config.clone());
    create_test_file(temp.path(), "app.css", "a { color: red; }\n");

    let first = Pipeline::new(ctx.clone()).unwrap().run().unwrap();
    let second = Pipeline::new(ctx).unwrap().run().unwrap();
    assert_eq!(first.sources, second.sources);
    assert_eq!(first.output_count(), second.output_count());

    config.project.out = PathBuf::from("build");
    assert!(config.validate().iter().any(|e| e.field == "project.out"));
}

// ============================================================================
// Incremental Rebuilds
// ============================================================================

#[test]
fn test_incremental_rebuild_touches_only_changed_script() {
    let (temp, ctx) = create_project(default_config());
    create_test_file(temp.path(), "src/bundle.js", "let a = 1;\n");
    create_test_file(temp.path(), "src/style.css", "a { color: red; }\n");

    let (mut session, report) = IncrementalSession::start(Pipeline::new(ctx).unwrap()).unwrap();
    assert_eq!(report.output_count(), 4);

    let style = session.manifest().destinations_for(Path::new("style.css"))[0].to_path_buf();
    let style_path = temp.path().join("build").join(&style);
    let style_before = fs::read(&style_path).unwrap();
    let style_mtime = fs::metadata(&style_path).unwrap().modified().unwrap();

    create_test_file(temp.path(), "src/bundle.js", "let a = 2;\n");
    let rebuild = session.rebuild(&[PathBuf::from("bundle.js")]).unwrap();

    assert_eq!(rebuild.rebuilt, vec![PathBuf::from("bundle.js")]);
    assert!(rebuild.written.iter().all(|dest| dest.starts_with("js")));
    assert!(!rebuild.written.is_empty());
    assert_eq!(fs::read(&style_path).unwrap(), style_before);
    assert_eq!(fs::metadata(&style_path).unwrap().modified().unwrap(), style_mtime);

    let script = temp.path().join("build/js/bundle.js");
    assert!(fs::read_to_string(script).unwrap().contains("let a = 2;"));
}
