//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for `assetline watch` and
//! `assetline serve`. Changes are fed to an [`IncrementalSession`], so only
//! the affected sources are re-run.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildContext, BuildError, IncrementalSession, RebuildQueue, RebuildReport};
use crate::config::WatchConfig;

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Tracks sources with errors across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Sources that failed the previous rebuild
    files_with_errors: BTreeSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed rebuild.
    pub fn record_failure(&mut self, error: &BuildError) {
        if let Some(path) = error_source(error) {
            self.files_with_errors.insert(path.to_path_buf());
        }
    }

    /// Record a successful rebuild, returns the sources that are fixed now
    pub fn record_success(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.files_with_errors).into_iter().collect()
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

fn error_source(error: &BuildError) -> Option<&Path> {
    match error {
        BuildError::Transform { path, .. } | BuildError::UnmatchedInput { path } => Some(path),
        BuildError::Collision { second, .. } => Some(second),
        BuildError::ManifestCollision { input, .. } => Some(input),
        _ => None,
    }
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Source directory to watch
    pub src_dir: PathBuf,
    /// Watch configuration (debounce, clear screen)
    pub config: WatchConfig,
    /// Verbose output
    pub verbose: bool,
}

impl WatchOptions {
    /// Options for the source root and `[watch]` table of a context.
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self {
            src_dir: ctx.src_dir(),
            config: ctx.config().watch.clone(),
            verbose: ctx.is_verbose(),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { src_dir: PathBuf::from("src"), config: WatchConfig::default(), verbose: false }
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Watch for file changes and rebuild automatically.
///
/// This function blocks and runs until interrupted (Ctrl+C). Every batch of
/// debounced events is coalesced into one rebuild. A failed rebuild is logged
/// and the last good output stays in place; `on_rebuild` runs after each
/// successful rebuild that changed the output.
///
/// # Returns
/// * `Err(WatchError)` if watch setup fails or the event channel closes
pub fn watch_and_rebuild<F>(
    mut session: IncrementalSession,
    options: WatchOptions,
    mut on_rebuild: F,
) -> Result<(), WatchError>
where
    F: FnMut(&RebuildReport),
{
    // Verify source directory exists
    if !options.src_dir.is_dir() {
        return Err(WatchError::SourceNotFound(options.src_dir.clone()));
    }
    // Events arrive with resolved paths
    let src_dir = options.src_dir.canonicalize().unwrap_or_else(|_| options.src_dir.clone());

    // Create channel for debounced events
    let (tx, rx) = channel();

    // Create debounced watcher
    let debounce_duration = Duration::from_millis(u64::from(options.config.debounce_ms));
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    // Start watching the source directory
    debouncer
        .watcher()
        .watch(&src_dir, RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    let mut queue = RebuildQueue::new();
    let mut error_tracker = ErrorTracker::new();
    tracing::info!("Watching {} for changes...", options.src_dir.display());

    // Watch loop
    loop {
        let batch = rx.recv().map_err(|e| WatchError::ChannelError(e.to_string()))?;
        enqueue(&mut queue, &src_dir, batch);
        drain_pending(&rx, &mut queue, &src_dir);

        if queue.is_empty() {
            continue;
        }

        if options.config.clear_screen {
            clear_screen();
        }
        if let Some(report) = rebuild_queued(&mut session, &mut queue, &mut error_tracker) {
            if !report.is_noop() {
                on_rebuild(&report);
            }
        }
        tracing::info!("Watching {} for changes...", options.src_dir.display());
    }
}

/// Move every already-delivered event batch into the queue.
fn drain_pending(rx: &Receiver<DebounceEventResult>, queue: &mut RebuildQueue, src_dir: &Path) {
    while let Ok(batch) = rx.try_recv() {
        enqueue(queue, src_dir, batch);
    }
}

fn enqueue(queue: &mut RebuildQueue, src_dir: &Path, batch: DebounceEventResult) {
    match batch {
        Ok(events) => {
            let paths = events
                .into_iter()
                .filter(|e| {
                    matches!(e.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous)
                })
                .map(|e| e.path);
            queue.extend(relevant_paths(src_dir, paths));
        }
        Err(error) => {
            // Watch error (non-fatal) - log but continue watching
            tracing::warn!("Watch error: {:?}", error);
        }
    }
}

/// Paths under `src_dir`, made relative to it.
fn relevant_paths<I>(src_dir: &Path, paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    paths
        .into_iter()
        .filter_map(|path| path.strip_prefix(src_dir).ok().map(Path::to_path_buf))
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

/// Run one rebuild for everything queued.
///
/// Failures are logged and recorded; the session keeps its last good state.
pub fn rebuild_queued(
    session: &mut IncrementalSession,
    queue: &mut RebuildQueue,
    tracker: &mut ErrorTracker,
) -> Option<RebuildReport> {
    let changed = queue.drain();
    for path in &changed {
        tracing::info!("Changed: {}", path.display());
    }

    match session.rebuild(&changed) {
        Ok(report) => {
            for fixed in tracker.record_success() {
                tracing::info!("Fixed: {}", fixed.display());
            }
            tracing::info!(
                "Rebuild complete ({}) - written: {} | removed: {}",
                format_duration(report.duration),
                report.written.len(),
                report.removed.len()
            );
            Some(report)
        }
        Err(error) => {
            tracker.record_failure(&error);
            tracing::error!("Rebuild failed: {}", error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Pipeline;
    use crate::config::default_config;
    use crate::transforms::TransformError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watch_options_default() {
        let options = WatchOptions::default();
        assert_eq!(options.src_dir, PathBuf::from("src"));
        assert_eq!(options.config.debounce_ms, 100);
        assert!(options.config.clear_screen);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_relevant_paths() {
        let src = Path::new("/project/src");
        let paths = relevant_paths(
            src,
            vec![
                PathBuf::from("/project/src/js/app.js"),
                PathBuf::from("/project/build/js/app.js"),
                PathBuf::from("/project/src"),
            ],
        );
        assert_eq!(paths, vec![PathBuf::from("js/app.js")]);
    }

    #[test]
    fn test_error_tracker_detects_fixed_files() {
        let mut tracker = ErrorTracker::new();
        assert!(!tracker.has_errors());

        tracker.record_failure(&BuildError::Transform {
            path: PathBuf::from("app.js"),
            unit: "script".to_string(),
            source: TransformError::new("boom"),
        });
        tracker.record_failure(&BuildError::UnmatchedInput { path: PathBuf::from("notes.md") });
        assert_eq!(tracker.error_count(), 2);

        let fixed = tracker.record_success();
        assert_eq!(fixed, vec![PathBuf::from("app.js"), PathBuf::from("notes.md")]);
        assert!(!tracker.has_errors());
    }

    #[test]
    fn test_watch_error_source_not_found() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let (session, _) = IncrementalSession::start(Pipeline::new(ctx).unwrap()).unwrap();

        let options =
            WatchOptions { src_dir: PathBuf::from("/nonexistent/path"), ..Default::default() };
        let result = watch_and_rebuild(session, options, |_| {});
        assert!(matches!(result, Err(WatchError::SourceNotFound(_))));
    }

    #[test]
    fn test_rebuild_queued_recovers_after_failure() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("app.js"), "let a = 1;").unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let (mut session, _) = IncrementalSession::start(Pipeline::new(ctx).unwrap()).unwrap();

        let mut queue = RebuildQueue::new();
        let mut tracker = ErrorTracker::new();

        fs::write(src.join("app.js"), "let s = 'broken;").unwrap();
        queue.push("app.js");
        queue.push("app.js");
        assert!(rebuild_queued(&mut session, &mut queue, &mut tracker).is_none());
        assert!(queue.is_empty());
        assert_eq!(tracker.error_count(), 1);

        fs::write(src.join("app.js"), "let a = 2;").unwrap();
        queue.push("app.js");
        let report = rebuild_queued(&mut session, &mut queue, &mut tracker).unwrap();
        assert_eq!(report.rebuilt, vec![PathBuf::from("app.js")]);
        assert!(!tracker.has_errors());
    }
}
