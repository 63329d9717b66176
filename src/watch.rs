//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for the `apipe build --watch`
//! command. Each rebuild constructs a fresh [`ImportPipeline`], so config
//! edits are picked up and the cache decides what actually runs.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildContext, BuildError, BuildResult, ImportPipeline, ProgressReporter};
use crate::config::WatchConfig;
use crate::paths;

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
    /// Input path not found
    #[error("Input path not found: {}", .0.display())]
    InputNotFound(PathBuf),
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Build to rerun on every change
    pub context: BuildContext,
    /// Watch configuration (debounce, clear screen)
    pub config: WatchConfig,
}

impl WatchOptions {
    pub fn new(context: BuildContext, config: WatchConfig) -> Self {
        Self { context, config }
    }

    /// Directory to watch: the input root, or a single input file's directory.
    pub fn watch_root(&self) -> PathBuf {
        let input = paths::resolve(self.context.input());
        if input.is_file() {
            input.parent().map(Path::to_path_buf).unwrap_or(input)
        } else {
            input
        }
    }

    /// Whether a change to `path` should trigger a rebuild.
    ///
    /// Writes under the output root and to the cache file are the build's own
    /// and are ignored.
    pub fn is_relevant_change(&self, path: &Path) -> bool {
        let path = paths::resolve(path);
        let output_root = paths::resolve(self.context.output_root());
        let cache_path = paths::resolve(&self.context.cache_path());
        path.starts_with(self.watch_root()) && !path.starts_with(output_root) && path != cache_path
    }
}

/// Run one build with a freshly scanned pipeline.
pub fn rebuild(
    context: &BuildContext,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult, BuildError> {
    ImportPipeline::new(context.clone())?.run(progress)
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn build_once(options: &WatchOptions, progress: &dyn ProgressReporter, had_error: &mut bool) {
    if options.config.clear_screen {
        clear_screen();
    }
    println!("[{}] Building...", timestamp());
    match rebuild(&options.context, progress) {
        Ok(result) => {
            if *had_error {
                println!("[{}] Recovered from previous error", timestamp());
            }
            *had_error = false;
            tracing::debug!(summary = %result.summary(), "watch rebuild finished");
        }
        Err(e) => {
            // Reported through the progress sink; keep watching.
            tracing::debug!(error = %e, "watch rebuild failed");
            *had_error = true;
        }
    }
}

/// Watch for file changes and rebuild automatically.
///
/// This function blocks and runs until interrupted (Ctrl+C). Build failures
/// are reported and watching continues.
///
/// # Example
/// ```ignore
/// let context = BuildContext::new("assets", "build");
/// watch_and_rebuild(WatchOptions::new(context, WatchConfig::default()), &ConsoleProgress::new())?;
/// ```
pub fn watch_and_rebuild(
    options: WatchOptions,
    progress: &dyn ProgressReporter,
) -> Result<(), WatchError> {
    if !options.context.input().exists() {
        return Err(WatchError::InputNotFound(options.context.input().to_path_buf()));
    }
    let root = options.watch_root();

    // Create channel for debounced events
    let (tx, rx) = channel();

    // Create debounced watcher
    let debounce_duration = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    debouncer.watcher().watch(&root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    let mut had_error = false;
    build_once(&options, progress, &mut had_error);
    println!("[{}] Watching {} for changes...", timestamp(), root.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        matches!(e.kind, DebouncedEventKind::Any)
                            && options.is_relevant_change(&e.path)
                    })
                    .collect();
                if relevant.is_empty() {
                    continue;
                }

                for event in &relevant {
                    println!("[{}] Changed: {}", timestamp(), event.path.display());
                }
                build_once(&options, progress, &mut had_error);
                println!("[{}] Watching {} for changes...", timestamp(), root.display());
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                tracing::warn!(error = ?error, "watch error, continuing");
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}
