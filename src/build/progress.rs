//! Build progress reporting.
//!
//! The pipeline reports what it does through a [`ProgressReporter`]. Reporters
//! are shared with worker threads, so they take `&self` and must be `Sync`.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{ConsoleProgress, ImportPipeline};
//!
//! let reporter = ConsoleProgress::new().with_verbose(true);
//! let result = pipeline.run(&reporter)?;
//! ```

use crate::build::OperationStatus;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Events that can be reported during a build.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Execution started
    BuildStarted {
        /// Number of planned operations
        total_operations: usize,
    },
    /// An operation is about to run
    OperationStarted { operation_id: String },
    /// An operation finished
    OperationCompleted {
        operation_id: String,
        status: OperationStatus,
        /// Outputs written
        written: usize,
        duration_ms: u64,
    },
    /// A combined header was regenerated
    CombinedHeaderWritten { path: PathBuf },
    /// The cache file was rewritten
    CacheSaved { path: PathBuf },
    /// Execution finished
    BuildCompleted {
        duration_ms: u64,
        built: usize,
        cached: usize,
        declined: usize,
    },
    /// A warning was generated
    Warning {
        /// Operation that generated the warning (if applicable)
        operation_id: Option<String>,
        message: String,
    },
    /// The build failed
    Error { message: String },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to list cached operations too
    verbose: bool,
    /// Completed operation count
    current: AtomicUsize,
    /// Total operation count
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, "\x1b[1m")
    }

    /// Write a line to output.
    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_operations } => {
                self.total.store(total_operations, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_operations > 0 {
                    self.writeln(&format!(
                        "{} Importing {} operation{}...",
                        self.cyan("[build]"),
                        total_operations,
                        if total_operations == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::OperationStarted { .. } => {}
            ProgressEvent::OperationCompleted { operation_id, status, written, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                if status == OperationStatus::Cached && !self.verbose {
                    return;
                }
                let status_str = match status {
                    OperationStatus::Built => self.green("ok"),
                    OperationStatus::Cached => self.yellow("cached"),
                    OperationStatus::Declined => self.yellow("declined"),
                };
                let detail = match status {
                    OperationStatus::Built => format!(
                        " ({} output{}, {})",
                        written,
                        if written == 1 { "" } else { "s" },
                        format_duration(duration_ms)
                    ),
                    _ => String::new(),
                };
                self.writeln(&format!(
                    "{} [{}/{}] {} {}{}",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    operation_id,
                    detail
                ));
            }
            ProgressEvent::CombinedHeaderWritten { path } => {
                self.writeln(&format!("{} combined {}", self.cyan("[header]"), path.display()));
            }
            ProgressEvent::CacheSaved { path } => {
                if self.verbose {
                    self.writeln(&format!("{} saved {}", self.cyan("[cache]"), path.display()));
                }
            }
            ProgressEvent::BuildCompleted { duration_ms, built, cached, declined } => {
                let mut line = format!(
                    "{} {} built, {} cached",
                    self.green("[done]"),
                    self.bold(&built.to_string()),
                    cached
                );
                if declined > 0 {
                    line.push_str(&format!(", {} declined", declined));
                }
                line.push_str(&format!(" in {}", format_duration(duration_ms)));
                self.writeln(&line);
            }
            ProgressEvent::Warning { operation_id, message } => {
                let prefix = match operation_id {
                    Some(id) => format!("{}: ", id),
                    None => String::new(),
                };
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { message } => {
                self.writeln(&format!("{} {}", self.red("[error]"), message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stdout.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stdout())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BuildStarted { total_operations } => {
                json!({"event": "build_started", "total_operations": total_operations})
            }
            ProgressEvent::OperationStarted { operation_id } => {
                json!({"event": "operation_started", "operation_id": operation_id})
            }
            ProgressEvent::OperationCompleted { operation_id, status, written, duration_ms } => {
                json!({
                    "event": "operation_completed",
                    "operation_id": operation_id,
                    "status": status.to_string(),
                    "written": written,
                    "duration_ms": duration_ms,
                })
            }
            ProgressEvent::CombinedHeaderWritten { path } => {
                json!({"event": "combined_header", "path": path.to_string_lossy()})
            }
            ProgressEvent::CacheSaved { path } => {
                json!({"event": "cache_saved", "path": path.to_string_lossy()})
            }
            ProgressEvent::BuildCompleted { duration_ms, built, cached, declined } => {
                json!({
                    "event": "build_completed",
                    "duration_ms": duration_ms,
                    "built": built,
                    "cached": cached,
                    "declined": declined,
                })
            }
            ProgressEvent::Warning { operation_id, message } => {
                json!({"event": "warning", "operation_id": operation_id, "message": message})
            }
            ProgressEvent::Error { message } => json!({"event": "error", "message": message}),
        };
        self.write_json(value);
    }
}

/// Format a duration in milliseconds to a human-readable string.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
