//! Build result types.
//!
//! Contains types for representing the outcome of a pipeline run.

use std::path::PathBuf;
use std::time::Duration;

/// What happened to a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// At least one output was written
    Built,
    /// Input and outputs were up to date; the importer was not invoked
    Cached,
    /// The importer declined the input
    Declined,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Built => write!(f, "built"),
            OperationStatus::Cached => write!(f, "cached"),
            OperationStatus::Declined => write!(f, "declined"),
        }
    }
}

/// Result of running a single operation.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Operation ID (`importer:relative/path`)
    pub operation_id: String,
    pub status: OperationStatus,
    /// Outputs written this run
    pub written: Vec<PathBuf>,
    /// Outputs left in place because they existed and the input was cached
    pub kept: Vec<PathBuf>,
    pub duration: Duration,
}

impl OperationResult {
    /// Create a built result.
    pub fn built(
        operation_id: String,
        written: Vec<PathBuf>,
        kept: Vec<PathBuf>,
        duration: Duration,
    ) -> Self {
        Self { operation_id, status: OperationStatus::Built, written, kept, duration }
    }

    /// Create a cached result.
    pub fn cached(operation_id: String, outputs: Vec<PathBuf>) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Cached,
            written: vec![],
            kept: outputs,
            duration: Duration::ZERO,
        }
    }

    /// Create a declined result.
    pub fn declined(operation_id: String, duration: Duration) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Declined,
            written: vec![],
            kept: vec![],
            duration,
        }
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each operation, in operation order
    pub operations: Vec<OperationResult>,
    /// Combined headers written by aggregation
    pub combined_headers: Vec<PathBuf>,
    /// Whether the cache file was rewritten
    pub cache_saved: bool,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation result.
    pub fn add_result(&mut self, result: OperationResult) {
        self.operations.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    fn count(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|r| r.status == status).count()
    }

    pub fn built_count(&self) -> usize {
        self.count(OperationStatus::Built)
    }

    pub fn cached_count(&self) -> usize {
        self.count(OperationStatus::Cached)
    }

    pub fn declined_count(&self) -> usize {
        self.count(OperationStatus::Declined)
    }

    /// Every output written this run, combined headers included.
    pub fn written_outputs(&self) -> Vec<&PathBuf> {
        self.operations
            .iter()
            .flat_map(|r| r.written.iter())
            .chain(self.combined_headers.iter())
            .collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Build succeeded: {} built, {} cached ({} total) in {:?}",
            self.built_count(),
            self.cached_count(),
            self.operations.len(),
            self.total_duration
        );
        let declined = self.declined_count();
        if declined > 0 {
            line.push_str(&format!(", {} declined", declined));
        }
        if !self.combined_headers.is_empty() {
            line.push_str(&format!(", {} combined headers", self.combined_headers.len()));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(OperationStatus::Built.to_string(), "built");
        assert_eq!(OperationStatus::Cached.to_string(), "cached");
        assert_eq!(OperationStatus::Declined.to_string(), "declined");
    }

    #[test]
    fn test_build_result_counts() {
        let mut result = BuildResult::new();
        result.add_result(OperationResult::built(
            "copy:a".to_string(),
            vec![PathBuf::from("out/a")],
            vec![],
            Duration::ZERO,
        ));
        result.add_result(OperationResult::cached("copy:b".to_string(), vec![PathBuf::from("out/b")]));
        result.add_result(OperationResult::declined("copy:c".to_string(), Duration::ZERO));

        assert_eq!(result.built_count(), 1);
        assert_eq!(result.cached_count(), 1);
        assert_eq!(result.declined_count(), 1);
        assert_eq!(result.written_outputs(), vec![&PathBuf::from("out/a")]);
    }

    #[test]
    fn test_written_outputs_include_combined_headers() {
        let mut result = BuildResult::new();
        result.combined_headers.push(PathBuf::from("out/shape.h"));
        assert_eq!(result.written_outputs().len(), 1);
    }

    #[test]
    fn test_summary() {
        let mut result = BuildResult::new();
        result.add_result(OperationResult::built(
            "copy:a".to_string(),
            vec![],
            vec![],
            Duration::from_millis(5),
        ));
        result.add_result(OperationResult::declined("copy:b".to_string(), Duration::ZERO));

        let summary = result.with_duration(Duration::from_millis(100)).summary();
        assert!(summary.contains("Build succeeded"));
        assert!(summary.contains("1 built"));
        assert!(summary.contains("1 declined"));
    }
}
