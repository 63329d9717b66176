//! Configuration schema types for `assetpipe.toml`
//!
//! Defines the structure and validation rules for the project file read by
//! the `apipe` binary. The library itself never reads this file; callers turn
//! it into a [`crate::build::BuildContext`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project paths section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Input root (directory or single file)
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Output root
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Cache file; defaults to `.import-cache.json` in the output root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
}

fn default_input() -> PathBuf {
    PathBuf::from("assets")
}

fn default_output() -> PathBuf {
    PathBuf::from("build")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { input: default_input(), output: default_output(), cache: None }
    }
}

/// Build behaviour section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker threads for the write phase
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Treat every input as stale
    #[serde(default)]
    pub force: bool,
}

fn default_jobs() -> usize {
    1
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { jobs: default_jobs(), force: false }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: true }
    }
}

/// Complete assetpipe.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "build.jobs")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl PipelineConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.input.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.input".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.project.output.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.output".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.project.input == self.project.output {
            errors.push(ConfigValidationError {
                field: "project.output".to_string(),
                message: "must differ from project.input".to_string(),
            });
        }

        if self.build.jobs == 0 {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
