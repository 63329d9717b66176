//! Build context containing the paths and switches for one pipeline run.

use crate::cache::CACHE_FILENAME;
use crate::config::PipelineConfig;
use std::path::{Path, PathBuf};

/// Paths and switches for a pipeline run.
///
/// The context is all the pipeline needs from its caller: where to read,
/// where to write, and where the cache lives.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Input root: a directory, or a single file
    input: PathBuf,
    /// Output root
    output_root: PathBuf,
    /// Explicit cache file; defaults to `.import-cache.json` in the output root
    cache_path: Option<PathBuf>,
    /// Worker threads for the write phase
    jobs: usize,
    /// Treat every input as stale
    force: bool,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(input: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_root: output_root.into(),
            cache_path: None,
            jobs: 1,
            force: false,
            verbose: false,
        }
    }

    /// Create a context from a loaded `assetpipe.toml`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut ctx = Self::new(&config.project.input, &config.project.output)
            .with_jobs(config.build.jobs)
            .with_force(config.build.force);
        ctx.cache_path = config.project.cache.clone();
        ctx
    }

    /// Get the input path.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Get the output root.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Cache file location.
    pub fn cache_path(&self) -> PathBuf {
        match &self.cache_path {
            Some(path) => path.clone(),
            None => self.output_root.join(CACHE_FILENAME),
        }
    }

    /// Number of parallel jobs (at least 1).
    pub fn jobs(&self) -> usize {
        self.jobs.max(1)
    }

    /// Whether every input is rebuilt regardless of the cache.
    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set the cache file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set force mode.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
