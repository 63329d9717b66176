use crate::config::{deep_merge, Params};
use crate::paths;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One input file as seen by an importer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Input root
    pub base_path: PathBuf,
    /// Parameters the file's own config gives this importer
    pub config: Params,
    /// Directory-wide defaults for this importer, merged root to leaf
    pub dir_config: Params,
    /// Glob captures from the directory entry that matched this file
    pub path_matches: Vec<String>,
}

impl Input {
    pub fn new(path: &Path, base_path: &Path) -> Self {
        Self { path: path.to_path_buf(), base_path: base_path.to_path_buf(), ..Default::default() }
    }

    pub fn with_config(mut self, config: Params) -> Self {
        self.config = config;
        self
    }

    pub fn with_dir_config(mut self, dir_config: Params) -> Self {
        self.dir_config = dir_config;
        self
    }

    pub fn with_path_matches(mut self, path_matches: Vec<String>) -> Self {
        self.path_matches = path_matches;
        self
    }

    /// Path relative to the input root.
    pub fn relative_path(&self) -> PathBuf {
        self.path.strip_prefix(&self.base_path).unwrap_or(&self.path).to_path_buf()
    }

    /// Look up a parameter, preferring the file config over directory defaults.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.config.get(key).or_else(|| self.dir_config.get(key))
    }

    /// String parameter, if set to a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    /// Directory defaults with the file config merged on top.
    pub fn params(&self) -> Params {
        let mut merged = self.dir_config.clone();
        deep_merge(&mut merged, &self.config);
        merged
    }

    /// Resolve a path given relative to the input root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            paths::normalize(path)
        } else {
            paths::normalize(&self.base_path.join(path))
        }
    }

    /// The same importer configuration applied to a dependency of this input.
    pub fn for_dependency(&self, path: &Path) -> Self {
        Self {
            path: self.resolve(path),
            base_path: self.base_path.clone(),
            config: self.config.clone(),
            dir_config: self.dir_config.clone(),
            path_matches: Vec::new(),
        }
    }
}
