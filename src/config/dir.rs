//! Per-directory import configuration (`import.json`).
//!
//! ```json
//! {
//!   "headerVarPrefix": "g_",
//!   "headerIncludeDir": "generated",
//!   "outputPath": "shaders/",
//!   "includes": { "opt": { "optimize": 3 } },
//!   "files": {
//!     "sky.glsl": "include",
//!     "*.vert": { "include": "${opt}" }
//!   },
//!   "importers": { "include": { "includeDirs": ["common"] } }
//! }
//! ```
//!
//! `files` entries configure specific files (literal names or globs relative
//! to this directory). `importers` holds defaults applied to every file in this
//! directory and below that is handled by the named importer.

use super::header::HeaderSettings;
use super::tree::SourceFile;
use super::value::{substitute_includes, ImporterConfigs, Params};
use super::ConfigFileError;
use crate::glob::{self, GlobPattern};
use crate::paths;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the directory config file.
pub const DIR_CONFIG_FILENAME: &str = "import.json";

/// A loaded directory config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirConfig {
    /// Directory this config belongs to
    pub dir: PathBuf,
    /// Per-file importer configs, keyed by absolute file path
    pub files: BTreeMap<PathBuf, ImporterConfigs>,
    /// Glob captures for files matched by a glob key
    pub file_matches: BTreeMap<PathBuf, Vec<String>>,
    /// Directory-wide importer defaults
    pub importers: ImporterConfigs,
    /// Header settings set at this level
    pub header: Option<HeaderSettings>,
    /// Output path override for files below this directory
    pub output_path: Option<String>,
}

impl DirConfig {
    /// Path of the config file for a directory.
    pub fn path_for(dir: &Path) -> PathBuf {
        dir.join(DIR_CONFIG_FILENAME)
    }

    /// Load the config for `dir`, if it has one.
    ///
    /// `files` is every known input file; glob keys are expanded against them
    /// here, once.
    pub fn load(dir: &Path, files: &[SourceFile]) -> Result<Option<Self>, ConfigFileError> {
        let path = Self::path_for(dir);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigFileError::Io { path: path.clone(), source })?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|source| ConfigFileError::Json { path: path.clone(), source })?;
        Self::from_value(dir, &value, files).map(Some)
    }

    /// Build a config from parsed JSON.
    pub fn from_value(
        dir: &Path,
        value: &Value,
        files: &[SourceFile],
    ) -> Result<Self, ConfigFileError> {
        let obj = value.as_object().ok_or_else(|| ConfigFileError::InvalidKey {
            key: DIR_CONFIG_FILENAME.to_string(),
            expected: "a JSON object",
        })?;

        let mut config = Self { dir: dir.to_path_buf(), ..Default::default() };
        config.header = HeaderSettings::from_json(obj)?;

        let includes = match obj.get("includes") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ConfigFileError::InvalidKey {
                    key: "includes".to_string(),
                    expected: "an object",
                })
            }
        };

        config.output_path = match obj.get("outputPath") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let mut value = value.clone();
                substitute_includes(&mut value, &includes)?;
                match value {
                    Value::String(s) => Some(s),
                    _ => {
                        return Err(ConfigFileError::InvalidKey {
                            key: "outputPath".to_string(),
                            expected: "a string",
                        })
                    }
                }
            }
        };

        match obj.get("files") {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => {
                for (key, entry) in entries {
                    let mut entry = entry.clone();
                    substitute_includes(&mut entry, &includes)?;
                    let importers = ImporterConfigs::from_value(&entry)?;
                    config.add_file_entry(key, importers, files)?;
                }
            }
            Some(_) => {
                return Err(ConfigFileError::InvalidKey {
                    key: "files".to_string(),
                    expected: "an object",
                })
            }
        }

        if let Some(importers) = obj.get("importers") {
            let mut importers = importers.clone();
            substitute_includes(&mut importers, &includes)?;
            config.importers = ImporterConfigs::from_value(&importers)?;
        }

        Ok(config)
    }

    fn add_file_entry(
        &mut self,
        key: &str,
        importers: ImporterConfigs,
        files: &[SourceFile],
    ) -> Result<(), ConfigFileError> {
        if !glob::is_glob(key) {
            let path = paths::normalize(&self.dir.join(key));
            self.files.entry(path).or_default().merge(&importers);
            return Ok(());
        }

        // Keys are relative to this directory, so match on the part of each
        // file's path below it. Files outside the directory never match.
        let pattern = GlobPattern::new(key)?;
        for file in files {
            let Some(relative) = paths::relative_slash(&file.path, &self.dir) else {
                continue;
            };
            if let Some(captures) = pattern.captures(&relative) {
                self.files.entry(file.path.clone()).or_default().merge(&importers);
                self.file_matches.insert(file.path.clone(), captures);
            }
        }
        Ok(())
    }

    /// Importer config this directory gives a specific file, if any.
    pub fn file_entry(&self, path: &Path) -> Option<&ImporterConfigs> {
        self.files.get(path)
    }
}
