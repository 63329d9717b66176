//! Per-file side configs (`<file>.import.json`).
//!
//! A side config sits next to the file it configures and takes one of three
//! forms:
//!
//! ```json
//! "copy"
//! ["copy", {"name": "include", "extension": "glsl"}]
//! {"includes": {"dir": "common"}, "importers": {"include": {"includeDirs": ["${dir}"]}}}
//! ```
//!
//! Side configs and directory configs are never inputs themselves.

use super::dir::DIR_CONFIG_FILENAME;
use super::value::{substitute_includes, ImporterConfigs, Params};
use super::ConfigFileError;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to a file's name to find its side config.
pub const FILE_CONFIG_SUFFIX: &str = ".import.json";

/// Path of the side config for `file`.
pub fn side_config_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().map(OsString::from).unwrap_or_default();
    name.push(FILE_CONFIG_SUFFIX);
    file.with_file_name(name)
}

/// Whether `path` is a side config or directory config rather than an input.
pub fn is_side_config(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name == DIR_CONFIG_FILENAME || name.ends_with(FILE_CONFIG_SUFFIX),
        None => false,
    }
}

/// Importer configuration for one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub importers: ImporterConfigs,
}

impl FileConfig {
    /// Load the side config for `file`, if present.
    pub fn load(file: &Path) -> Result<Option<Self>, ConfigFileError> {
        let path = side_config_path(file);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigFileError::Io { path: path.clone(), source })?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|source| ConfigFileError::Json { path: path.clone(), source })?;
        Self::from_value(&value).map(Some)
    }

    /// Build a file config from parsed JSON.
    pub fn from_value(value: &Value) -> Result<Self, ConfigFileError> {
        let importers = match value {
            Value::Object(obj) if obj.contains_key("importers") || obj.contains_key("includes") => {
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
                let mut importers = obj.get("importers").cloned().unwrap_or(Value::Null);
                substitute_includes(&mut importers, &includes)?;
                ImporterConfigs::from_value(&importers)?
            }
            other => ImporterConfigs::from_value(other)?,
        };
        Ok(Self { importers })
    }
}
