//! Configuration for the import pipeline.
//!
//! Two layers live here:
//! - the project file `assetpipe.toml` read by the CLI ([`schema`], [`loader`]);
//! - the JSON import configs spread through the input tree: one optional
//!   `import.json` per directory ([`dir`]) and one optional
//!   `<file>.import.json` per input file ([`file`]), assembled by [`tree`].

pub mod dir;
pub mod file;
pub mod header;
pub mod loader;
pub mod schema;
pub mod tree;
pub mod value;

pub use dir::{DirConfig, DIR_CONFIG_FILENAME};
pub use file::{is_side_config, side_config_path, FileConfig, FILE_CONFIG_SUFFIX};
pub use header::{HeaderConfig, HeaderSettings};
pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, CliOverrides,
    ConfigError, PROJECT_CONFIG_FILENAME,
};
pub use schema::*;
pub use tree::{ConfigTree, ScanError, SourceFile};
pub use value::{deep_merge, substitute_includes, ImporterConfigs, Params};

use std::path::PathBuf;
use thiserror::Error;

/// Error reading one import config file.
///
/// These are never fatal: the offending config is skipped with a warning and
/// the files it would have configured fall back to their inherited settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigFileError {
    /// File I/O error
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Invalid JSON
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A key held the wrong kind of value
    #[error("key '{key}' must be {expected}")]
    InvalidKey { key: String, expected: &'static str },
    /// Importer list in an unsupported shape
    #[error(transparent)]
    Shape(#[from] value::ShapeError),
    /// Include substitution failed
    #[error(transparent)]
    Include(#[from] value::IncludeError),
    /// A `files` key was an invalid glob
    #[error(transparent)]
    Glob(#[from] crate::glob::GlobError),
}
