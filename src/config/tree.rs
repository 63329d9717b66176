//! Input discovery and the assembled configuration tree.
//!
//! Scanning visits every file under the input root (or the single input file
//! and its parent directory), loads each directory's `import.json` and each
//! file's side config, registers every config it reads with the cache, and
//! then folds directory `files` entries and side configs into one
//! [`FileConfig`] per input.

use super::dir::{DirConfig, DIR_CONFIG_FILENAME};
use super::file::{is_side_config, side_config_path, FileConfig};
use super::value::ImporterConfigs;
use crate::cache::CacheStore;
use crate::paths;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error that stops a scan. Malformed config files never do.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScanError {
    #[error("input path does not exist: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("invalid scan pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ::glob::PatternError,
    },
}

/// An input file found by the scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Resolved absolute path
    pub path: PathBuf,
    /// Path relative to the input root, `/`-separated
    pub relative: String,
}

/// Every config that applies to the inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    /// Input root all relative paths are based on
    pub base: PathBuf,
    /// Input files, sorted by path
    pub files: Vec<SourceFile>,
    /// Loaded directory configs, keyed by directory
    pub dirs: BTreeMap<PathBuf, DirConfig>,
    /// Effective per-file importer config for every input
    pub file_configs: BTreeMap<PathBuf, FileConfig>,
}

impl ConfigTree {
    /// Scan `input` and load every config that applies to it.
    ///
    /// Paths under any of `exclude` (the output root, the cache file) are
    /// ignored. Every config file read is registered in `cache`, as is every
    /// input file.
    pub fn scan(
        input: &Path,
        exclude: &[PathBuf],
        cache: &mut CacheStore,
    ) -> Result<Self, ScanError> {
        if !input.exists() {
            return Err(ScanError::MissingInput(input.to_path_buf()));
        }
        let input = paths::resolve(input);
        let exclude: Vec<PathBuf> = exclude.iter().map(|p| paths::resolve(p)).collect();
        let is_excluded = |path: &Path| exclude.iter().any(|ex| path.starts_with(ex));

        let (base, found) = if input.is_dir() {
            (input.clone(), walk(&input)?)
        } else {
            let parent = input.parent().map(Path::to_path_buf).unwrap_or_default();
            (parent, vec![input.clone()])
        };

        let mut dirs = vec![base.clone()];
        let mut files = Vec::new();
        for path in found {
            if is_excluded(&path) {
                continue;
            }
            if path.is_dir() {
                dirs.push(path);
            } else if !is_side_config(&path) {
                if let Some(relative) = paths::relative_slash(&path, &base) {
                    files.push(SourceFile { path, relative });
                }
            }
        }
        files.sort();
        dirs.sort();
        dirs.dedup();

        let mut tree = Self { base, files, ..Default::default() };

        for dir in &dirs {
            let marker = dir.join(DIR_CONFIG_FILENAME);
            if !marker.is_file() {
                continue;
            }
            cache.add_file_cache_path(&marker, 0.0);
            match DirConfig::load(dir, &tree.files) {
                Ok(Some(config)) => {
                    tracing::debug!(path = %marker.display(), "loaded directory config");
                    tree.dirs.insert(dir.clone(), config);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %marker.display(), error = %e, "skipping malformed config")
                }
            }
        }

        let mut side_configs = BTreeMap::new();
        for file in &tree.files {
            cache.add_file_cache_path(&file.path, 0.0);
            let side = side_config_path(&file.path);
            if !side.is_file() {
                continue;
            }
            cache.add_file_cache_path(&side, 0.0);
            match FileConfig::load(&file.path) {
                Ok(Some(config)) => {
                    side_configs.insert(file.path.clone(), config);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %side.display(), error = %e, "skipping malformed config")
                }
            }
        }

        for file in &tree.files {
            let mut importers = ImporterConfigs::new();
            for dir in tree.dir_chain(&file.path) {
                if let Some(entry) = dir.file_entry(&file.path) {
                    importers.merge(entry);
                }
            }
            if let Some(side) = side_configs.get(&file.path) {
                importers.merge(&side.importers);
            }
            tree.file_configs.insert(file.path.clone(), FileConfig { importers });
        }

        tracing::debug!(
            base = %tree.base.display(),
            files = tree.files.len(),
            dir_configs = tree.dirs.len(),
            "scanned input tree"
        );
        Ok(tree)
    }

    /// Loaded directory configs that apply to `path`, outermost first.
    pub fn dir_chain(&self, path: &Path) -> Vec<&DirConfig> {
        let mut chain: Vec<&DirConfig> = path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.base))
            .filter_map(|dir| self.dirs.get(dir))
            .collect();
        chain.reverse();
        chain
    }

    /// Effective importer config for an input file.
    pub fn file_config(&self, path: &Path) -> Option<&FileConfig> {
        self.file_configs.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn walk(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let pattern = format!("{}/**/*", ::glob::Pattern::escape(&root.to_string_lossy()));
    let entries = ::glob::glob(&pattern)
        .map_err(|source| ScanError::Pattern { pattern: pattern.clone(), source })?;

    let mut found = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => found.push(path),
            Err(e) => tracing::warn!(error = %e, "error reading path during scan"),
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn scan(root: &Path) -> (ConfigTree, CacheStore) {
        let mut cache = CacheStore::new(root);
        let tree = ConfigTree::scan(root, &[], &mut cache).unwrap();
        (tree, cache)
    }

    #[test]
    fn test_missing_input() {
        let temp = TempDir::new().unwrap();
        let mut cache = CacheStore::new(temp.path());
        let result = ConfigTree::scan(&temp.path().join("nope"), &[], &mut cache);
        assert!(matches!(result, Err(ScanError::MissingInput(_))));
    }

    #[test]
    fn test_configs_are_not_inputs() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.txt", "a");
        create_test_file(temp.path(), "a.txt.import.json", "\"copy\"");
        create_test_file(temp.path(), "import.json", "{}");
        create_test_file(temp.path(), "sub/b.txt", "b");

        let (tree, cache) = scan(temp.path());
        let names: Vec<_> = tree.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);
        assert!(cache.entry(&temp.path().join("import.json")).is_some());
        assert!(cache.entry(&temp.path().join("a.txt.import.json")).is_some());
    }

    #[test]
    fn test_excluded_paths_are_skipped() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.txt", "a");
        create_test_file(temp.path(), "build/a.txt", "a");

        let mut cache = CacheStore::new(temp.path());
        let tree =
            ConfigTree::scan(temp.path(), &[temp.path().join("build")], &mut cache).unwrap();
        assert_eq!(tree.files.len(), 1);
    }

    #[test]
    fn test_single_file_input() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.txt", "a");
        create_test_file(temp.path(), "other.txt", "o");
        create_test_file(temp.path(), "import.json", r#"{"files": {"*.txt": "copy"}}"#);

        let mut cache = CacheStore::new(temp.path());
        let tree = ConfigTree::scan(&file, &[], &mut cache).unwrap();
        assert_eq!(tree.files.len(), 1);
        assert_eq!(tree.files[0].relative, "a.txt");
        assert!(tree.file_config(&tree.files[0].path).unwrap().importers.contains("copy"));
    }

    #[test]
    fn test_every_file_gets_a_config() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.txt", "a");
        let (tree, _) = scan(temp.path());
        let config = tree.file_config(&tree.files[0].path).unwrap();
        assert!(config.importers.is_empty());
    }

    #[test]
    fn test_side_config_overrides_dir_entry() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.glsl", "");
        create_test_file(
            temp.path(),
            "import.json",
            r#"{"files": {"*.glsl": {"include": {"extension": "h", "keep": 1}}}}"#,
        );
        create_test_file(temp.path(), "a.glsl.import.json", r#"{"include": {"extension": "txt"}}"#);

        let (tree, _) = scan(temp.path());
        let params = tree.file_configs.values().next().unwrap().importers.get("include").unwrap();
        assert_eq!(params.get("extension"), Some(&json!("txt")));
        assert_eq!(params.get("keep"), Some(&json!(1)));
    }

    #[test]
    fn test_nested_dir_entries_merge() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "sub/a.txt", "a");
        create_test_file(temp.path(), "import.json", r#"{"files": {"sub/a.txt": "copy"}}"#);
        create_test_file(temp.path(), "sub/import.json", r#"{"files": {"a.txt": "include"}}"#);

        let (tree, _) = scan(temp.path());
        let config = tree.file_configs.values().next().unwrap();
        assert!(config.importers.contains("copy"));
        assert!(config.importers.contains("include"));
        assert_eq!(tree.dir_chain(&tree.files[0].path).len(), 2);
    }

    #[test]
    fn test_malformed_configs_are_skipped() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.txt", "a");
        create_test_file(temp.path(), "import.json", "{ broken");
        create_test_file(temp.path(), "a.txt.import.json", "42");

        let (tree, cache) = scan(temp.path());
        assert!(tree.dirs.is_empty());
        assert!(tree.file_configs.values().next().unwrap().importers.is_empty());
        assert!(cache.entry(&temp.path().join("import.json")).is_some());
    }
}
