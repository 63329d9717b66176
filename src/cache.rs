//! Timestamp cache deciding which inputs are up to date.
//!
//! Every path the pipeline cares about (inputs, their side configs, directory
//! configs, discovered dependencies) gets a [`CacheEntry`] holding two times:
//! the last observed modification time and the time of the last successful
//! build that covered it. A path is cached when `update_time <= cache_time`.
//!
//! On disk the store is a flat JSON object mapping input-root-relative paths
//! to the modification time recorded by the last successful build:
//!
//! ```json
//! { "shaders/basic.vert": 1718000000.25, "shaders/import.json": 1717000000.0 }
//! ```

use crate::config::{side_config_path, DIR_CONFIG_FILENAME};
use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default cache file name, placed in the output root.
pub const CACHE_FILENAME: &str = ".import-cache.json";

/// Error loading or saving the cache file
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("failed to access cache file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Timestamps tracked for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Resolved filesystem path
    pub path: PathBuf,
    /// Latest modification time seen
    pub update_time: f64,
    /// Time of the last successful build covering this path
    pub cache_time: f64,
    /// Registered during this run
    pub touched: bool,
}

impl CacheEntry {
    pub fn is_fresh(&self) -> bool {
        self.update_time <= self.cache_time
    }
}

/// In-memory cache store, passed explicitly to the scanner, the dependency
/// resolver and the build pipeline.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    root: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    dependencies: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl CacheStore {
    /// Create an empty store for paths under `root`.
    pub fn new(root: &Path) -> Self {
        Self { root: paths::resolve(root), ..Default::default() }
    }

    /// Load a store from `file`, or start empty if it does not exist.
    ///
    /// A file that is not valid JSON is ignored with a warning, which forces
    /// a full rebuild.
    pub fn load(root: &Path, file: &Path) -> Result<Self, CacheError> {
        let mut store = Self::new(root);
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(source) => return Err(CacheError::Io { path: file.to_path_buf(), source }),
        };

        let times: BTreeMap<String, f64> = match serde_json::from_str(&text) {
            Ok(times) => times,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "ignoring corrupt cache file");
                return Ok(store);
            }
        };

        for (key, cache_time) in times {
            let stored = Path::new(&key);
            let path = if stored.is_absolute() { stored.to_path_buf() } else { store.root.join(stored) };
            let (real, key) = store.normalize(&path);
            // Missing paths always read as changed.
            let update_time = paths::modified_secs(&real).unwrap_or_else(paths::now_secs);
            store.entries.insert(
                key,
                CacheEntry { path: real, update_time, cache_time, touched: false },
            );
        }
        tracing::debug!(path = %file.display(), entries = store.entries.len(), "loaded cache");
        Ok(store)
    }

    /// Root that persisted keys are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` and compute its lookup key.
    ///
    /// Glob metacharacters in the key are replaced with `_` so a glob-derived
    /// input and the concrete file share one entry.
    pub fn normalize(&self, path: &Path) -> (PathBuf, String) {
        let absolute = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
        let real = paths::resolve(&absolute);
        let key = real
            .to_string_lossy()
            .chars()
            .map(|c| if matches!(c, '*' | '?' | '[' | ']') { '_' } else { c })
            .collect();
        (real, key)
    }

    /// Register `path`, raising its times to at least the observed
    /// modification time and `cache_time`.
    ///
    /// A missing path is stamped with the current time, so anything that
    /// depends on it stays out of date until it appears.
    pub fn add_file_cache_path(&mut self, path: &Path, cache_time: f64) {
        let (real, key) = self.normalize(path);
        let modified = paths::modified_secs(&real).unwrap_or_else(paths::now_secs);
        let entry = self.entries.entry(key).or_insert_with(|| CacheEntry {
            path: real,
            update_time: modified,
            cache_time,
            touched: true,
        });
        entry.update_time = entry.update_time.max(modified);
        entry.cache_time = entry.cache_time.max(cache_time);
        entry.touched = true;
    }

    /// Entry for `path`, if registered.
    pub fn entry(&self, path: &Path) -> Option<&CacheEntry> {
        let (_, key) = self.normalize(path);
        self.entries.get(&key)
    }

    /// Whether `path` alone is up to date.
    ///
    /// An unregistered path is cached only when it no longer exists.
    pub fn is_path_cached(&self, path: &Path) -> bool {
        let (real, key) = self.normalize(path);
        match self.entries.get(&key) {
            Some(entry) => entry.is_fresh(),
            None => !real.exists(),
        }
    }

    /// Whether `path` and everything its build depends on is up to date:
    /// directory configs from its parent up to the root, each dependency and
    /// the dependency's side config, its own side config and the path itself.
    pub fn is_cached(&self, path: &Path) -> bool {
        let (real, key) = self.normalize(path);

        for dir in real.ancestors().skip(1) {
            if !dir.starts_with(&self.root) {
                break;
            }
            if !self.is_path_cached(&dir.join(DIR_CONFIG_FILENAME)) {
                return false;
            }
        }

        if let Some(deps) = self.dependencies.get(&key) {
            for dep in deps {
                if !self.is_path_cached(dep) || !self.is_path_cached(&side_config_path(dep)) {
                    return false;
                }
            }
        }

        self.is_path_cached(&side_config_path(&real)) && self.is_path_cached(&real)
    }

    /// Record the transitive dependency set of `path`.
    pub fn set_dependencies(&mut self, path: &Path, deps: BTreeSet<PathBuf>) {
        let (_, key) = self.normalize(path);
        self.dependencies.insert(key, deps);
    }

    /// Transitive dependencies recorded for `path`.
    pub fn dependencies(&self, path: &Path) -> Option<&BTreeSet<PathBuf>> {
        let (_, key) = self.normalize(path);
        self.dependencies.get(&key)
    }

    /// Whether any entry changed since the last build.
    pub fn is_dirty(&self) -> bool {
        self.entries.values().any(|e| !e.is_fresh())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the store after a successful build.
    ///
    /// Entries loaded from disk that were not registered this run and no
    /// longer exist are dropped. The file is rewritten only when something
    /// changed. Afterwards every entry counts as cached. Returns whether the
    /// file was written.
    pub fn save(&mut self, file: &Path) -> Result<bool, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.touched || e.path.exists());
        let pruned = self.entries.len() != before;

        let dirty = pruned || self.is_dirty() || !file.exists();
        if dirty {
            let times: BTreeMap<String, f64> = self
                .entries
                .values()
                .map(|e| (self.persisted_key(&e.path), e.update_time))
                .collect();
            let json = serde_json::to_string_pretty(&times)
                .map_err(|source| CacheError::Json { path: file.to_path_buf(), source })?;
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source| CacheError::Io { path: parent.to_path_buf(), source })?;
            }
            fs::write(file, json)
                .map_err(|source| CacheError::Io { path: file.to_path_buf(), source })?;
            tracing::debug!(path = %file.display(), entries = times.len(), "saved cache");
        }

        for entry in self.entries.values_mut() {
            entry.cache_time = entry.cache_time.max(entry.update_time);
        }
        Ok(dirty)
    }

    fn persisted_key(&self, path: &Path) -> String {
        match paths::relative_slash(path, &self.root) {
            Some(rel) => rel,
            None => path.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Create a file whose modification time is 100 seconds in the past.
    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        set_modified_ago(&path, 100);
        path
    }

    fn set_modified_ago(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs)).unwrap();
    }

    /// A later modification time that is still in the past.
    fn touch(path: &Path) {
        set_modified_ago(path, 50);
    }

    #[test]
    fn test_new_path_is_stale() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.txt", "a");
        let mut cache = CacheStore::new(temp.path());
        assert!(!cache.is_path_cached(&file));
        cache.add_file_cache_path(&file, 0.0);
        assert!(!cache.is_path_cached(&file));
        assert!(!cache.is_cached(&file));
    }

    #[test]
    fn test_missing_unregistered_path_is_cached() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path());
        assert!(cache.is_path_cached(&temp.path().join("gone.txt")));
    }

    #[test]
    fn test_missing_registered_path_is_stale() {
        let temp = TempDir::new().unwrap();
        let mut cache = CacheStore::new(temp.path());
        let gone = temp.path().join("gone.txt");
        cache.add_file_cache_path(&gone, 0.0);
        assert!(!cache.is_path_cached(&gone));
    }

    #[test]
    fn test_missing_dependency_stays_stale_across_builds() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.glsl", "#include \"gone.glsl\"");
        let gone = temp.path().join("gone.glsl");
        let cache_file = temp.path().join(CACHE_FILENAME);

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, 0.0);
        cache.add_file_cache_path(&gone, 0.0);
        cache.set_dependencies(&file, BTreeSet::from([gone.clone()]));
        assert!(cache.save(&cache_file).unwrap());

        for _ in 0..2 {
            let mut reloaded = CacheStore::load(temp.path(), &cache_file).unwrap();
            reloaded.add_file_cache_path(&file, 0.0);
            reloaded.add_file_cache_path(&gone, 0.0);
            reloaded.set_dependencies(&file, BTreeSet::from([gone.clone()]));
            assert!(reloaded.is_path_cached(&file));
            assert!(!reloaded.is_path_cached(&gone));
            assert!(!reloaded.is_cached(&file));
            reloaded.save(&cache_file).unwrap();
        }
    }

    #[test]
    fn test_times_are_monotonic() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.txt", "a");
        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, f64::MAX);
        cache.add_file_cache_path(&file, 0.0);
        let entry = cache.entry(&file).unwrap();
        assert_eq!(entry.cache_time, f64::MAX);
        assert!(cache.is_path_cached(&file));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "sub/a.txt", "a");
        let cache_file = temp.path().join("out").join(CACHE_FILENAME);

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, 0.0);
        assert!(cache.is_dirty());
        assert!(cache.save(&cache_file).unwrap());
        assert!(cache.is_cached(&file));

        let text = fs::read_to_string(&cache_file).unwrap();
        assert!(text.contains("\"sub/a.txt\""));

        let mut reloaded = CacheStore::load(temp.path(), &cache_file).unwrap();
        reloaded.add_file_cache_path(&file, 0.0);
        assert!(reloaded.is_cached(&file));
        assert!(!reloaded.is_dirty());
        assert!(!reloaded.save(&cache_file).unwrap());
    }

    #[test]
    fn test_modified_after_save_is_stale() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.txt", "a");
        let cache_file = temp.path().join(CACHE_FILENAME);

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, 0.0);
        cache.save(&cache_file).unwrap();

        touch(&file);
        let mut reloaded = CacheStore::load(temp.path(), &cache_file).unwrap();
        reloaded.add_file_cache_path(&file, 0.0);
        assert!(!reloaded.is_cached(&file));
    }

    #[test]
    fn test_dir_config_invalidates_children() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "sub/a.txt", "a");
        let marker = create_test_file(temp.path(), "import.json", "{}");

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, 0.0);
        cache.add_file_cache_path(&marker, 0.0);
        cache.save(&temp.path().join(CACHE_FILENAME)).unwrap();
        assert!(cache.is_cached(&file));

        touch(&marker);
        cache.add_file_cache_path(&marker, 0.0);
        assert!(!cache.is_cached(&file));
    }

    #[test]
    fn test_dependency_invalidates_dependent() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.glsl", "#include \"b.glsl\"");
        let dep = create_test_file(temp.path(), "b.glsl", "");

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, 0.0);
        cache.add_file_cache_path(&dep, 0.0);
        cache.set_dependencies(&file, BTreeSet::from([dep.clone()]));
        cache.save(&temp.path().join(CACHE_FILENAME)).unwrap();
        assert!(cache.is_cached(&file));

        touch(&dep);
        cache.add_file_cache_path(&dep, 0.0);
        assert!(!cache.is_cached(&file));
        assert!(cache.is_path_cached(&file));
    }

    #[test]
    fn test_unregistered_side_config_is_stale() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "a.txt", "a");
        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&file, f64::MAX);
        assert!(cache.is_cached(&file));

        create_test_file(temp.path(), "a.txt.import.json", "\"copy\"");
        assert!(!cache.is_cached(&file));
    }

    #[test]
    fn test_glob_characters_share_key() {
        let temp = TempDir::new().unwrap();
        let cache = CacheStore::new(temp.path());
        let (_, a) = cache.normalize(&temp.path().join("tex*.png"));
        let (_, b) = cache.normalize(&temp.path().join("tex_.png"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let temp = TempDir::new().unwrap();
        let cache_file = create_test_file(temp.path(), CACHE_FILENAME, "{ nope");
        let cache = CacheStore::load(temp.path(), &cache_file).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_prunes_deleted_untouched_entries() {
        let temp = TempDir::new().unwrap();
        let keep = create_test_file(temp.path(), "keep.txt", "k");
        let gone = create_test_file(temp.path(), "gone.txt", "g");
        let cache_file = temp.path().join(CACHE_FILENAME);

        let mut cache = CacheStore::new(temp.path());
        cache.add_file_cache_path(&keep, 0.0);
        cache.add_file_cache_path(&gone, 0.0);
        cache.save(&cache_file).unwrap();

        fs::remove_file(&gone).unwrap();
        let mut reloaded = CacheStore::load(temp.path(), &cache_file).unwrap();
        assert_eq!(reloaded.len(), 2);
        reloaded.add_file_cache_path(&keep, 0.0);
        assert!(reloaded.save(&cache_file).unwrap());
        assert_eq!(reloaded.len(), 1);
        assert!(!fs::read_to_string(&cache_file).unwrap().contains("gone.txt"));
    }
}
