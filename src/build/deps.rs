//! Dependency resolution.
//!
//! Each operation's importer reports the files its input reads directly.
//! Those files are resolved with the same importer and configuration, so the
//! cache ends up holding the full transitive set for every input.

use crate::build::{BuildError, Operation};
use crate::cache::CacheStore;
use crate::config::side_config_path;
use crate::importer::{ImportError, ImportScope, Importer, ImporterRegistry, Input};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Direct dependencies reported by `importer` for `input`, as absolute paths.
///
/// Missing inputs and declined inputs have no dependencies.
pub fn direct_dependencies(
    importer: &mut dyn Importer,
    input: &Input,
) -> Result<BTreeSet<PathBuf>, BuildError> {
    if !input.path.is_file() {
        return Ok(BTreeSet::new());
    }
    let name = importer.name().to_string();
    let import_error = |source: ImportError| BuildError::Import {
        importer: name.clone(),
        input: input.path.clone(),
        source,
    };

    let deps = match ImportScope::start(importer, input, true).map_err(import_error)? {
        Some(mut scope) => scope.dependencies().map_err(import_error)?,
        None => BTreeSet::new(),
    };
    Ok(deps.iter().map(|dep| input.resolve(dep)).collect())
}

/// Compute and record the transitive dependencies of every operation input.
///
/// Dependencies and their side configs are registered with the cache. A
/// dependency chain leading back to the input is reported and cut.
pub fn load_dependencies(
    operations: &[Operation],
    registry: &mut ImporterRegistry,
    cache: &mut CacheStore,
) -> Result<(), BuildError> {
    let mut closures: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut direct: BTreeMap<(String, PathBuf), BTreeSet<PathBuf>> = BTreeMap::new();

    for operation in operations {
        let Some(importer) = registry.get_mut(&operation.importer) else {
            return Err(BuildError::UnknownImporter {
                file: operation.input.path.clone(),
                importer: operation.importer.clone(),
            });
        };

        let closure = transitive_dependencies(importer, &operation.input, &mut direct)?;
        closures.entry(operation.input.path.clone()).or_default().extend(closure);
    }

    for (path, deps) in closures {
        for dep in &deps {
            register(cache, dep);
        }
        tracing::debug!(input = %path.display(), count = deps.len(), "resolved dependencies");
        cache.set_dependencies(&path, deps);
    }
    Ok(())
}

fn transitive_dependencies(
    importer: &mut dyn Importer,
    input: &Input,
    memo: &mut BTreeMap<(String, PathBuf), BTreeSet<PathBuf>>,
) -> Result<BTreeSet<PathBuf>, BuildError> {
    let mut visited = BTreeSet::from([input.path.clone()]);
    let mut closure = BTreeSet::new();
    let mut queue = VecDeque::from([input.clone()]);

    while let Some(current) = queue.pop_front() {
        let key = (importer.name().to_string(), current.path.clone());
        let deps = match memo.get(&key) {
            Some(deps) => deps.clone(),
            None => {
                let deps = direct_dependencies(importer, &current)?;
                memo.insert(key, deps.clone());
                deps
            }
        };

        for dep in deps {
            if dep == input.path {
                tracing::warn!(
                    input = %input.path.display(),
                    via = %current.path.display(),
                    "dependency cycle leads back to the input"
                );
                continue;
            }
            if visited.insert(dep.clone()) {
                queue.push_back(current.for_dependency(&dep));
                closure.insert(dep);
            }
        }
    }
    Ok(closure)
}

/// Register a dependency with no build time of its own; only the persisted
/// cache can make it fresh.
fn register(cache: &mut CacheStore, dep: &Path) {
    cache.add_file_cache_path(dep, 0.0);
    let side = side_config_path(dep);
    if side.exists() {
        cache.add_file_cache_path(&side, 0.0);
    }
}
