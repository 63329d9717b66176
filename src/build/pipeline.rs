//! Build pipeline orchestration.
//!
//! [`ImportPipeline`] ties the stages together: the input tree is scanned
//! and the cache loaded on construction, then every run plans operations,
//! resolves dependencies, checks staleness, writes stale outputs, aggregates
//! headers and persists the cache.

use crate::build::execute::PlannedOperation;
use crate::build::header::write_combined_headers;
use crate::build::outputs::resolve_outputs;
use crate::build::parallel::{execute_parallel, execute_sequential};
use crate::build::{
    load_dependencies, plan_operations, BuildContext, BuildResult, Operation, ProgressEvent,
    ProgressReporter,
};
use crate::cache::{CacheError, CacheStore};
use crate::config::{ConfigTree, ScanError};
use crate::importer::{ImportError, Importer, ImporterRegistry};
use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Error during a pipeline run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("{} uses unknown importer '{importer}'", file.display())]
    UnknownImporter { file: PathBuf, importer: String },
    #[error("{first} and {second} both write {}", path.display())]
    DuplicateOutput { path: PathBuf, first: String, second: String },
    #[error("importer '{importer}' failed on {}: {source}", input.display())]
    Import {
        importer: String,
        input: PathBuf,
        #[source]
        source: ImportError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl BuildError {
    /// Whether the error comes from the project setup rather than from
    /// running an importer. These abort before any output is written.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BuildError::Scan(_)
                | BuildError::UnknownImporter { .. }
                | BuildError::DuplicateOutput { .. }
        )
    }
}

/// Incremental import pipeline over one input tree.
pub struct ImportPipeline {
    context: BuildContext,
    output_root: PathBuf,
    cache_path: PathBuf,
    tree: ConfigTree,
    cache: CacheStore,
    registry: ImporterRegistry,
}

impl ImportPipeline {
    /// Scan the input and load the cache, with the built-in importers registered.
    pub fn new(context: BuildContext) -> Result<Self, BuildError> {
        Self::with_registry(context, ImporterRegistry::with_builtins())
    }

    /// Scan the input and load the cache, using `registry` for importers.
    pub fn with_registry(
        context: BuildContext,
        registry: ImporterRegistry,
    ) -> Result<Self, BuildError> {
        let input = paths::resolve(context.input());
        let output_root = paths::resolve(context.output_root());
        let cache_path = paths::resolve(&context.cache_path());
        let root = if input.is_file() {
            input.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            input.clone()
        };

        let mut cache = CacheStore::load(&root, &cache_path)?;
        let exclude = [output_root.clone(), cache_path.clone()];
        let tree = ConfigTree::scan(&input, &exclude, &mut cache)?;

        Ok(Self { context, output_root, cache_path, tree, cache, registry })
    }

    /// Register an importer, replacing one with the same name.
    pub fn register(&mut self, importer: Box<dyn Importer>) -> bool {
        self.registry.register(importer)
    }

    /// Builder form of [`ImportPipeline::register`].
    pub fn with_importer(mut self, importer: Box<dyn Importer>) -> Self {
        self.register(importer);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn registry(&self) -> &ImporterRegistry {
        &self.registry
    }

    /// Resolved output root.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Plan every operation and fold their dependencies into the cache.
    pub fn get_operations(&mut self) -> Result<Vec<Operation>, BuildError> {
        let operations = plan_operations(&self.tree, &self.registry)?;
        load_dependencies(&operations, &mut self.registry, &mut self.cache)?;
        Ok(operations)
    }

    /// Operations with their final output paths and staleness.
    ///
    /// Fails if two operations resolve to the same output.
    pub fn plan(&mut self) -> Result<Vec<PlannedOperation>, BuildError> {
        let operations = self.get_operations()?;
        let forced = self.context.is_forced();

        // Resolved per importer; every operation names a registered one.
        let mut resolved = vec![Vec::new(); operations.len()];
        for importer in self.registry.iter() {
            for (idx, operation) in operations.iter().enumerate() {
                if operation.importer != importer.name() {
                    continue;
                }
                resolved[idx] = resolve_outputs(operation, importer, &self.output_root).map_err(
                    |source| BuildError::Import {
                        importer: operation.importer.clone(),
                        input: operation.input.path.clone(),
                        source,
                    },
                )?;
            }
        }

        let mut owners: BTreeMap<PathBuf, String> = BTreeMap::new();
        let mut planned = Vec::with_capacity(operations.len());
        for (operation, outputs) in operations.into_iter().zip(resolved) {
            let id = operation.id();
            for output in &outputs {
                if let Some(first) = owners.insert(output.clone(), id.clone()) {
                    return Err(BuildError::DuplicateOutput {
                        path: output.clone(),
                        first,
                        second: id,
                    });
                }
            }

            let input_cached = !forced && self.cache.is_cached(&operation.input.path);
            planned.push(PlannedOperation { operation, outputs, input_cached });
        }
        Ok(planned)
    }

    /// Preview of what [`ImportPipeline::run`] would do. Writes nothing.
    pub fn get_outputs(&mut self) -> Result<Vec<PlannedOperation>, BuildError> {
        self.plan()
    }

    /// Run the pipeline, writing stale outputs and persisting the cache.
    pub fn run(&mut self, progress: &dyn ProgressReporter) -> Result<BuildResult, BuildError> {
        let outcome = self.run_inner(progress);
        if let Err(e) = &outcome {
            progress.report(ProgressEvent::Error { message: e.to_string() });
        }
        outcome
    }

    fn run_inner(&mut self, progress: &dyn ProgressReporter) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let planned = self.plan()?;
        progress.report(ProgressEvent::BuildStarted { total_operations: planned.len() });

        let jobs = self.context.jobs();
        let executed = if jobs > 1 {
            execute_parallel(&planned, &mut self.registry, jobs, progress)?
        } else {
            execute_sequential(&planned, &mut self.registry, progress)?
        };

        let mut result = BuildResult::new();
        let mut headers = Vec::new();
        for (op_result, op_headers) in executed {
            result.add_result(op_result);
            headers.extend(op_headers);
        }

        let planned_outputs: BTreeSet<PathBuf> =
            planned.iter().flat_map(|p| p.outputs.iter().cloned()).collect();
        let combined = write_combined_headers(&headers, &self.output_root, &planned_outputs)
            .map_err(|source| BuildError::Io { path: self.output_root.clone(), source })?;
        for path in &combined.collisions {
            progress.report(ProgressEvent::Warning {
                operation_id: None,
                message: format!(
                    "combined header {} collides with a planned output",
                    path.display()
                ),
            });
        }
        for path in &combined.written {
            progress.report(ProgressEvent::CombinedHeaderWritten { path: path.clone() });
        }
        result.combined_headers = combined.written;

        result.cache_saved = self.cache.save(&self.cache_path)?;
        if result.cache_saved {
            progress.report(ProgressEvent::CacheSaved { path: self.cache_path.clone() });
        }

        let result = result.with_duration(start.elapsed());
        progress.report(ProgressEvent::BuildCompleted {
            duration_ms: result.total_duration.as_millis() as u64,
            built: result.built_count(),
            cached: result.cached_count(),
            declined: result.declined_count(),
        });
        tracing::info!(
            built = result.built_count(),
            cached = result.cached_count(),
            "build finished"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for ImportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportPipeline")
            .field("context", &self.context)
            .field("files", &self.tree.files.len())
            .field("importers", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{NullProgress, OperationStatus};
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

    fn create_test_context() -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let context = BuildContext::new(temp.path().join("assets"), temp.path().join("build"));
        fs::create_dir_all(temp.path().join("assets")).unwrap();
        (temp, context)
    }

    #[test]
    fn test_missing_input_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let context = BuildContext::new(temp.path().join("nope"), temp.path().join("build"));
        let err = ImportPipeline::new(context).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_empty_build() {
        let (_temp, context) = create_test_context();
        let mut pipeline = ImportPipeline::new(context).unwrap();
        let result = pipeline.run(&NullProgress).unwrap();
        assert!(result.operations.is_empty());
        assert!(result.cache_saved);
    }

    #[test]
    fn test_copy_then_cached() {
        let (temp, context) = create_test_context();
        let assets = temp.path().join("assets");
        create_test_file(&assets, "tex/a.png", "png");
        create_test_file(&assets, "import.json", r#"{"files": {"**/*.png": "copy"}}"#);

        let result = ImportPipeline::new(context.clone()).unwrap().run(&NullProgress).unwrap();
        assert_eq!(result.built_count(), 1);
        assert_eq!(fs::read_to_string(temp.path().join("build/tex/a.png")).unwrap(), "png");

        let result = ImportPipeline::new(context).unwrap().run(&NullProgress).unwrap();
        assert_eq!(result.cached_count(), 1);
        assert!(result.written_outputs().is_empty());
        assert!(!result.cache_saved);
    }

    #[test]
    fn test_duplicate_output() {
        let (temp, context) = create_test_context();
        let assets = temp.path().join("assets");
        create_test_file(&assets, "a.glsl", "");
        create_test_file(&assets, "a.glsl.import.json", r#"["copy", "include"]"#);

        let mut pipeline = ImportPipeline::new(context).unwrap();
        let err = pipeline.run(&NullProgress).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateOutput { .. }));
        assert!(err.is_configuration_error());
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_plan_keeps_outputs_with_their_operation() {
        let (temp, context) = create_test_context();
        let assets = temp.path().join("assets");
        create_test_file(&assets, "a.glsl", "");
        create_test_file(&assets, "b.txt", "");
        create_test_file(&assets, "a.glsl.import.json", r#"{"copy": {}, "include": {"extension": "out"}}"#);
        create_test_file(&assets, "b.txt.import.json", r#""copy""#);

        let mut pipeline = ImportPipeline::new(context).unwrap();
        let planned = pipeline.plan().unwrap();
        let ids: Vec<String> = planned.iter().map(|p| p.operation.id()).collect();
        assert_eq!(ids, vec!["copy:a.glsl", "include:a.glsl", "copy:b.txt"]);
        assert!(planned[0].outputs[0].ends_with("a.glsl"));
        assert!(planned[1].outputs[0].ends_with("a.out"));
        assert!(planned[2].outputs[0].ends_with("b.txt"));
    }

    #[test]
    fn test_get_outputs_writes_nothing() {
        let (temp, context) = create_test_context();
        let assets = temp.path().join("assets");
        create_test_file(&assets, "a.txt", "a");
        create_test_file(&assets, "a.txt.import.json", r#"{"copy": {"outputPath": "txt/"}}"#);

        let mut pipeline = ImportPipeline::new(context).unwrap();
        let planned = pipeline.get_outputs().unwrap();
        assert_eq!(planned.len(), 1);
        assert!(planned[0].outputs[0].ends_with("build/txt/a.txt"));
        assert!(!planned[0].is_up_to_date());
        assert!(!temp.path().join("build").exists());
    }

    #[test]
    fn test_force_rebuilds() {
        let (temp, context) = create_test_context();
        create_test_file(&temp.path().join("assets"), "a.txt", "a");
        create_test_file(&temp.path().join("assets"), "a.txt.import.json", "\"copy\"");

        ImportPipeline::new(context.clone()).unwrap().run(&NullProgress).unwrap();
        let result = ImportPipeline::new(context.with_force(true))
            .unwrap()
            .run(&NullProgress)
            .unwrap();
        assert_eq!(result.operations[0].status, OperationStatus::Built);
    }

    #[test]
    fn test_single_file_input() {
        let (temp, _) = create_test_context();
        let file = create_test_file(&temp.path().join("assets"), "one.txt", "1");
        create_test_file(&temp.path().join("assets"), "one.txt.import.json", "\"copy\"");
        create_test_file(&temp.path().join("assets"), "two.txt", "2");

        let context = BuildContext::new(&file, temp.path().join("build"));
        let result = ImportPipeline::new(context).unwrap().run(&NullProgress).unwrap();
        assert_eq!(result.operations.len(), 1);
        assert!(temp.path().join("build/one.txt").exists());
        assert!(!temp.path().join("build/two.txt").exists());
    }
}
