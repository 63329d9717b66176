//! Parallel operation execution.
//!
//! Planning (including dependency discovery and duplicate-output detection)
//! has already run, so every operation writes a disjoint set of paths. What
//! remains shared is the importer instances, which keep per-input state
//! between `start_import` and `end_import`.
//!
//! # How It Works
//!
//! 1. Group operation indices by importer name
//! 2. Workers claim whole groups from a shared queue, so each importer is
//!    driven by exactly one thread
//! 3. Results are collected with their operation index and sorted back into
//!    operation order
//!
//! When any operation fails, workers stop claiming new operations and the
//! first error in operation order is returned.

use crate::build::execute::{execute_operation, Executed, PlannedOperation};
use crate::build::{BuildError, ProgressReporter};
use crate::importer::{Importer, ImporterRegistry};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Execute operations one at a time, in order.
pub fn execute_sequential(
    planned: &[PlannedOperation],
    registry: &mut ImporterRegistry,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Executed>, BuildError> {
    let mut results = Vec::with_capacity(planned.len());
    for op in planned {
        let importer = lookup(registry, op)?;
        results.push(execute_operation(op, importer, progress)?);
    }
    Ok(results)
}

/// Execute operations on up to `jobs` worker threads.
pub fn execute_parallel(
    planned: &[PlannedOperation],
    registry: &mut ImporterRegistry,
    jobs: usize,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Executed>, BuildError> {
    let mut by_importer: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, op) in planned.iter().enumerate() {
        by_importer.entry(op.operation.importer.as_str()).or_default().push(idx);
    }
    if jobs <= 1 || by_importer.len() <= 1 {
        return execute_sequential(planned, registry, progress);
    }
    let mut groups = VecDeque::new();
    for importer in registry.iter_mut() {
        if let Some(indices) = by_importer.remove(importer.name()) {
            groups.push_back((importer, indices));
        }
    }
    debug_assert!(by_importer.is_empty(), "planned operations use unregistered importers");

    let workers = jobs.min(groups.len());
    tracing::debug!(groups = groups.len(), workers, "executing in parallel");
    let queue = Mutex::new(groups);
    let results = Mutex::new(Vec::with_capacity(planned.len()));
    let failed = AtomicBool::new(false);

    std::thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (queue, results, failed) = (&queue, &results, &failed);
            handles.push(s.spawn(move || loop {
                let claimed = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some((importer, indices)) = claimed else {
                    break;
                };
                let importer: &mut dyn Importer = importer.as_mut();
                for idx in indices {
                    if failed.load(Ordering::SeqCst) {
                        return;
                    }
                    let result = execute_operation(&planned[idx], importer, progress);
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
                }
            }));
        }

        for handle in handles {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    });

    let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, result)| result).collect()
}

fn lookup<'a>(
    registry: &'a mut ImporterRegistry,
    op: &PlannedOperation,
) -> Result<&'a mut (dyn Importer + 'static), BuildError> {
    match registry.get_mut(&op.operation.importer) {
        Some(importer) => Ok(importer),
        None => Err(unknown(op)),
    }
}

fn unknown(op: &PlannedOperation) -> BuildError {
    BuildError::UnknownImporter {
        file: op.operation.input.path.clone(),
        importer: op.operation.importer.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{NullProgress, Operation, OperationStatus};
    use crate::config::HeaderConfig;
    use crate::importer::{ImportError, Input};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::thread::ThreadId;
    use tempfile::TempDir;

    /// Writes its name and records which threads drove it.
    struct Tagger {
        name: &'static str,
        threads: Arc<Mutex<Vec<ThreadId>>>,
        fail_on: Option<&'static str>,
    }

    impl Importer for Tagger {
        fn name(&self) -> &str {
            self.name
        }

        fn start_import(&mut self, input: &Input, _dry_run: bool) -> Result<bool, ImportError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            if self.fail_on.is_some_and(|f| input.path.ends_with(f)) {
                return Err(ImportError::Failed("boom".to_string()));
            }
            Ok(true)
        }

        fn outputs(&self, input: &Input) -> Result<Vec<PathBuf>, ImportError> {
            Ok(vec![input.relative_path()])
        }

        fn write_output(
            &mut self,
            input: &Input,
            _index: usize,
            sink: &mut dyn Write,
        ) -> Result<(), ImportError> {
            sink.write_all(self.name.as_bytes()).map_err(|e| ImportError::io(&input.path, e))
        }
    }

    fn tagger(name: &'static str, fail_on: Option<&'static str>) -> (Tagger, Arc<Mutex<Vec<ThreadId>>>) {
        let threads = Arc::new(Mutex::new(Vec::new()));
        (Tagger { name, threads: Arc::clone(&threads), fail_on }, threads)
    }

    fn planned(root: &Path, importer: &str, file: &str) -> PlannedOperation {
        let input = root.join("in").join(file);
        PlannedOperation {
            operation: Operation {
                importer: importer.to_string(),
                input: Input::new(&input, &root.join("in")),
                header: HeaderConfig::default(),
                output_path: None,
            },
            outputs: vec![root.join("out").join(format!("{}.{}", file, importer))],
            input_cached: false,
        }
    }

    #[test]
    fn test_parallel_matches_operation_order() {
        let temp = TempDir::new().unwrap();
        let (a, a_threads) = tagger("a", None);
        let (b, b_threads) = tagger("b", None);
        let mut registry = ImporterRegistry::new();
        registry.register(Box::new(a));
        registry.register(Box::new(b));

        let ops: Vec<_> = ["1", "2", "3", "4"]
            .iter()
            .enumerate()
            .map(|(i, f)| planned(temp.path(), if i % 2 == 0 { "a" } else { "b" }, f))
            .collect();
        let results = execute_parallel(&ops, &mut registry, 4, &NullProgress).unwrap();

        let ids: Vec<_> = results.iter().map(|(r, _)| r.operation_id.clone()).collect();
        assert_eq!(ids, vec!["a:1", "b:2", "a:3", "b:4"]);
        assert!(results.iter().all(|(r, _)| r.status == OperationStatus::Built));
        assert_eq!(std::fs::read_to_string(&ops[1].outputs[0]).unwrap(), "b");

        // Each importer is driven by a single thread.
        for threads in [a_threads, b_threads] {
            let threads = threads.lock().unwrap();
            assert!(threads.iter().all(|t| *t == threads[0]));
        }
    }

    #[test]
    fn test_first_error_in_operation_order() {
        let temp = TempDir::new().unwrap();
        let (a, _) = tagger("a", Some("2"));
        let (b, _) = tagger("b", None);
        let mut registry = ImporterRegistry::new();
        registry.register(Box::new(a));
        registry.register(Box::new(b));

        let ops = vec![planned(temp.path(), "b", "1"), planned(temp.path(), "a", "2")];
        let err = execute_parallel(&ops, &mut registry, 2, &NullProgress).unwrap_err();
        assert!(matches!(err, BuildError::Import { importer, .. } if importer == "a"));
    }

    #[test]
    fn test_single_job_is_sequential() {
        let temp = TempDir::new().unwrap();
        let (a, _) = tagger("a", None);
        let mut registry = ImporterRegistry::new();
        registry.register(Box::new(a));
        let ops = vec![planned(temp.path(), "a", "1"), planned(temp.path(), "a", "2")];
        let results = execute_parallel(&ops, &mut registry, 1, &NullProgress).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_default_jobs_positive() {
        assert!(default_jobs() >= 1);
    }
}
