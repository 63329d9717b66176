//! Running a single planned operation.

use crate::build::header::{header_symbol, write_header, HeaderOutput};
use crate::build::{BuildError, Operation, OperationResult, ProgressEvent, ProgressReporter};
use crate::importer::{ImportError, ImportScope, Importer};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// An operation with its resolved outputs and staleness.
#[derive(Debug, Clone)]
pub struct PlannedOperation {
    pub operation: Operation,
    /// Absolute output paths
    pub outputs: Vec<PathBuf>,
    /// Whether the input and everything it depends on is unchanged
    pub input_cached: bool,
}

impl PlannedOperation {
    /// Whether running this operation would invoke nothing.
    pub fn is_up_to_date(&self) -> bool {
        self.input_cached && self.outputs.iter().all(|output| output.exists())
    }
}

/// Output of one operation: its result and the headers it produced or kept.
pub type Executed = (OperationResult, Vec<HeaderOutput>);

/// Run one operation with `importer`, writing its stale outputs.
pub fn execute_operation(
    planned: &PlannedOperation,
    importer: &mut dyn Importer,
    progress: &dyn ProgressReporter,
) -> Result<Executed, BuildError> {
    let operation = &planned.operation;
    let id = operation.id();
    let header_of = |path: &Path, fresh: bool| HeaderOutput {
        path: path.to_path_buf(),
        include_dir: operation.header.include_dir.clone(),
        fresh,
    };

    if planned.is_up_to_date() {
        tracing::debug!(operation = %id, "up to date");
        let headers = if operation.header.produce_headers {
            planned.outputs.iter().map(|p| header_of(p, false)).collect()
        } else {
            Vec::new()
        };
        let result = OperationResult::cached(id.clone(), planned.outputs.clone());
        report_completed(progress, &result);
        return Ok((result, headers));
    }

    progress.report(ProgressEvent::OperationStarted { operation_id: id.clone() });
    let start = Instant::now();
    let import_error = |source: ImportError| BuildError::Import {
        importer: operation.importer.clone(),
        input: operation.input.path.clone(),
        source,
    };

    let Some(mut scope) =
        ImportScope::start(importer, &operation.input, false).map_err(import_error)?
    else {
        tracing::debug!(operation = %id, "importer declined input");
        let result = OperationResult::declined(id, start.elapsed());
        report_completed(progress, &result);
        return Ok((result, Vec::new()));
    };

    let mut written = Vec::new();
    let mut kept = Vec::new();
    let mut headers = Vec::new();
    for (index, output) in planned.outputs.iter().enumerate() {
        if planned.input_cached && output.exists() {
            kept.push(output.clone());
            if operation.header.produce_headers {
                headers.push(header_of(output, false));
            }
            continue;
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| BuildError::Io { path: parent.to_path_buf(), source })?;
        }

        if operation.header.produce_headers {
            let mut data = Vec::new();
            scope.write_output(index, &mut data).map_err(import_error)?;
            let symbol = header_symbol(&operation.header.var_prefix, output);
            write_file(output, |sink| write_header(sink, &symbol, &data).map_err(|source| {
                BuildError::Io { path: output.clone(), source }
            }))?;
            headers.push(header_of(output, true));
        } else {
            write_file(output, |sink| scope.write_output(index, sink).map_err(import_error))?;
        }

        tracing::info!(operation = %id, output = %output.display(), "wrote output");
        written.push(output.clone());
    }
    drop(scope);

    let result = OperationResult::built(id, written, kept, start.elapsed());
    report_completed(progress, &result);
    Ok((result, headers))
}

/// Create `path` and fill it with `fill`. The file is removed if filling fails.
fn write_file(
    path: &Path,
    fill: impl FnOnce(&mut dyn Write) -> Result<(), BuildError>,
) -> Result<(), BuildError> {
    let io_error = |source: std::io::Error| BuildError::Io { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_error)?;
    let mut sink = BufWriter::new(file);
    let outcome = fill(&mut sink).and_then(|()| sink.flush().map_err(io_error));
    if outcome.is_err() {
        drop(sink);
        let _ = fs::remove_file(path);
    }
    outcome
}

fn report_completed(progress: &dyn ProgressReporter, result: &OperationResult) {
    progress.report(ProgressEvent::OperationCompleted {
        operation_id: result.operation_id.clone(),
        status: result.status,
        written: result.written.len(),
        duration_ms: result.duration.as_millis() as u64,
    });
}
