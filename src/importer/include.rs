//! Text preprocessor for shader-style sources.
//!
//! Lines of the form `#include "name"` are replaced by the named file's
//! contents, recursively. Each file is pasted at most once per output, so
//! mutually including files terminate. Names are looked up next to the
//! including file first, then in each directory of the `includeDirs`
//! parameter (relative to the input root).
//!
//! Parameters:
//! - `includeDirs`: string or array of strings
//! - `extension`: replaces the output file's extension

use super::{ImportError, Importer, Input};
use crate::paths;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct IncludeImporter {
    source: Option<String>,
}

impl IncludeImporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Importer for IncludeImporter {
    fn name(&self) -> &str {
        "include"
    }

    fn start_import(&mut self, input: &Input, _dry_run: bool) -> Result<bool, ImportError> {
        let text =
            std::fs::read_to_string(&input.path).map_err(|e| ImportError::io(&input.path, e))?;
        self.source = Some(text);
        Ok(true)
    }

    fn dependencies(&mut self, input: &Input) -> Result<BTreeSet<PathBuf>, ImportError> {
        let Some(source) = &self.source else {
            return Ok(BTreeSet::new());
        };
        let dirs = include_dirs(input)?;
        let mut deps = BTreeSet::new();
        for name in source.lines().filter_map(parse_include) {
            // Unresolvable names stay in the set so the input is rebuilt
            // once the file appears.
            let dep = resolve_include(&input.path, name, &dirs)
                .unwrap_or_else(|| sibling(&input.path, name));
            deps.insert(dep);
        }
        Ok(deps)
    }

    fn outputs(&self, input: &Input) -> Result<Vec<PathBuf>, ImportError> {
        let mut output = input.relative_path();
        match input.param("extension") {
            None | Some(Value::Null) => {}
            Some(Value::String(ext)) => {
                output.set_extension(ext);
            }
            Some(_) => {
                return Err(ImportError::InvalidParam {
                    key: "extension".to_string(),
                    expected: "a string",
                })
            }
        }
        Ok(vec![output])
    }

    fn write_output(
        &mut self,
        input: &Input,
        index: usize,
        sink: &mut dyn Write,
    ) -> Result<(), ImportError> {
        if index != 0 {
            return Err(ImportError::NoSuchOutput { path: input.path.clone(), index });
        }
        let source = match &self.source {
            Some(source) => source.clone(),
            None => std::fs::read_to_string(&input.path)
                .map_err(|e| ImportError::io(&input.path, e))?,
        };
        let dirs = include_dirs(input)?;
        let mut seen = BTreeSet::from([paths::normalize(&input.path)]);
        let mut out = String::with_capacity(source.len());
        expand(&input.path, &source, &dirs, &mut seen, &mut out)?;
        sink.write_all(out.as_bytes()).map_err(|e| ImportError::io(&input.path, e))
    }

    fn end_import(&mut self, _input: &Input) {
        self.source = None;
    }
}

/// Name inside an `#include "name"` line.
fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn include_dirs(input: &Input) -> Result<Vec<PathBuf>, ImportError> {
    let invalid = || ImportError::InvalidParam {
        key: "includeDirs".to_string(),
        expected: "a string or an array of strings",
    };
    match input.param("includeDirs") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(dir)) => Ok(vec![input.resolve(Path::new(dir))]),
        Some(Value::Array(dirs)) => dirs
            .iter()
            .map(|d| d.as_str().map(|d| input.resolve(Path::new(d))).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

fn sibling(from: &Path, name: &str) -> PathBuf {
    let dir = from.parent().unwrap_or_else(|| Path::new(""));
    paths::normalize(&dir.join(name))
}

fn resolve_include(from: &Path, name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    std::iter::once(sibling(from, name))
        .chain(dirs.iter().map(|dir| paths::normalize(&dir.join(name))))
        .find(|candidate| candidate.is_file())
}

fn expand(
    path: &Path,
    source: &str,
    dirs: &[PathBuf],
    seen: &mut BTreeSet<PathBuf>,
    out: &mut String,
) -> Result<(), ImportError> {
    for line in source.lines() {
        let Some(name) = parse_include(line) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };
        let resolved = resolve_include(path, name, dirs).ok_or_else(|| {
            ImportError::Failed(format!(
                "{}: cannot resolve include \"{}\"",
                path.display(),
                name
            ))
        })?;
        if seen.insert(resolved.clone()) {
            let nested =
                std::fs::read_to_string(&resolved).map_err(|e| ImportError::io(&resolved, e))?;
            expand(&resolved, &nested, dirs, seen, out)?;
        }
    }
    Ok(())
}
