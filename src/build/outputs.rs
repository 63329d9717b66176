//! Output path computation.
//!
//! Importers name their outputs relative to the output root. An operation's
//! `outputPath` template can move them:
//!
//! | Template        | Input `tex/rock.png`, glob captures `["rock"]` |
//! |-----------------|------------------------------------------------|
//! | `sprites/`      | `sprites/rock.png`                             |
//! | `sprites/*.bin` | `sprites/rock.bin` (output 0)                  |
//! | `$1/data`       | `rock/data` (output 0)                         |
//!
//! A template ending in `/` is a directory that receives every output under
//! its own file name. Any other template names output 0; further outputs keep
//! their file names and land next to it.

use crate::build::Operation;
use crate::importer::{ImportError, Importer};
use crate::paths;
use std::path::{Path, PathBuf};

/// Substitute `*` with `stem` and `$1`..`$9` with glob captures.
/// Missing captures expand to nothing.
pub fn expand_template(template: &str, stem: &str, matches: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(stem),
            '$' => match chars.peek().and_then(|d| d.to_digit(10)) {
                Some(digit) if digit > 0 => {
                    chars.next();
                    if let Some(capture) = matches.get(digit as usize - 1) {
                        out.push_str(capture);
                    }
                }
                _ => out.push('$'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Apply an output template to the importer's relative outputs.
pub fn apply_output_template(
    template: Option<&str>,
    outputs: Vec<PathBuf>,
    stem: &str,
    matches: &[String],
) -> Vec<PathBuf> {
    let Some(template) = template else {
        return outputs;
    };
    let expanded = expand_template(template, stem, matches);

    if expanded.ends_with('/') {
        let dir = PathBuf::from(expanded);
        return outputs.iter().map(|output| dir.join(file_name(output))).collect();
    }

    let first = PathBuf::from(&expanded);
    let dir = first.parent().map(Path::to_path_buf).unwrap_or_default();
    outputs
        .iter()
        .enumerate()
        .map(|(index, output)| if index == 0 { first.clone() } else { dir.join(file_name(output)) })
        .collect()
}

fn file_name(path: &Path) -> &Path {
    path.file_name().map(Path::new).unwrap_or(path)
}

/// Path of the C header that wraps `path`.
pub fn header_path(path: &Path) -> PathBuf {
    path.with_extension("h")
}

/// Final absolute output paths for an operation.
pub fn resolve_outputs(
    operation: &Operation,
    importer: &dyn Importer,
    output_root: &Path,
) -> Result<Vec<PathBuf>, ImportError> {
    let outputs = importer.outputs(&operation.input)?;
    let stem = operation
        .input
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let outputs = apply_output_template(
        operation.output_path.as_deref(),
        outputs,
        &stem,
        &operation.input.path_matches,
    );

    Ok(outputs
        .into_iter()
        .map(|output| if operation.header.produce_headers { header_path(&output) } else { output })
        .map(|output| paths::normalize(&output_root.join(output)))
        .collect())
}
