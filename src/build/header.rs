//! C header generation and aggregation.
//!
//! With header output enabled, each output is written as a byte array:
//!
//! ```c
//! #pragma once
//!
//! static const unsigned char g_shape_vertex[] = {
//!     0x03, 0x02, 0x23, 0x07, ...
//! };
//! static const unsigned int g_shape_vertex_size = 1024;
//! ```
//!
//! Headers whose names differ only in a trailing `.variant` suffix
//! (`shape.vertex.h`, `shape.fragment.h`) are grouped, and each group of two
//! or more gets a combined `shape.h` that includes every member.

use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const BYTES_PER_LINE: usize = 12;

/// C identifier for a header's array: `prefix` plus the sanitized file stem.
pub fn header_symbol(prefix: &str, header: &Path) -> String {
    let stem = header.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let mut symbol = String::with_capacity(prefix.len() + stem.len());
    symbol.push_str(prefix);
    for c in stem.chars() {
        symbol.push(if c.is_ascii_alphanumeric() { c } else { '_' });
    }
    if symbol.starts_with(|c: char| c.is_ascii_digit()) || symbol.is_empty() {
        symbol.insert(0, '_');
    }
    symbol
}

/// Write `data` as a C header declaring `symbol` and `symbol_size`.
pub fn write_header(sink: &mut dyn Write, symbol: &str, data: &[u8]) -> io::Result<()> {
    writeln!(sink, "#pragma once")?;
    writeln!(sink)?;
    writeln!(sink, "static const unsigned char {}[] = {{", symbol)?;
    for chunk in data.chunks(BYTES_PER_LINE) {
        let line: Vec<String> = chunk.iter().map(|b| format!("0x{:02x}", b)).collect();
        writeln!(sink, "    {},", line.join(", "))?;
    }
    writeln!(sink, "}};")?;
    writeln!(sink, "static const unsigned int {}_size = {};", symbol, data.len())
}

/// A header produced (or kept) by this run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HeaderOutput {
    pub path: PathBuf,
    /// Directory prefix for `#include` lines pointing at this header
    pub include_dir: String,
    /// Written this run
    pub fresh: bool,
}

/// Headers sharing one combined header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderGroup {
    /// Combined header path
    pub path: PathBuf,
    pub members: Vec<HeaderOutput>,
}

impl HeaderGroup {
    /// Whether any member was written this run.
    pub fn is_fresh(&self) -> bool {
        self.members.iter().any(|m| m.fresh)
    }

    /// Contents of the combined header.
    pub fn render(&self, output_root: &Path) -> String {
        let mut text = String::from("#pragma once\n\n");
        for member in &self.members {
            let relative = paths::relative_slash(&member.path, output_root)
                .unwrap_or_else(|| member.path.to_string_lossy().into_owned());
            let include = if member.include_dir.is_empty() {
                relative
            } else {
                format!("{}/{}", member.include_dir.trim_end_matches('/'), relative)
            };
            text.push_str(&format!("#include \"{}\"\n", include));
        }
        text
    }
}

/// Combined header path for `path`: `name.variant.h` becomes `name.h`.
/// Returns `None` when the stem has no suffix to strip.
pub fn group_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let (base, _) = stem.rsplit_once('.')?;
    if base.is_empty() {
        return None;
    }
    Some(path.with_file_name(format!("{}.h", base)))
}

/// Group headers by combined path, dropping groups with fewer than two members.
pub fn group_headers(headers: &[HeaderOutput]) -> Vec<HeaderGroup> {
    let mut groups: BTreeMap<PathBuf, BTreeSet<HeaderOutput>> = BTreeMap::new();
    for header in headers {
        if let Some(path) = group_path(&header.path) {
            groups.entry(path).or_default().insert(header.clone());
        }
    }
    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(path, members)| HeaderGroup { path, members: members.into_iter().collect() })
        .collect()
}

/// Outcome of header aggregation.
#[derive(Debug, Default, PartialEq)]
pub struct CombinedHeaders {
    pub written: Vec<PathBuf>,
    /// Combined headers not written because a planned output has their path
    pub collisions: Vec<PathBuf>,
}

/// Write a combined header for every group with a freshly written member.
///
/// Groups whose combined path is also a planned output are skipped.
pub fn write_combined_headers(
    headers: &[HeaderOutput],
    output_root: &Path,
    planned: &BTreeSet<PathBuf>,
) -> io::Result<CombinedHeaders> {
    let mut combined = CombinedHeaders::default();
    for group in group_headers(headers) {
        if !group.is_fresh() {
            tracing::debug!(path = %group.path.display(), "combined header up to date");
            continue;
        }
        if planned.contains(&group.path) {
            tracing::warn!(
                path = %group.path.display(),
                "combined header collides with a planned output, not writing"
            );
            combined.collisions.push(group.path);
            continue;
        }
        if let Some(parent) = group.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&group.path, group.render(output_root))?;
        tracing::info!(
            path = %group.path.display(),
            members = group.members.len(),
            "wrote combined header"
        );
        combined.written.push(group.path);
    }
    Ok(combined)
}
