//! Operations and planning.
//!
//! An operation is one (importer, input file) pair with its configuration
//! fully merged. Planning walks the config tree and emits one operation for
//! every importer a file's config names, in registry order.

use crate::build::BuildError;
use crate::config::{deep_merge, ConfigTree, HeaderConfig, HeaderSettings, Params};
use crate::importer::{ImporterRegistry, Input};
use crate::paths;

/// The atomic unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Name of the importer to run
    pub importer: String,
    pub input: Input,
    pub header: HeaderConfig,
    /// Output path template, relative to the output root
    pub output_path: Option<String>,
}

impl Operation {
    /// Stable identifier, `importer:relative/path`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.importer, paths::to_slash(&self.input.relative_path()))
    }
}

/// Build the operation list for a scanned tree.
///
/// Fails before emitting anything if any file names an importer that is not
/// registered.
pub fn plan_operations(
    tree: &ConfigTree,
    registry: &ImporterRegistry,
) -> Result<Vec<Operation>, BuildError> {
    for file in &tree.files {
        let Some(config) = tree.file_config(&file.path) else {
            continue;
        };
        if let Some(name) = config.importers.names().find(|name| !registry.contains(name)) {
            return Err(BuildError::UnknownImporter {
                file: file.path.clone(),
                importer: name.to_string(),
            });
        }
    }

    let mut operations = Vec::new();
    for file in &tree.files {
        let Some(file_config) = tree.file_config(&file.path) else {
            continue;
        };
        if file_config.importers.is_empty() {
            continue;
        }

        let chain = tree.dir_chain(&file.path);
        let mut header = HeaderSettings::default();
        let mut dir_output_path = None;
        let mut path_matches = Vec::new();
        for dir in &chain {
            if let Some(settings) = &dir.header {
                header.overlay(settings);
            }
            if let Some(output_path) = &dir.output_path {
                dir_output_path = Some(output_path.clone());
            }
            if let Some(matches) = dir.file_matches.get(&file.path) {
                path_matches = matches.clone();
            }
        }
        let header = header.resolve();

        for name in registry.names() {
            let Some(config) = file_config.importers.get(name) else {
                continue;
            };
            let mut dir_config = Params::new();
            for dir in &chain {
                if let Some(defaults) = dir.importers.get(name) {
                    deep_merge(&mut dir_config, defaults);
                }
            }

            let input = Input::new(&file.path, &tree.base)
                .with_config(config.clone())
                .with_dir_config(dir_config)
                .with_path_matches(path_matches.clone());
            let output_path =
                input.param_str("outputPath").map(str::to_string).or_else(|| dir_output_path.clone());

            operations.push(Operation {
                importer: name.to_string(),
                input,
                header: header.clone(),
                output_path,
            });
        }
    }

    tracing::debug!(operations = operations.len(), "planned operations");
    Ok(operations)
}
