//! The importer contract.
//!
//! An importer turns one input file into zero or more outputs. The pipeline
//! drives it through a fixed lifecycle:
//!
//! 1. [`Importer::start_import`] loads whatever per-file state the importer
//!    needs. Returning `false` declines the input.
//! 2. [`Importer::dependencies`] and [`Importer::write_output`] may then be
//!    called any number of times.
//! 3. [`Importer::end_import`] releases the state.
//!
//! [`ImportScope`] pairs steps 1 and 3 so `end_import` runs on every exit
//! path. [`Importer::outputs`] sits outside the lifecycle: it must answer from
//! the [`Input`] alone, which lets cached operations skip the file entirely.

pub mod copy;
pub mod include;
mod input;

pub use copy::CopyImporter;
pub use include::IncludeImporter;
pub use input::Input;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised by an importer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parameter '{key}' must be {expected}")]
    InvalidParam { key: String, expected: &'static str },
    #[error("no output {index} for {}", path.display())]
    NoSuchOutput { path: PathBuf, index: usize },
    #[error("{0}")]
    Failed(String),
}

impl ImportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// A named unit of work that converts one input file into outputs.
pub trait Importer: Send {
    /// Stable name, used as the key in config files.
    fn name(&self) -> &str;

    /// Prepare to handle `input`. Returns `false` to decline it.
    ///
    /// `dry_run` is set during dependency discovery, when no output will be
    /// written.
    fn start_import(&mut self, input: &Input, dry_run: bool) -> Result<bool, ImportError>;

    /// Files this input reads besides itself, absolute or relative to the
    /// input's base path.
    fn dependencies(&mut self, _input: &Input) -> Result<BTreeSet<PathBuf>, ImportError> {
        Ok(BTreeSet::new())
    }

    /// Outputs this input produces, relative to the output root.
    fn outputs(&self, input: &Input) -> Result<Vec<PathBuf>, ImportError>;

    /// Write output `index` (into the list from [`Importer::outputs`]).
    fn write_output(
        &mut self,
        input: &Input,
        index: usize,
        sink: &mut dyn Write,
    ) -> Result<(), ImportError>;

    /// Release state acquired by `start_import`.
    fn end_import(&mut self, _input: &Input) {}
}

/// An importer that has accepted an input. Calls `end_import` when dropped.
pub struct ImportScope<'a, I: Importer + ?Sized> {
    importer: &'a mut I,
    input: &'a Input,
}

impl<'a, I: Importer + ?Sized> ImportScope<'a, I> {
    /// Start `importer` on `input`. Returns `None` when the importer declines,
    /// in which case `end_import` is not called.
    pub fn start(
        importer: &'a mut I,
        input: &'a Input,
        dry_run: bool,
    ) -> Result<Option<Self>, ImportError> {
        if importer.start_import(input, dry_run)? {
            Ok(Some(Self { importer, input }))
        } else {
            Ok(None)
        }
    }

    pub fn dependencies(&mut self) -> Result<BTreeSet<PathBuf>, ImportError> {
        self.importer.dependencies(self.input)
    }

    pub fn write_output(&mut self, index: usize, sink: &mut dyn Write) -> Result<(), ImportError> {
        self.importer.write_output(self.input, index, sink)
    }
}

impl<I: Importer + ?Sized> Drop for ImportScope<'_, I> {
    fn drop(&mut self) {
        self.importer.end_import(self.input);
    }
}

/// Registered importers, in registration order.
#[derive(Default)]
pub struct ImporterRegistry {
    importers: Vec<Box<dyn Importer>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `copy` and `include` importers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CopyImporter::new()));
        registry.register(Box::new(IncludeImporter::new()));
        registry
    }

    /// Register an importer. One with the same name is replaced in place.
    /// Returns whether a previous importer was replaced.
    pub fn register(&mut self, importer: Box<dyn Importer>) -> bool {
        match self.importers.iter_mut().find(|i| i.name() == importer.name()) {
            Some(existing) => {
                tracing::debug!(name = importer.name(), "replacing registered importer");
                *existing = importer;
                true
            }
            None => {
                self.importers.push(importer);
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Importer> {
        self.importers.iter().find(|i| i.name() == name).map(|i| i.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Importer + 'static)> {
        self.importers.iter_mut().find(|i| i.name() == name).map(|i| i.as_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.importers.iter().map(|i| i.name())
    }

    /// Importers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Importer + 'static)> {
        self.importers.iter().map(|i| i.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Importer>> {
        self.importers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }
}

impl std::fmt::Debug for ImporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
