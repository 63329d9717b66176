//! Build pipeline module for assetpipe
//!
//! Turns a scanned input tree into written outputs, rebuilding only what
//! changed since the last run.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Planning**: one [`Operation`] per (importer, input file) pair named by
//!   the file's config, with directory defaults merged in
//! - **Dependency resolution**: each importer reports what its input reads,
//!   and the transitive set is recorded in the cache
//! - **Execution**: stale outputs are written, sequentially or in parallel
//! - **Aggregation**: related C headers get a combined header
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{BuildContext, ConsoleProgress, ImportPipeline};
//!
//! let context = BuildContext::new("assets", "build");
//! let mut pipeline = ImportPipeline::new(context)?;
//!
//! let result = pipeline.run(&ConsoleProgress::new())?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod deps;
pub mod execute;
pub mod header;
pub mod operation;
pub mod outputs;
pub mod parallel;
pub mod pipeline;
pub mod progress;
pub mod result;

pub use context::*;
pub use deps::*;
pub use execute::*;
pub use header::*;
pub use operation::*;
pub use outputs::*;
pub use parallel::*;
pub use pipeline::*;
pub use progress::*;
pub use result::*;
