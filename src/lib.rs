//! assetpipe - Incremental asset import pipeline
//!
//! This library provides functionality to:
//! - Scan an input tree for `import.json` and `<file>.import.json` configs
//! - Run pluggable importers over each configured file
//! - Track inputs, dependencies and outputs in a JSON cache so only stale
//!   work is redone
//! - Aggregate per-asset C headers into combined headers

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod glob;
pub mod importer;
pub mod paths;
pub mod watch;
