//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// assetpipe - Incremental asset import pipeline
#[derive(Parser)]
#[command(name = "apipe")]
#[command(about = "assetpipe - Import assets incrementally using per-directory import.json configs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import every configured asset, rebuilding only what changed
    Build {
        /// Input directory or single file (default: from assetpipe.toml, else "assets")
        input: Option<PathBuf>,

        /// Output root
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Cache file (default: <output>/.import-cache.json)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Rebuild everything, ignoring the cache
        #[arg(short, long)]
        force: bool,

        /// Watch for changes and rebuild automatically
        #[arg(short, long)]
        watch: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Report progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List the outputs a build would produce, without writing anything
    Outputs {
        /// Input directory or single file
        input: Option<PathBuf>,

        /// Output root
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Cache file (default: <output>/.import-cache.json)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug` and the
/// default is `warn`. Logs go to stderr.
pub fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("assetpipe=debug")
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, cache, jobs, force, watch, verbose, json } => {
            init_logging(verbose);
            let args = build::BuildArgs { input, output, cache, jobs, force, watch, verbose, json };
            build::run_build(args)
        }
        Commands::Outputs { input, output, cache, json } => {
            init_logging(false);
            let args = build::BuildArgs { input, output, cache, json, ..Default::default() };
            build::run_outputs(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from(["apipe", "build", "assets", "-o", "out", "-j", "4", "-f"])
            .unwrap();
        match cli.command {
            Commands::Build { input, output, jobs, force, watch, .. } => {
                assert_eq!(input, Some(PathBuf::from("assets")));
                assert_eq!(output, Some(PathBuf::from("out")));
                assert_eq!(jobs, Some(4));
                assert!(force);
                assert!(!watch);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_parse_outputs() {
        let cli = Cli::try_parse_from(["apipe", "outputs", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Outputs { json: true, input: None, .. }));
    }
}
