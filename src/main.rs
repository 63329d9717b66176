//! apipe - Command-line tool for the assetpipe import pipeline

use std::process::ExitCode;

use assetpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
