//! Build command implementations (build, outputs)

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::json;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{
    BuildContext, BuildError, ConsoleProgress, ImportPipeline, JsonProgress, ProgressEvent,
    ProgressReporter,
};
use crate::config::{
    default_config, find_config, load_config, merge_cli_overrides, CliOverrides, PipelineConfig,
};
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Flags shared by `build` and `outputs`.
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub force: bool,
    pub watch: bool,
    pub verbose: bool,
    pub json: bool,
}

/// Load `assetpipe.toml` (or defaults) and apply command-line overrides.
fn load(args: &BuildArgs) -> Result<PipelineConfig, String> {
    let mut config = match find_config() {
        Some(config_path) => {
            tracing::debug!(path = %config_path.display(), "using config");
            load_config(Some(&config_path)).map_err(|e| e.to_string())?
        }
        None => {
            tracing::debug!("no assetpipe.toml found, using defaults");
            default_config()
        }
    };

    let overrides = CliOverrides {
        input: args.input.clone(),
        output: args.output.clone(),
        cache: args.cache.clone(),
        jobs: args.jobs,
        force: args.force.then_some(true),
    };
    merge_cli_overrides(&mut config, &overrides);

    let errors = config.validate();
    if !errors.is_empty() {
        let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        return Err(format!("Invalid configuration:\n{}", lines.join("\n")));
    }
    Ok(config)
}

fn exit_code(error: &BuildError) -> ExitCode {
    if error.is_configuration_error() {
        ExitCode::from(EXIT_INVALID_ARGS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

fn reporter(args: &BuildArgs) -> Box<dyn ProgressReporter> {
    if args.json {
        Box::new(JsonProgress::new())
    } else {
        Box::new(
            ConsoleProgress::new()
                .with_colors(std::io::stderr().is_terminal())
                .with_verbose(args.verbose),
        )
    }
}

/// Run the build command
pub fn run_build(args: BuildArgs) -> ExitCode {
    let config = match load(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let context = BuildContext::from_config(&config).with_verbose(args.verbose);
    let progress = reporter(&args);

    if args.watch {
        eprintln!("Starting watch mode...");
        eprintln!("Press Ctrl+C to stop");
        return match watch_and_rebuild(WatchOptions::new(context, config.watch), progress.as_ref())
        {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    let mut pipeline = match ImportPipeline::new(context) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            progress.report(ProgressEvent::Error { message: e.to_string() });
            return exit_code(&e);
        }
    };
    match pipeline.run(progress.as_ref()) {
        Ok(result) => {
            tracing::debug!(summary = %result.summary(), "build finished");
            ExitCode::from(EXIT_SUCCESS)
        }
        // Already reported by the pipeline.
        Err(e) => exit_code(&e),
    }
}

/// Run the outputs command
pub fn run_outputs(args: BuildArgs) -> ExitCode {
    let config = match load(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let context = BuildContext::from_config(&config);

    let planned = match ImportPipeline::new(context).and_then(|mut p| p.get_outputs()) {
        Ok(planned) => planned,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code(&e);
        }
    };

    if args.json {
        let entries: Vec<_> = planned
            .iter()
            .map(|p| {
                json!({
                    "operation": p.operation.id(),
                    "input": p.operation.input.path.to_string_lossy(),
                    "outputs": p.outputs.iter().map(|o| o.to_string_lossy()).collect::<Vec<_>>(),
                    "up_to_date": p.is_up_to_date(),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(entries));
    } else {
        for p in &planned {
            let state = if p.is_up_to_date() { "cached" } else { "stale" };
            for output in &p.outputs {
                println!("{}\t{}\t{}", state, p.operation.id(), output.display());
            }
        }
    }
    ExitCode::from(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    struct CwdGuard(PathBuf);

    impl CwdGuard {
        fn enter(dir: &std::path::Path) -> Self {
            let previous = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            Self(previous)
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    #[serial]
    fn test_load_uses_project_file_and_overrides() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("assetpipe.toml"),
            "[project]\ninput = \"src-assets\"\noutput = \"gen\"\n\n[build]\njobs = 3\n",
        )
        .unwrap();
        let _cwd = CwdGuard::enter(temp.path());

        let args = BuildArgs { output: Some(PathBuf::from("other")), ..Default::default() };
        let config = load(&args).unwrap();
        assert!(config.project.input.ends_with("src-assets"));
        assert_eq!(config.project.output, PathBuf::from("other"));
        assert_eq!(config.build.jobs, 3);
        assert!(!config.build.force);
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_overrides() {
        let temp = TempDir::new().unwrap();
        let _cwd = CwdGuard::enter(temp.path());
        let args = BuildArgs { jobs: Some(0), ..Default::default() };
        let err = load(&args).unwrap_err();
        assert!(err.contains("jobs"));
    }

    #[test]
    fn test_exit_codes() {
        let config_error =
            BuildError::UnknownImporter { file: PathBuf::from("a"), importer: "x".to_string() };
        assert_eq!(exit_code(&config_error), ExitCode::from(EXIT_INVALID_ARGS));
        let io_error = BuildError::Io {
            path: PathBuf::from("a"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(exit_code(&io_error), ExitCode::from(EXIT_ERROR));
    }
}
