//! Compile command implementation

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use super::{exit_code_for, CompileArgs, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::{load_config, merge_cli_overrides, BackendKind, CliOverrides};
use crate::logging;
use crate::pipeline::progress::{ConsoleProgress, JsonProgress, ProgressEvent, ProgressReporter};
use crate::pipeline::{CompileContext, Pipeline};

impl CompileArgs {
    /// Flags that override config file values.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            backup_dir: self.backup.clone(),
            level: self.level.clone(),
            // Only an explicit --del turns deletion on; its absence defers to the config
            delete_originals: self.del.then_some(true),
            backend: (self.local || self.compiler.is_some()).then_some(BackendKind::Local),
            compiler: self.compiler.clone(),
            endpoint: self.endpoint.clone(),
            jobs: self.jobs,
            timeout_secs: self.timeout,
            retries: self.retries,
        }
    }
}

/// Run the compile command
pub fn run_compile(args: &CompileArgs) -> ExitCode {
    logging::init(args.verbose);

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    merge_cli_overrides(&mut config, &args.overrides());

    let reporter: Arc<dyn ProgressReporter> = if args.json {
        Arc::new(JsonProgress::with_output(std::io::stdout()))
    } else {
        Arc::new(
            ConsoleProgress::new()
                .with_colors(std::io::stderr().is_terminal())
                .with_verbose(args.verbose),
        )
    };

    let context = CompileContext::new(config, args.res.clone()).with_dry_run(args.dry_run);
    let mut pipeline = Pipeline::new(context).with_reporter(Arc::clone(&reporter));

    match pipeline.run() {
        Ok(summary) => {
            if !args.json {
                println!("{}", summary.summary());
                if summary.dry_run {
                    for job in &summary.planned {
                        println!("  - {}", job.display_name(&summary.root));
                    }
                }
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            reporter.report(ProgressEvent::Error { file: None, message: e.to_string() });
            ExitCode::from(exit_code_for(&e))
        }
    }
}
