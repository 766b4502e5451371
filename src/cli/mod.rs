//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod compile;
mod restore;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::pipeline::PipelineError;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;
pub(crate) const EXIT_ROLLBACK_FAILED: u8 = 3;

/// Exit code for a failed run.
pub(crate) fn exit_code_for(err: &PipelineError) -> u8 {
    match err {
        PipelineError::Config(_) => EXIT_INVALID_ARGS,
        PipelineError::RollbackFailed { .. } => EXIT_ROLLBACK_FAILED,
        _ => EXIT_ERROR,
    }
}

/// luac-batch - Compile every Lua script of an MTA resource
#[derive(Parser)]
#[command(name = "luac-batch")]
#[command(about = "Compile every Lua script in a resource folder, update meta.xml, roll back on failure")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a resource folder in place
    Compile(CompileArgs),

    /// Restore a resource folder from a snapshot taken by an earlier run
    Restore {
        /// Snapshot directory (e.g. backups/race_1700000000000)
        #[arg(short, long)]
        backup: PathBuf,

        /// Resource folder to replace
        #[arg(short, long)]
        res: PathBuf,

        /// Show debug logs
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Arguments of the `compile` command
#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Resource folder to compile
    #[arg(short, long)]
    pub res: PathBuf,

    /// Folder to place a snapshot in before compiling
    #[arg(short, long)]
    pub backup: Option<PathBuf>,

    /// Obfuscation level: 1, 2, 3 (or e, e2, e3)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Delete source files after they compile (requires --backup)
    #[arg(short, long)]
    pub del: bool,

    /// Use a local compiler instead of the compile service
    #[arg(long)]
    pub local: bool,

    /// Local compiler executable
    #[arg(long)]
    pub compiler: Option<PathBuf>,

    /// Compile service URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Maximum number of files compiled at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-file timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Extra attempts for a failed file
    #[arg(long)]
    pub retries: Option<u32>,

    /// Config file (default: nearest luac-batch.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show what would be compiled without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Emit progress as JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Show per-file progress and debug logs
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => compile::run_compile(&args),
        Commands::Restore { backup, res, verbose } => {
            restore::run_restore(&backup, &res, verbose)
        }
    }
}
