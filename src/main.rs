//! luac-batch - Command-line tool for compiling MTA resources in bulk

use std::process::ExitCode;

use luac_batch::cli;

fn main() -> ExitCode {
    cli::run()
}
