use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod git;
mod logging;
mod process;
mod render;
mod tag;
mod template;
mod workflow;

use cli::RootArgs;

fn main() -> ExitCode {
    let args = match RootArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // --help and --version land here too.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(err) = logging::init(&args.log_file, args.verbose) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match workflow::run(&args) {
        Ok(written) => {
            tracing::info!(files = written.len(), "Package files updated");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{err:#}");
            tracing::error!("Failed to update package files");
            ExitCode::FAILURE
        }
    }
}
