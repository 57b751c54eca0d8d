//! Sleet CLI: load NDJSON from a file or stdin and query it with SQL.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use sleet::{CliArgs, cli, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let Some(query) = args.query.as_deref() else {
        if let Err(e) = CliArgs::command().print_help() {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    match cli::run(&args, query).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
