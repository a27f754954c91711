//! `skosnav` binary entry point.

use clap::Parser;
use skosnav_cli::{CliArgs, SkosnavCli};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = CliArgs::parse();
    let result = match SkosnavCli::from_args("skosnav", &args) {
        Ok(cli) => cli.run(args).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
