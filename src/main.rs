mod cli;
mod config;
mod error;
mod migrate;
mod model;
mod providers;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::setup_logging(&cli.verbosity, &cli.log_format);

    match cli::execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        // Some items failed; the summary lists them
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
