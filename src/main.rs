mod analytics;
mod auth;
mod cli;
mod collector;
mod config;
mod dataset;
mod error;
mod insights;
mod merge;
mod output;
mod providers;
mod storage;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use log::{error, info};

/// Exit status for any failure.
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting stepwatch - CI Step Duration Tracker");

    match cli.execute().await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
