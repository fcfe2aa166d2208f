mod cli;
mod platform;

use std::process::ExitCode;

use clap::Parser as _;

use crate::cli::WatcherCli;

fn main() -> ExitCode {
    let cli = WatcherCli::parse();

    if let Err(e) = cli.run() {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
