//! Purser CLI entry point

use anyhow::Result;
use clap::Parser;

use purser::cli::{Cli, Commands};
use purser::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Provision { file, credentials } => {
            commands::provision::run(&file, credentials.as_deref())
        }
        Commands::Fmt { files, check } => commands::fmt::run(&files, check),
        Commands::Parse { file } => commands::parse::run(&file),
    }
}
