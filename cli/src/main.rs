mod cfn;
mod commands;
mod config;
mod error;
mod git;
mod logger;
mod naming;
mod runner;
mod stacks;
mod stage;

use crate::commands::Commands;
use crate::runner::{Runnable, Runner};
use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
async fn run(command: impl Runnable) {
    let run = command.runner().run().await;

    if let Err(error) = run {
        println!(
            "\n{}\n{error}",
            console::style("Error").red().bold(),
        );

        std::process::exit(1)
    }
}

#[tokio::main]
async fn main() {
    logger::Logger::init();

    // Match all commands here, in one place
    match Cli::parse().command {
        Commands::Bootstrap(cmd) => run(cmd).await,
        Commands::Deploy(cmd) => run(cmd).await,
        Commands::Outputs(cmd) => run(cmd).await,
        Commands::Synth(cmd) => run(cmd).await,
    }
}
