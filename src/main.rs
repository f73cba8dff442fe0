use crate::cli::{Cli, Commands};
use clap::Parser;

mod cli;
mod commands;
mod gui;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args)?,
        Commands::Sweep(args) => commands::sweep::run(args)?,
        Commands::Gui { config } => commands::gui::run(config)?,
    }

    Ok(())
}
