//! brewlet CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use brewlet_cli::cmd;
use brewlet_cli::cmd::install::InstallOptions;
use brewlet_cli::{Cli, Commands, exit_code};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            formula,
            version,
            arch,
            target,
            dry_run,
        } => {
            cmd::install::install(InstallOptions {
                formula: &formula,
                version: version.as_deref(),
                arch,
                target,
                dry_run,
            })
            .await
        }
        Commands::Info {
            formula,
            version,
            json,
        } => cmd::info::info(&formula, version.as_deref(), json),
        Commands::Versions { dir } => cmd::versions::versions(&dir),
        Commands::Hash { algorithm, files } => cmd::hash::hash(&files, algorithm),
    }
}
