//! Talos CLI - keeps container image references in git repositories current
//!
//! This is the main entry point for the Talos command-line interface.

mod app;
mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    let json_logs = matches!(&cli.command, Commands::Run(args) if args.json);
    init_tracing(cli.verbose, cli.quiet, json_logs);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => commands::run::run(args, config).await,
        Commands::Scan(args) => commands::scan::run(args, config).await,
        Commands::Drain(args) => commands::drain::run(args, config).await,
        Commands::DeadLetters(cmd) => commands::dead_letters::run(cmd, config).await,
        Commands::Config(cmd) => commands::config::run(cmd, config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Exactly one of the two layers is present
    let (text, json) = if json {
        (None, Some(fmt::layer().json().with_current_span(false)))
    } else {
        (Some(fmt::layer().with_target(false)), None)
    };

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .init();
}
