//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Talos - container image updates for git repositories
#[derive(Parser, Debug)]
#[command(name = "talos")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to talos.yaml config file
    #[arg(short, long, global = true, env = "TALOS_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan repositories and land queued pushes until interrupted
    Run(RunArgs),

    /// Scan repositories once and route every available update
    Scan(ScanArgs),

    /// Land queued pushes once
    Drain(DrainArgs),

    /// Inspect and replay pushes that could not be completed
    #[command(subcommand)]
    DeadLetters(DeadLetterCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Only scan the named repositories
    #[arg(short, long = "repository")]
    pub repositories: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DrainArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum DeadLetterCommands {
    /// List dead letters
    List(DeadLetterListArgs),

    /// Count dead letters
    Count,

    /// Move every dead letter back into the queue
    Replay,

    /// Delete every dead letter
    Clear(DeadLetterClearArgs),
}

#[derive(Args, Debug)]
pub struct DeadLetterListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeadLetterClearArgs {
    /// Required; clearing cannot be undone
    #[arg(long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
