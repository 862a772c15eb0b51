//! Config command

use anyhow::{Context, Result};
use camino::Utf8Path;
use talos_core::LoadedConfig;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config),
    }
}

fn show(args: ConfigShowArgs, config: Option<&Utf8Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config).context("Failed to load configuration")?;

    // Host tokens are never serialized
    if args.json {
        println!("{}", serde_json::to_string_pretty(&loaded.config)?);
        return Ok(());
    }

    output::header("Talos configuration");
    output::kv("Config file", loaded.config_path.as_str());
    output::kv("State directory", loaded.state_dir.as_str());
    output::kv("Repositories", &loaded.config.repositories.len().to_string());
    println!();
    print!("{}", serde_yaml_ng::to_string(&loaded.config)?);
    Ok(())
}
