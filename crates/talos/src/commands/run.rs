//! Run command

use anyhow::Result;
use camino::Utf8Path;

use super::cancel_on_interrupt;
use crate::app::App;
use crate::cli::RunArgs;

pub async fn run(_args: RunArgs, config: Option<&Utf8Path>) -> Result<()> {
    let app = App::load(config)?;
    if app.loaded.config.repositories.is_empty() {
        tracing::warn!("No repositories configured in {}", app.loaded.config_path);
    }
    app.scheduler().run(cancel_on_interrupt()).await;
    Ok(())
}
