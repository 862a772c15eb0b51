//! Dead letter commands

use anyhow::{bail, Result};
use camino::Utf8Path;
use tabled::{settings::Style, Table, Tabled};

use crate::app::App;
use crate::cli::{DeadLetterClearArgs, DeadLetterCommands, DeadLetterListArgs};
use crate::output;

pub async fn run(cmd: DeadLetterCommands, config: Option<&Utf8Path>) -> Result<()> {
    let app = App::load(config)?;
    match cmd {
        DeadLetterCommands::List(args) => list(&app, args).await,
        DeadLetterCommands::Count => {
            println!("{}", app.queue.dead_letter_count().await?);
            Ok(())
        }
        DeadLetterCommands::Replay => {
            let replayed = app.queue.replay_dead_letters().await?;
            output::success(&format!("Requeued {} pushes", replayed));
            Ok(())
        }
        DeadLetterCommands::Clear(args) => clear(&app, args).await,
    }
}

#[derive(Tabled)]
struct DeadLetterRow {
    id: String,
    update: String,
    reason: String,
    #[tabled(rename = "dead-lettered")]
    dead_lettered_at: String,
}

async fn list(app: &App, args: DeadLetterListArgs) -> Result<()> {
    let letters = app.queue.list_dead_letters().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&letters)?);
        return Ok(());
    }
    if letters.is_empty() {
        output::info("No dead letters");
        return Ok(());
    }

    let rows: Vec<DeadLetterRow> = letters
        .iter()
        .map(|letter| DeadLetterRow {
            id: letter.push.identity.short_hash().to_string(),
            update: letter.push.commit_title().to_string(),
            reason: letter.reason.clone(),
            dead_lettered_at: letter.dead_lettered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}

async fn clear(app: &App, args: DeadLetterClearArgs) -> Result<()> {
    if !args.yes {
        bail!("Refusing to clear dead letters without --yes");
    }
    let cleared = app.queue.clear_dead_letters().await?;
    output::success(&format!("Cleared {} dead letters", cleared));
    Ok(())
}
