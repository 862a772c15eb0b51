//! Drain command

use anyhow::Result;
use camino::Utf8Path;
use serde::Serialize;

use super::cancel_on_interrupt;
use crate::app::App;
use crate::cli::DrainArgs;
use crate::output;

#[derive(Serialize)]
struct DrainJson {
    batches: usize,
    landed: usize,
    dead_lettered: usize,
    withheld: usize,
    failed_batches: usize,
    still_queued: usize,
}

pub async fn run(args: DrainArgs, config: Option<&Utf8Path>) -> Result<()> {
    let app = App::load(config)?;
    let report = app.scheduler().drain(&cancel_on_interrupt()).await?;
    let still_queued = app.queue.len().await?;

    if args.json {
        let json = DrainJson {
            batches: report.groups,
            landed: report.landed,
            dead_lettered: report.dead_lettered,
            withheld: report.withheld,
            failed_batches: report.failed_groups,
            still_queued,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if report.groups == 0 && report.withheld == 0 {
        output::info("Queue is empty");
        return Ok(());
    }
    output::header("Queue pass");
    output::kv("Landed", &report.landed.to_string());
    output::kv("Dead-lettered", &report.dead_lettered.to_string());
    output::kv("Withheld", &report.withheld.to_string());
    output::kv("Still queued", &still_queued.to_string());
    if report.failed_groups > 0 {
        output::warning(&format!(
            "{} repository batches failed; their pushes stay queued",
            report.failed_groups
        ));
    }
    Ok(())
}
