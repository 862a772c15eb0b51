//! Scan command

use anyhow::{bail, Result};
use camino::Utf8Path;
use tabled::{settings::Style, Table, Tabled};

use crate::app::App;
use crate::cli::ScanArgs;
use crate::output;

#[derive(Tabled)]
struct ScanRow {
    repository: String,
    locations: usize,
    failures: usize,
    queued: usize,
    notified: usize,
    prompted: usize,
    #[tabled(rename = "already raised")]
    already_raised: usize,
    #[tabled(rename = "no upgrade")]
    no_upgrade: usize,
    errors: usize,
}

pub async fn run(args: ScanArgs, config: Option<&Utf8Path>) -> Result<()> {
    let app = App::load(config)?;

    let repositories: Vec<_> = app
        .loaded
        .config
        .repositories
        .iter()
        .filter(|r| args.repositories.is_empty() || args.repositories.contains(&r.name))
        .collect();
    if repositories.is_empty() {
        bail!("No matching repositories configured");
    }

    let mut rows = Vec::new();
    let mut failed = 0;
    for repo in repositories {
        match app.orchestrator.scan_repository(repo).await {
            Ok(report) => rows.push(ScanRow {
                repository: repo.name.clone(),
                locations: report.locations,
                failures: report.failures + report.rejected_groups,
                queued: report.queued,
                notified: report.notified,
                prompted: report.prompted,
                already_raised: report.already_raised,
                no_upgrade: report.no_upgrade,
                errors: report.errors,
            }),
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {}", repo.name, e));
            }
        }
    }

    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{}", table);
    }
    output::kv("Queued pushes", &app.queue.len().await?.to_string());

    if failed > 0 {
        bail!("{} repositories could not be scanned", failed);
    }
    Ok(())
}
