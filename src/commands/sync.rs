use anyhow::Result;
use oparl_core::config::AppConfig;
use oparl_core::types::{OParlSource, SyncResult};
use tokio::sync::broadcast;

use crate::bootstrap::App;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: AppConfig,
    body: Vec<String>,
    source: Option<String>,
    all: bool,
    full: bool,
    concurrency: usize,
) -> Result<()> {
    if body.is_empty() && source.is_none() && !all {
        anyhow::bail!(
            "specify --body URL, --source URL, or --all\n\n  oparl-ingestor sync --body https://oparl.stadt-muenster.de/bodies\n  oparl-ingestor sync --source https://example.oparl.org/oparl/system\n  oparl-ingestor sync --all"
        );
    }

    println!("Mode: {}", if full { "full sync" } else { "incremental sync" });

    let app = App::init(config).await?;
    let mut results = Vec::new();

    if all {
        let sources = app.storage.list_active_sources().await?;
        println!("Syncing {} active source(s)...", sources.len());
        let oparl_sources: Vec<OParlSource> = sources
            .into_iter()
            .map(|row| {
                let mut s = OParlSource::new(row.name, row.system_url, row.priority, row.category);
                s.id = row.id;
                s.is_active = row.is_active;
                s.last_sync = row.last_sync;
                s.last_full_sync = row.last_full_sync;
                s.incremental_max_pages = row.incremental_max_pages;
                s
            })
            .collect();
        let (_tx, rx) = broadcast::channel(1);
        results.extend(app.orchestrator.sync_all(&oparl_sources, full, concurrency.max(1), rx).await);
    } else {
        for url in &body {
            println!("Syncing body: {url}");
            results.push(app.orchestrator.sync_body_url(url, full).await);
        }

        if let Some(system_url) = &source {
            let row = app.storage.get_source_by_url(system_url).await?;
            let oparl_source = match row {
                Some(row) => {
                    let mut s = OParlSource::new(row.name, row.system_url, row.priority, row.category);
                    s.id = row.id;
                    s.is_active = row.is_active;
                    s.last_sync = row.last_sync;
                    s.last_full_sync = row.last_full_sync;
                    s.incremental_max_pages = row.incremental_max_pages;
                    s
                }
                None => OParlSource::new(system_url.clone(), system_url.clone(), 2, "municipality"),
            };
            println!("Syncing source: {system_url}");
            results.push(app.orchestrator.sync_body(&oparl_source, full).await);
        }
    }

    for result in &results {
        print_result(result);
    }

    if results.iter().any(|r| !r.success) {
        anyhow::bail!("one or more syncs failed");
    }

    Ok(())
}

fn print_result(result: &SyncResult) {
    println!();
    println!("{}", result.source_url);
    if result.success {
        println!(
            "  ok: {} entities in {:.1}s (orgs={} persons={} meetings={} papers={} files={})",
            result.total_synced(),
            result.duration_secs,
            result.organizations_synced,
            result.persons_synced,
            result.meetings_synced,
            result.papers_synced,
            result.files_synced,
        );
    } else {
        println!("  failed: {}", result.error.as_deref().unwrap_or("unknown error"));
    }
}
