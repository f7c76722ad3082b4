use anyhow::Result;
use oparl_core::config::AppConfig;

pub async fn run(config: AppConfig) -> Result<()> {
    let storage = crate::bootstrap::storage_only(&config).await?;
    let sources = storage.list_sources().await?;

    if sources.is_empty() {
        println!("No sources registered yet.");
        println!();
        println!("Add one with:");
        println!("  oparl-ingestor add-source <url>");
        println!("or load the curated list with:");
        println!("  oparl-ingestor init-sources");
        return Ok(());
    }

    println!("{:<40} {:<8} {:<10} {:<20} {}", "Name", "Priority", "Active", "Last sync", "System URL");
    for source in sources {
        let last_sync = source
            .last_sync
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<40} {:<8} {:<10} {:<20} {}",
            truncate(&source.name, 40),
            source.priority,
            if source.is_active { "yes" } else { "no" },
            last_sync,
            source.system_url,
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max.saturating_sub(1)).collect::<String>() + "…"
    } else {
        s.to_string()
    }
}
