use anyhow::Result;
use oparl_core::config::AppConfig;
use oparl_storage::Storage;

const TABLES: &[(&str, &str)] = &[
    ("Bodies", "oparl_bodies"),
    ("Organizations", "oparl_organizations"),
    ("Persons", "oparl_persons"),
    ("Memberships", "oparl_memberships"),
    ("Meetings", "oparl_meetings"),
    ("Agenda items", "oparl_agenda_items"),
    ("Papers", "oparl_papers"),
    ("Consultations", "oparl_consultations"),
    ("Files", "oparl_files"),
    ("Locations", "oparl_locations"),
    ("Legislative terms", "oparl_legislative_terms"),
];

pub async fn run(config: AppConfig) -> Result<()> {
    let storage = Storage::new(&config.database.url).await?;

    match storage.check_connectivity().await {
        Ok(()) => println!("Database: connected"),
        Err(e) => {
            println!("Database: ERROR - {e}");
            return Ok(());
        }
    }

    storage.run_migrations().await?;

    println!("\nEntity counts:");
    for (label, table) in TABLES {
        match storage.count_table(table).await {
            Ok(count) => println!("  {label:<20} {count}"),
            Err(e) => println!("  {label:<20} ERROR ({e})"),
        }
    }

    let sources = storage.list_sources().await?;
    println!("\nSources: {}", sources.len());
    for source in sources {
        let last_sync = source
            .last_sync
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let active = if source.is_active { "active" } else { "inactive" };
        println!("  [{active}] {} (priority {}) - last sync: {last_sync}", source.name, source.priority);
    }

    Ok(())
}
