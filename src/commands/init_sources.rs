use anyhow::Result;
use oparl_core::config::AppConfig;
use oparl_core::types::OParlSource;

use crate::seeds;

pub async fn run(config: AppConfig, priority: Option<i16>) -> Result<()> {
    let storage = crate::bootstrap::storage_only(&config).await?;

    let seeds = match priority {
        Some(p) => seeds::seeds_by_priority(p),
        None => seeds::all_seeds(),
    };

    println!("Registering {} curated source(s)...", seeds.len());
    let mut registered = 0;
    for seed in seeds {
        let source = OParlSource::new(seed.name, seed.system_url, seed.priority, seed.category);
        match storage.add_source(&source).await {
            Ok(_) => {
                registered += 1;
                println!("  [ok] {}", seed.name);
            }
            Err(e) => println!("  [fail] {} - {e}", seed.name),
        }
    }

    println!();
    println!("Registered {registered} source(s). Run `oparl-ingestor sync --all` to fetch them.");
    Ok(())
}
