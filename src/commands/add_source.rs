use anyhow::Result;
use oparl_client::{CircuitBreakerRegistry, HttpClient};
use oparl_core::config::AppConfig;
use oparl_core::types::OParlSource;
use oparl_metrics::MetricsCollector;
use std::sync::Arc;

pub async fn run(config: AppConfig, url: String, name: Option<String>, priority: i16) -> Result<()> {
    let storage = crate::bootstrap::storage_only(&config).await?;

    let name = match name {
        Some(n) => n,
        None => detect_name(&config, &url).await.unwrap_or_else(|| url.clone()),
    };

    let source = OParlSource::new(name.clone(), url.clone(), priority, "municipality");
    let id = storage.add_source(&source).await?;

    println!("Registered source: {name}");
    println!("  id: {id}");
    println!("  url: {url}");
    println!();
    println!("Run a sync with:");
    println!("  oparl-ingestor sync --source {url}");

    Ok(())
}

async fn detect_name(config: &AppConfig, url: &str) -> Option<String> {
    let metrics = Arc::new(MetricsCollector::new(false));
    let breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone());
    let http = HttpClient::new(config.oparl.clone(), breakers, metrics).ok()?;
    let result = http.fetch(url, false, true).await.ok()?;
    result.data?.get("name")?.as_str().map(str::to_string)
}
