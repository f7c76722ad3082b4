use anyhow::Result;
use oparl_client::{CircuitBreakerRegistry, HttpClient};
use oparl_core::config::AppConfig;
use oparl_metrics::MetricsCollector;
use std::sync::Arc;

/// Performs a single uncached fetch of the given URL and reports what kind
/// of OParl object it returned, without registering a source or persisting
/// anything.
pub async fn run(config: AppConfig, url: &str) -> Result<()> {
    let metrics = Arc::new(MetricsCollector::new(false));
    let breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone());
    let http = HttpClient::new(config.oparl.clone(), breakers, metrics)?;

    println!("Fetching {url} ...");
    let result = http.fetch(url, false, true).await?;

    println!("Status: {}", result.status);
    println!("Elapsed: {:.3}s", result.elapsed.as_secs_f64());

    match result.data {
        Some(value) => {
            let type_url = value.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
            let name = value.get("name").and_then(|n| n.as_str()).unwrap_or("(no name)");
            println!("OParl type: {type_url}");
            println!("Name: {name}");
            if let Some(body) = value.get("body") {
                let count = match body {
                    serde_json::Value::Array(items) => items.len(),
                    serde_json::Value::String(_) => 1,
                    _ => 0,
                };
                println!("Bodies advertised: {count}");
            }
        }
        None => println!("No body returned (likely a 304 on an uncached fetch, which is unexpected)."),
    }

    Ok(())
}
