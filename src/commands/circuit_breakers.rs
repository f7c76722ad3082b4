use anyhow::{Context, Result};
use oparl_core::config::AppConfig;
use std::collections::BTreeMap;

/// Circuit breaker state lives only in the running `daemon` process's
/// registry, same as `metrics` — this scrapes the gauges back out of its
/// `/metrics` endpoint rather than keeping a second, empty registry here.
pub async fn run(config: AppConfig) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/metrics", config.metrics.port);
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {url}. Is `oparl-ingestor daemon` running?"))?;
    let body = response.text().await.context("failed to read metrics response body")?;

    let mut states: BTreeMap<String, u8> = BTreeMap::new();
    let mut failures: BTreeMap<String, u64> = BTreeMap::new();

    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("oparl_ingestor_circuit_breaker_state{") {
            if let Some((source, value)) = parse_metric_line(rest) {
                states.insert(source, value as u8);
            }
        } else if let Some(rest) = line.strip_prefix("oparl_ingestor_circuit_breaker_failures_total{") {
            if let Some((source, value)) = parse_metric_line(rest) {
                failures.insert(source, value);
            }
        }
    }

    if states.is_empty() {
        println!("No circuit breaker activity recorded yet.");
        return Ok(());
    }

    println!("{:<40} {:<12} {}", "Host", "State", "Failures");
    for (host, state) in &states {
        let label = match state {
            0 => "closed",
            1 => "open",
            2 => "half-open",
            _ => "unknown",
        };
        println!("{:<40} {:<12} {}", host, label, failures.get(host).copied().unwrap_or(0));
    }

    Ok(())
}

fn parse_metric_line(rest: &str) -> Option<(String, u64)> {
    let (labels, value) = rest.split_once('}')?;
    let source = labels.strip_prefix("source=\"")?.strip_suffix('"')?;
    let value: f64 = value.trim().parse().ok()?;
    Some((source.to_string(), value as u64))
}
