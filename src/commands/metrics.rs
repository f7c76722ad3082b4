use anyhow::{Context, Result};
use oparl_core::config::AppConfig;

/// A one-shot CLI process has no metrics of its own to show; the counters
/// live in the long-running `daemon` process. This queries that process's
/// `/metrics` endpoint instead of maintaining a second, always-empty
/// registry here.
pub async fn run(config: AppConfig) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/metrics", config.metrics.port);
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {url}. Is `oparl-ingestor daemon` running?"))?;
    let body = response.text().await.context("failed to read metrics response body")?;
    print!("{body}");
    Ok(())
}
