pub mod documents;
pub mod settings;

use std::time::Duration;

use anyhow::Result;
use oparl_core::config::MeilisearchConfig;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

pub use documents::*;

const USER_AGENT: &str = "oparl-ingestor/1.0 (+https://example.org/oparl-ingestor)";

/// Thin HTTP client over a Meilisearch-compatible REST API. Every call is
/// best-effort from the orchestrator's point of view: failures are logged
/// here and surfaced as `Ok(false)`/`Err`, never panics, because a sync must
/// not fail just because the search backend is unreachable.
pub struct SearchIndexer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SearchIndexer {
    pub fn new(cfg: &MeilisearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.key.clone(),
        })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    /// Pushes one batch of documents to `index_name`. An empty batch is a
    /// no-op that returns `Ok(())` without making a request.
    pub async fn index_documents<T: Serialize>(&self, index_name: &str, docs: &[T]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let url = format!("{}/indexes/{}/documents", self.base_url, index_name);
        let resp = self.auth(self.client.post(&url)).json(docs).send().await;
        match resp {
            Ok(r) if r.status().is_success() || r.status().as_u16() == 202 => Ok(()),
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                warn!(index = index_name, %status, %body, "search indexing request failed");
                anyhow::bail!("meilisearch returned {status} indexing {index_name}");
            }
            Err(e) => {
                warn!(index = index_name, error = %e, "search indexing request errored");
                Err(e.into())
            }
        }
    }

    /// Idempotently applies searchable/filterable/sortable attributes, typo
    /// tolerance, and ranking rules to every index in [`settings::INDEX_SETTINGS`].
    /// Safe to call on every startup: the backend accepts repeated identical
    /// settings without side effects.
    pub async fn ensure_index_settings(&self) -> Result<()> {
        for spec in settings::INDEX_SETTINGS {
            if let Err(e) = self.apply_settings(spec).await {
                warn!(index = spec.name, error = %e, "failed to apply search index settings");
            }
        }
        Ok(())
    }

    async fn apply_settings(&self, spec: &settings::IndexSettingsSpec) -> Result<()> {
        let base = format!("{}/indexes/{}/settings", self.base_url, spec.name);

        self.put(&format!("{base}/searchable-attributes"), &json!(spec.searchable)).await?;
        self.put(&format!("{base}/filterable-attributes"), &json!(spec.filterable)).await?;
        self.put(&format!("{base}/sortable-attributes"), &json!(spec.sortable)).await?;
        self.put(
            &format!("{base}/typo-tolerance"),
            &json!({
                "enabled": true,
                "minWordSizeForTypos": { "oneTypo": 4, "twoTypos": 8 },
            }),
        )
        .await?;
        self.put(&format!("{base}/ranking-rules"), &json!(settings::RANKING_RULES)).await?;

        Ok(())
    }

    async fn put(&self, url: &str, body: &Value) -> Result<()> {
        let resp = self.auth(self.client.put(url)).json(body).send().await?;
        if !resp.status().is_success() && resp.status().as_u16() != 202 {
            anyhow::bail!("meilisearch settings PUT to {url} returned {}", resp.status());
        }
        Ok(())
    }

    /// Probes `GET /health`. Returns `Ok(false)` rather than an error on any
    /// failure, matching the "never crash the orchestrator" contract.
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "search backend health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let indexer = SearchIndexer::new(&MeilisearchConfig {
            url: "http://127.0.0.1:1".to_string(),
            key: String::new(),
        })
        .unwrap();
        let docs: Vec<PaperDocument> = Vec::new();
        indexer.index_documents("papers", &docs).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_backend_reports_unhealthy() {
        let indexer = SearchIndexer::new(&MeilisearchConfig {
            url: "http://127.0.0.1:1".to_string(),
            key: String::new(),
        })
        .unwrap();
        assert!(!indexer.is_healthy().await);
    }
}
