use std::sync::Arc;

use anyhow::Result;
use oparl_client::{CircuitBreakerRegistry, HttpClient};
use oparl_core::config::AppConfig;
use oparl_events::EventEmitter;
use oparl_extractor::Extractor;
use oparl_metrics::MetricsCollector;
use oparl_search::SearchIndexer;
use oparl_storage::Storage;

use crate::sync::SyncOrchestrator;

/// Every long-lived component a sync run needs, assembled once per process
/// in the order each depends on the last: storage and metrics first (other
/// components record into/through them), then the HTTP client and
/// extractor, then the orchestrator that ties them together.
pub struct App {
    pub storage: Arc<Storage>,
    pub metrics: Arc<MetricsCollector>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl App {
    pub async fn init(config: AppConfig) -> Result<Self> {
        let storage = Arc::new(Storage::new(&config.database.url).await?);
        storage.run_migrations().await?;

        let metrics = oparl_metrics::init(config.metrics.enabled);
        let events = Arc::new(EventEmitter::connect(&config.redis.url, config.events.enabled).await);
        let breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone());
        let http = Arc::new(HttpClient::new(config.oparl.clone(), breakers, Arc::clone(&metrics))?);
        let extractor = Arc::new(Extractor::new(config.extraction.clone()));
        let search = Arc::new(SearchIndexer::new(&config.meilisearch)?);

        let orchestrator = Arc::new(SyncOrchestrator::new(
            http,
            Arc::clone(&storage),
            events,
            Arc::clone(&metrics),
            extractor,
            search,
            config,
        ));

        Ok(Self { storage, metrics, orchestrator })
    }
}

/// Lightweight bootstrap for commands that only touch the database (`status`,
/// `list-sources`, `add-source`, `init-sources`) — skips building the HTTP
/// client, extractor, and search indexer the full sync path needs.
pub async fn storage_only(config: &AppConfig) -> Result<Storage> {
    let storage = Storage::new(&config.database.url).await?;
    storage.run_migrations().await?;
    Ok(storage)
}
