use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use oparl_core::config::OparlConfig;
use oparl_core::error::IngestError;
use oparl_core::types::ListResponse;
use oparl_metrics::MetricsCollector;
use rand::Rng;
use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreakerRegistry;

const USER_AGENT: &str = "oparl-ingestor/1.0 (+https://example.org/oparl-ingestor)";

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub status: u16,
    pub data: Option<Value>,
    pub from_cache: bool,
    pub elapsed: Duration,
}

#[derive(Default)]
struct CacheEntry {
    etag: Option<String>,
    last_modified: Option<String>,
}

/// Lazy page stream returned by [`HttpClient::fetch_list`]. Holds only the
/// next page URL and a page counter; nothing is fetched until `next_page`
/// is called.
pub struct ListPages<'a> {
    client: &'a HttpClient,
    next: Option<String>,
    max_pages: Option<u32>,
    pages_fetched: u32,
}

impl<'a> ListPages<'a> {
    /// Fetches and returns the next page's `data` array, or `None` once
    /// pagination is exhausted (no `links.next`, a 304, or `max_pages`
    /// reached).
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>, IngestError> {
        if let Some(max) = self.max_pages {
            if self.pages_fetched >= max {
                return Ok(None);
            }
        }
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let result = self.client.fetch(&url, true, false).await?;
        self.pages_fetched += 1;
        let Some(data) = result.data else {
            return Ok(None); // 304: nothing changed, nothing new to page through
        };
        let list: ListResponse = serde_json::from_value(data).map_err(|e| IngestError::Parse(e.to_string()))?;
        self.next = list.links.next;
        Ok(Some(list.data))
    }
}

/// Pooled, concurrency-bounded fetcher for OParl JSON endpoints. One
/// instance is created per orchestrator run; its ETag/Last-Modified caches
/// are in-memory only and never persisted across runs.
pub struct HttpClient {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    breakers: CircuitBreakerRegistry,
    metrics: Arc<MetricsCollector>,
    cache: DashMap<String, CacheEntry>,
    cfg: OparlConfig,
}

impl HttpClient {
    pub fn new(cfg: OparlConfig, breakers: CircuitBreakerRegistry, metrics: Arc<MetricsCollector>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(cfg.max_concurrent)),
            breakers,
            metrics,
            cache: DashMap::new(),
            cfg,
        })
    }

    fn host_of(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| url.to_string())
    }

    /// Fetch a single URL, applying cache headers, rate limiting, the
    /// circuit breaker, and retry-with-backoff. `skip_rate_limit` bypasses
    /// the inter-request wait for one-off bootstrap calls (system object,
    /// `test-connection`).
    pub async fn fetch(&self, url: &str, use_cache: bool, skip_rate_limit: bool) -> Result<FetchResult, IngestError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| IngestError::Other(e.into()))?;

        let host = Self::host_of(url);
        let breaker = self.breakers.get(&host);
        if let Err(e) = breaker.check().await {
            self.metrics.record_http_error(&host, "circuit_open");
            return Err(e);
        }

        if !skip_rate_limit {
            tokio::time::sleep(Duration::from_secs_f64(self.cfg.wait_time_secs)).await;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let start = Instant::now();
            let result = self.do_fetch(url, use_cache).await;
            let elapsed = start.elapsed();

            match result {
                Ok(fetch_result) => {
                    breaker.record_success().await;
                    self.metrics.record_http_request(&host, fetch_result.status, elapsed, fetch_result.from_cache);
                    return Ok(fetch_result);
                }
                Err(err) if matches!(&err, IngestError::Http { status, .. } if *status == 404) => {
                    self.metrics.record_http_request(&host, 404, elapsed, false);
                    return Err(err);
                }
                Err(err) if !err.is_retryable() => {
                    self.metrics.record_http_error(&host, "permanent");
                    return Err(err);
                }
                Err(err) => {
                    breaker.record_failure().await;
                    self.metrics.record_http_error(&host, "transient");
                    if attempt > self.cfg.max_retries {
                        return Err(err);
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(url, attempt, max_retries = self.cfg.max_retries, delay_ms = delay.as_millis() as u64, "retrying after error: {err}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.cfg.retry_backoff.powi(attempt as i32 - 1);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(base * jitter)
    }

    async fn do_fetch(&self, url: &str, use_cache: bool) -> Result<FetchResult, IngestError> {
        let mut req = self.client.get(url).header("Accept", "application/json");

        if use_cache && self.cfg.etag_cache_enabled {
            if let Some(entry) = self.cache.get(url) {
                if let Some(etag) = &entry.etag {
                    if let Ok(v) = HeaderValue::from_str(etag) {
                        req = req.header(IF_NONE_MATCH, v);
                    }
                }
                if self.cfg.modified_since_enabled {
                    if let Some(lm) = &entry.last_modified {
                        if let Ok(v) = HeaderValue::from_str(lm) {
                            req = req.header(IF_MODIFIED_SINCE, v);
                        }
                    }
                }
            }
        }

        let resp = req
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::Timeout(self.cfg.request_timeout_secs)
                } else {
                    IngestError::Network(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();

        if status == 304 {
            return Ok(FetchResult {
                url: url.to_string(),
                status,
                data: None,
                from_cache: true,
                elapsed: Duration::ZERO,
            });
        }

        if status == 404 {
            return Err(IngestError::Http { status, url: url.to_string() });
        }

        if status >= 400 && status < 500 {
            return Err(IngestError::Http { status, url: url.to_string() });
        }

        if status >= 500 {
            return Err(IngestError::Http { status, url: url.to_string() });
        }

        if use_cache {
            let etag = resp.headers().get("etag").and_then(|v| v.to_str().ok()).map(String::from);
            let last_modified = resp.headers().get("last-modified").and_then(|v| v.to_str().ok()).map(String::from);
            if etag.is_some() || last_modified.is_some() {
                self.cache.insert(url.to_string(), CacheEntry { etag, last_modified });
            }
        }

        let body = resp.text().await.map_err(|e| IngestError::Network(e.to_string()))?;
        let data: Value = serde_json::from_str(&body).map_err(|e| IngestError::Parse(e.to_string()))?;

        Ok(FetchResult {
            url: url.to_string(),
            status,
            data: Some(data),
            from_cache: false,
            elapsed: Duration::ZERO,
        })
    }

    /// Fetch the system object: no cache, no rate-limit wait. Used once at
    /// startup and by `test-connection`.
    pub async fn fetch_system(&self, url: &str) -> Result<Value, IngestError> {
        let result = self.fetch(url, false, true).await?;
        result.data.ok_or_else(|| IngestError::Parse(format!("empty system response from {url}")))
    }

    /// Returns a lazy page iterator over a list URL: each call to
    /// `ListPages::next_page` issues exactly one HTTP request and advances
    /// via the response's `links.next`, bounded by `max_pages` (None =
    /// unbounded, used by full sync). A caller that stops early — e.g. the
    /// incremental sync's per-item timestamp filter deciding the rest of the
    /// list is stale — never pays for pages it doesn't consume.
    pub fn fetch_list<'a>(&'a self, url: &str, max_pages: Option<u32>) -> ListPages<'a> {
        ListPages {
            client: self,
            next: Some(url.to_string()),
            max_pages,
            pages_fetched: 0,
        }
    }

    /// Drains `fetch_list` eagerly into one `Vec`, for callers that want the
    /// whole list and don't care about per-page laziness.
    pub async fn fetch_list_all(&self, url: &str, max_pages: Option<u32>) -> Result<Vec<Value>, IngestError> {
        let mut pages = self.fetch_list(url, max_pages);
        let mut items = Vec::new();
        while let Some(page) = pages.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }

    /// Concurrent fetch of many URLs, preserving input order in the result.
    /// Concurrency is still bounded by the client's own semaphore, so this
    /// is safe to call with an arbitrarily large batch.
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<Result<FetchResult, IngestError>> {
        let futures = urls.iter().map(|u| self.fetch(u, true, false));
        futures::future::join_all(futures).await
    }

    pub fn get_url_hash(url: &str) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(url.as_bytes());
        hex::encode(&digest[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_hash_is_eight_hex_chars() {
        let h = HttpClient::get_url_hash("https://example.org/body/1");
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn host_of_extracts_authority() {
        assert_eq!(HttpClient::host_of("https://koeln.de/oparl/body/1"), "koeln.de");
    }
}
