use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub meilisearch: MeilisearchConfig,
    pub oparl: OparlConfig,
    pub sync: SyncConfig,
    pub events: EventsConfig,
    pub metrics: MetricsConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MeilisearchConfig {
    #[serde(default = "default_meili_url")]
    pub url: String,
    #[serde(default = "default_meili_key")]
    pub key: String,
}

fn default_meili_url() -> String {
    "http://localhost:7700".to_string()
}

fn default_meili_key() -> String {
    "masterKey".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OparlConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_true")]
    pub etag_cache_enabled: bool,
    #[serde(default = "default_true")]
    pub modified_since_enabled: bool,
}

fn default_request_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_backoff() -> f64 {
    2.0
}
fn default_wait_time() -> f64 {
    0.05
}
fn default_max_concurrent() -> usize {
    20
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_full_sync_hour")]
    pub full_sync_hour: u32,
    #[serde(default = "default_incremental_max_pages")]
    pub incremental_max_pages: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_interval_minutes() -> u64 {
    15
}
fn default_full_sync_hour() -> u32 {
    3
}
fn default_incremental_max_pages() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

#[derive(Debug, Deserialize, Clone)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout() -> u64 {
    60
}
fn default_success_threshold() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_extraction_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_extraction_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_true")]
    pub download_files: bool,
    #[serde(default = "default_file_storage_path")]
    pub file_storage_path: String,
}

fn default_max_size_mb() -> u64 {
    50
}
fn default_extraction_concurrency() -> usize {
    4
}
fn default_extraction_timeout() -> u64 {
    120
}
fn default_extraction_batch_size() -> i64 {
    50
}
fn default_file_storage_path() -> String {
    "./data/files".to_string()
}

impl AppConfig {
    /// Apply `OPARL_*` / `SYNC_*` / … environment variable overrides on top of
    /// values loaded from the TOML file. Mirrors the override pattern used for
    /// the crawler's SCALE_LEVEL/network toggles, one env var per field.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("REDIS_URL") {
            self.redis.url = v;
        }
        if let Ok(v) = std::env::var("MEILISEARCH_URL") {
            self.meilisearch.url = v;
        }
        if let Ok(v) = std::env::var("MEILISEARCH_KEY") {
            self.meilisearch.key = v;
        }

        set_from_env("OPARL_REQUEST_TIMEOUT", &mut self.oparl.request_timeout_secs);
        set_from_env("OPARL_MAX_RETRIES", &mut self.oparl.max_retries);
        set_from_env("OPARL_RETRY_BACKOFF", &mut self.oparl.retry_backoff);
        set_from_env("OPARL_WAIT_TIME", &mut self.oparl.wait_time_secs);
        set_from_env("OPARL_MAX_CONCURRENT", &mut self.oparl.max_concurrent);
        set_bool_from_env("OPARL_ETAG_CACHE_ENABLED", &mut self.oparl.etag_cache_enabled);
        set_bool_from_env(
            "OPARL_MODIFIED_SINCE_ENABLED",
            &mut self.oparl.modified_since_enabled,
        );

        set_from_env("SYNC_INTERVAL_MINUTES", &mut self.sync.interval_minutes);
        set_from_env("SYNC_FULL_HOUR", &mut self.sync.full_sync_hour);
        set_from_env(
            "SYNC_INCREMENTAL_MAX_PAGES",
            &mut self.sync.incremental_max_pages,
        );
        set_bool_from_env("SYNC_ENABLED", &mut self.sync.enabled);

        set_bool_from_env("EVENTS_ENABLED", &mut self.events.enabled);
        set_from_env("EVENTS_BATCH_SIZE", &mut self.events.batch_size);

        set_bool_from_env("METRICS_ENABLED", &mut self.metrics.enabled);
        set_from_env("METRICS_PORT", &mut self.metrics.port);

        set_bool_from_env("CIRCUIT_BREAKER_ENABLED", &mut self.circuit_breaker.enabled);
        set_from_env(
            "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
            &mut self.circuit_breaker.failure_threshold,
        );
        set_from_env(
            "CIRCUIT_BREAKER_RECOVERY_TIMEOUT",
            &mut self.circuit_breaker.recovery_timeout_secs,
        );
        set_from_env(
            "CIRCUIT_BREAKER_SUCCESS_THRESHOLD",
            &mut self.circuit_breaker.success_threshold,
        );

        set_from_env("TEXT_EXTRACTION_MAX_SIZE_MB", &mut self.extraction.max_size_mb);
        set_from_env(
            "TEXT_EXTRACTION_CONCURRENCY",
            &mut self.extraction.concurrency,
        );
        set_from_env(
            "TEXT_EXTRACTION_TIMEOUT",
            &mut self.extraction.timeout_secs,
        );
        set_from_env(
            "TEXT_EXTRACTION_BATCH_SIZE",
            &mut self.extraction.batch_size,
        );
        set_bool_from_env("DOWNLOAD_FILES", &mut self.extraction.download_files);
        if let Ok(v) = std::env::var("FILE_STORAGE_PATH") {
            self.extraction.file_storage_path = v;
        }
    }
}

fn set_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.parse() {
            *slot = parsed;
        }
    }
}

fn set_bool_from_env(key: &str, slot: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        *slot = v != "0" && v.to_lowercase() != "false";
    }
}
