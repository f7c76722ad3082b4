mod server;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use tracing::info;

pub use server::serve;

/// Plain-counter snapshot kept alongside the Prometheus registry so
/// `status`/`metrics` CLI output never depends on a running exporter.
#[derive(Debug, Default, Serialize)]
pub struct SimpleMetricsSnapshot {
    pub http_requests: u64,
    pub http_errors: u64,
    pub entities_synced: std::collections::HashMap<String, u64>,
    pub sync_runs: u64,
    pub sync_errors: u64,
    pub active_syncs: i64,
}

struct SimpleMetrics {
    http_requests: AtomicU64,
    http_errors: AtomicU64,
    entities_synced: DashMap<String, AtomicU64>,
    sync_runs: AtomicU64,
    sync_errors: AtomicU64,
    active_syncs: AtomicI64,
}

impl Default for SimpleMetrics {
    fn default() -> Self {
        Self {
            http_requests: AtomicU64::new(0),
            http_errors: AtomicU64::new(0),
            entities_synced: DashMap::new(),
            sync_runs: AtomicU64::new(0),
            sync_errors: AtomicU64::new(0),
            active_syncs: AtomicI64::new(0),
        }
    }
}

pub struct MetricsCollector {
    enabled: bool,
    simple: SimpleMetrics,
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration: HistogramVec,
    http_errors_total: IntCounterVec,
    entities_synced_total: IntCounterVec,
    entities_per_sync: HistogramVec,
    sync_duration: HistogramVec,
    sync_runs_total: IntCounterVec,
    active_syncs_gauge: IntGauge,
    circuit_breaker_state: IntGaugeVec,
    circuit_breaker_failures: IntCounterVec,
    cache_hits_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("oparl_ingestor_http_requests_total", "total HTTP requests by source and status"),
            &["source", "status"],
        )
        .unwrap();
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("oparl_ingestor_http_request_duration_seconds", "HTTP request duration")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["source"],
        )
        .unwrap();
        let http_errors_total = IntCounterVec::new(
            Opts::new("oparl_ingestor_http_errors_total", "total HTTP errors by source and type"),
            &["source", "error_type"],
        )
        .unwrap();
        let entities_synced_total = IntCounterVec::new(
            Opts::new("oparl_ingestor_entities_synced_total", "entities synced by type, source, action"),
            &["entity_type", "source", "action"],
        )
        .unwrap();
        let entities_per_sync = HistogramVec::new(
            HistogramOpts::new("oparl_ingestor_entities_per_sync", "entities processed per sync run")
                .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0]),
            &["source"],
        )
        .unwrap();
        let sync_duration = HistogramVec::new(
            HistogramOpts::new("oparl_ingestor_sync_duration_seconds", "sync run duration")
                .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
            &["source", "sync_type"],
        )
        .unwrap();
        let sync_runs_total = IntCounterVec::new(
            Opts::new("oparl_ingestor_sync_runs_total", "sync runs by source, type, status"),
            &["source", "sync_type", "status"],
        )
        .unwrap();
        let active_syncs_gauge = IntGauge::new("oparl_ingestor_active_syncs", "syncs currently in progress").unwrap();
        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("oparl_ingestor_circuit_breaker_state", "0=closed 1=open 2=half-open"),
            &["source"],
        )
        .unwrap();
        let circuit_breaker_failures = IntCounterVec::new(
            Opts::new("oparl_ingestor_circuit_breaker_failures_total", "circuit breaker failures by source"),
            &["source"],
        )
        .unwrap();
        let cache_hits_total = IntCounterVec::new(
            Opts::new("oparl_ingestor_cache_hits_total", "304 cache hits by source"),
            &["source"],
        )
        .unwrap();

        if enabled {
            for c in [
                registry.register(Box::new(http_requests_total.clone())),
                registry.register(Box::new(http_errors_total.clone())),
                registry.register(Box::new(entities_synced_total.clone())),
                registry.register(Box::new(sync_runs_total.clone())),
                registry.register(Box::new(circuit_breaker_failures.clone())),
                registry.register(Box::new(cache_hits_total.clone())),
            ] {
                if let Err(e) = c {
                    tracing::warn!("failed to register metric: {e}");
                }
            }
            let _ = registry.register(Box::new(http_request_duration.clone()));
            let _ = registry.register(Box::new(entities_per_sync.clone()));
            let _ = registry.register(Box::new(sync_duration.clone()));
            let _ = registry.register(Box::new(active_syncs_gauge.clone()));
            let _ = registry.register(Box::new(circuit_breaker_state.clone()));
        }

        Self {
            enabled,
            simple: SimpleMetrics::default(),
            registry,
            http_requests_total,
            http_request_duration,
            http_errors_total,
            entities_synced_total,
            entities_per_sync,
            sync_duration,
            sync_runs_total,
            active_syncs_gauge,
            circuit_breaker_state,
            circuit_breaker_failures,
            cache_hits_total,
        }
    }

    pub fn record_http_request(&self, source: &str, status: u16, duration: Duration, from_cache: bool) {
        self.simple.http_requests.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.http_requests_total.with_label_values(&[source, &status.to_string()]).inc();
            self.http_request_duration.with_label_values(&[source]).observe(duration.as_secs_f64());
            if from_cache {
                self.cache_hits_total.with_label_values(&[source]).inc();
            }
        }
    }

    pub fn record_http_error(&self, source: &str, error_type: &str) {
        self.simple.http_errors.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.http_errors_total.with_label_values(&[source, error_type]).inc();
        }
    }

    pub fn record_entity_synced(&self, entity_type: &str, source: &str, action: &str) {
        self.simple
            .entities_synced
            .entry(entity_type.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.entities_synced_total.with_label_values(&[entity_type, source, action]).inc();
        }
    }

    pub fn record_entities_batch(&self, source: &str, count: u64) {
        if self.enabled {
            self.entities_per_sync.with_label_values(&[source]).observe(count as f64);
        }
    }

    pub fn record_circuit_breaker_state(&self, source: &str, state_code: u8) {
        if self.enabled {
            self.circuit_breaker_state.with_label_values(&[source]).set(state_code as i64);
        }
    }

    pub fn record_circuit_breaker_failure(&self, source: &str) {
        if self.enabled {
            self.circuit_breaker_failures.with_label_values(&[source]).inc();
        }
    }

    /// Scoped guard: increments the active-syncs gauge and sync_runs counter
    /// on creation, observes duration and records status on `finish`.
    pub fn track_sync(self: &Arc<Self>, source: String, sync_type: &'static str) -> SyncGuard {
        self.simple.active_syncs.fetch_add(1, Ordering::Relaxed);
        self.simple.sync_runs.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.active_syncs_gauge.inc();
        }
        SyncGuard {
            metrics: Arc::clone(self),
            source,
            sync_type,
            started: std::time::Instant::now(),
            finished: false,
        }
    }

    pub fn snapshot(&self) -> SimpleMetricsSnapshot {
        SimpleMetricsSnapshot {
            http_requests: self.simple.http_requests.load(Ordering::Relaxed),
            http_errors: self.simple.http_errors.load(Ordering::Relaxed),
            entities_synced: self
                .simple
                .entities_synced
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            sync_runs: self.simple.sync_runs.load(Ordering::Relaxed),
            sync_errors: self.simple.sync_errors.load(Ordering::Relaxed),
            active_syncs: self.simple.active_syncs.load(Ordering::Relaxed),
        }
    }

    pub fn export_text(&self) -> String {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }
}

/// RAII handle returned by `track_sync`. Callers mark success/failure via
/// `finish`; a guard dropped without calling `finish` records as an error,
/// matching the original context-manager's "exception -> error" path.
pub struct SyncGuard {
    metrics: Arc<MetricsCollector>,
    source: String,
    sync_type: &'static str,
    started: std::time::Instant,
    finished: bool,
}

impl SyncGuard {
    pub fn finish(mut self, success: bool) {
        self.finish_inner(success);
        self.finished = true;
    }

    fn finish_inner(&mut self, success: bool) {
        let elapsed = self.started.elapsed();
        self.metrics.simple.active_syncs.fetch_sub(1, Ordering::Relaxed);
        if !success {
            self.metrics.simple.sync_errors.fetch_add(1, Ordering::Relaxed);
        }
        if self.metrics.enabled {
            self.metrics.active_syncs_gauge.dec();
            self.metrics
                .sync_duration
                .with_label_values(&[&self.source, self.sync_type])
                .observe(elapsed.as_secs_f64());
            let status = if success { "success" } else { "error" };
            self.metrics.sync_runs_total.with_label_values(&[&self.source, self.sync_type, status]).inc();
        }
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.finish_inner(false);
        }
    }
}

pub fn init(enabled: bool) -> Arc<MetricsCollector> {
    info!(enabled, "metrics collector initialized");
    Arc::new(MetricsCollector::new(enabled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let m = MetricsCollector::new(true);
        m.record_http_request("host", 200, Duration::from_millis(10), false);
        m.record_http_request("host", 304, Duration::from_millis(1), true);
        m.record_http_error("host", "timeout");
        let snap = m.snapshot();
        assert_eq!(snap.http_requests, 2);
        assert_eq!(snap.http_errors, 1);
    }

    #[tokio::test]
    async fn sync_guard_records_failure_on_drop() {
        let m = Arc::new(MetricsCollector::new(true));
        {
            let _guard = m.track_sync("source".into(), "incremental");
        }
        let snap = m.snapshot();
        assert_eq!(snap.sync_errors, 1);
        assert_eq!(snap.active_syncs, 0);
    }

    #[tokio::test]
    async fn sync_guard_finish_success_does_not_count_as_error() {
        let m = Arc::new(MetricsCollector::new(true));
        let guard = m.track_sync("source".into(), "incremental");
        guard.finish(true);
        let snap = m.snapshot();
        assert_eq!(snap.sync_errors, 0);
    }
}
