use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use oparl_core::config::CircuitBreakerConfig;
use oparl_core::error::IngestError;
use tokio::sync::Mutex;
use tracing::{info, warn};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Per-host three-state failure isolator. `closed` passes every call,
/// `open` fails fast until the recovery timeout elapses, `half_open`
/// allows a bounded number of probes before flipping back either way.
pub struct CircuitBreaker {
    host: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(host: String, cfg: &CircuitBreakerConfig) -> Self {
        Self {
            host,
            failure_threshold: if cfg.enabled { cfg.failure_threshold } else { u32::MAX },
            recovery_timeout: Duration::from_secs(cfg.recovery_timeout_secs),
            success_threshold: cfg.success_threshold,
            state: AtomicU8::new(CLOSED),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        }
    }

    /// Returns an error if the breaker is open and the recovery timeout has
    /// not yet elapsed; otherwise allows the call (transitioning open ->
    /// half_open as a side effect when the timeout has elapsed).
    pub async fn check(&self) -> Result<(), IngestError> {
        if self.state.load(Ordering::SeqCst) != OPEN {
            return Ok(());
        }
        let mut opened_at = self.opened_at.lock().await;
        let Some(since) = *opened_at else {
            return Ok(());
        };
        let elapsed = since.elapsed();
        if elapsed >= self.recovery_timeout {
            self.state.store(HALF_OPEN, Ordering::SeqCst);
            self.success_count.store(0, Ordering::SeqCst);
            *opened_at = None;
            info!(host = %self.host, "circuit breaker half-open, probing");
            Ok(())
        } else {
            Err(IngestError::CircuitOpen {
                host: self.host.clone(),
                remaining_secs: (self.recovery_timeout - elapsed).as_secs(),
            })
        }
    }

    pub async fn record_success(&self) {
        match self.state.load(Ordering::SeqCst) {
            HALF_OPEN => {
                let n = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= self.success_threshold {
                    self.transition_to_closed().await;
                }
            }
            OPEN => {}
            _ => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
        }
    }

    pub async fn record_failure(&self) {
        match self.state.load(Ordering::SeqCst) {
            HALF_OPEN => self.transition_to_open().await,
            CLOSED => {
                let n = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= self.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            _ => {}
        }
    }

    async fn transition_to_open(&self) {
        self.state.store(OPEN, Ordering::SeqCst);
        *self.opened_at.lock().await = Some(Instant::now());
        self.failure_count.store(0, Ordering::SeqCst);
        warn!(host = %self.host, "circuit breaker open");
    }

    async fn transition_to_closed(&self) {
        self.state.store(CLOSED, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        info!(host = %self.host, "circuit breaker closed");
    }

    pub async fn reset(&self) {
        self.state.store(CLOSED, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        *self.opened_at.lock().await = None;
    }

    /// 0 = closed, 1 = open, 2 = half-open — matches the gauge encoding.
    pub fn state_code(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    pub fn state_name(&self) -> &'static str {
        match self.state_code() {
            CLOSED => "closed",
            OPEN => "open",
            _ => "half_open",
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }
}

/// One breaker per host, created lazily on first use.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    breakers: std::sync::Arc<DashMap<String, std::sync::Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: std::sync::Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn get(&self, host: &str) -> std::sync::Arc<CircuitBreaker> {
        self.breakers
            .entry(host.to_string())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(host.to_string(), &self.config)))
            .clone()
    }

    pub fn status(&self) -> Vec<(String, &'static str, u32)> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state_name(), e.value().failure_count()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            recovery_timeout_secs: 60,
            success_threshold: 2,
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let b = CircuitBreaker::new("host".into(), &cfg());
        for _ in 0..2 {
            b.record_failure().await;
            assert_eq!(b.state_code(), CLOSED);
        }
        b.record_failure().await;
        assert_eq!(b.state_code(), OPEN);
        assert!(b.check().await.is_err());
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let b = CircuitBreaker::new("host".into(), &cfg());
        b.transition_to_open().await;
        b.state.store(HALF_OPEN, Ordering::SeqCst);
        b.record_success().await;
        assert_eq!(b.state_code(), HALF_OPEN);
        b.record_success().await;
        assert_eq!(b.state_code(), CLOSED);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let b = CircuitBreaker::new("host".into(), &cfg());
        b.state.store(HALF_OPEN, Ordering::SeqCst);
        b.record_failure().await;
        assert_eq!(b.state_code(), OPEN);
    }

    #[tokio::test]
    async fn disabled_breaker_never_opens() {
        let mut c = cfg();
        c.enabled = false;
        let b = CircuitBreaker::new("host".into(), &c);
        for _ in 0..1000 {
            b.record_failure().await;
        }
        assert_eq!(b.state_code(), CLOSED);
    }
}
