use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use oparl_core::config::SyncConfig;
use oparl_storage::Storage;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::sync::SyncOrchestrator;

/// Point-in-time snapshot consumed by the `status` CLI verb and by the
/// scheduler's own periodic console logging.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub sync_in_progress: bool,
    pub last_sync: Option<chrono::DateTime<Utc>>,
    pub next_incremental_run: Option<chrono::DateTime<Utc>>,
    pub next_full_run: Option<chrono::DateTime<Utc>>,
}

/// Runs the incremental and full-sync jobs on their own intervals. A single
/// `is_syncing` flag prevents either job from overlapping with the other or
/// with itself — a tick that fires while one is already running is skipped
/// and logged, not queued.
pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    storage: Arc<Storage>,
    config: SyncConfig,
    is_syncing: Arc<AtomicBool>,
    last_sync: Arc<Mutex<Option<chrono::DateTime<Utc>>>>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, storage: Arc<Storage>, config: SyncConfig) -> Self {
        Self {
            orchestrator,
            storage,
            config,
            is_syncing: Arc::new(AtomicBool::new(false)),
            last_sync: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs until `shutdown` fires. Performs one incremental sync immediately
    /// on entry (not waiting for the first interval tick), then alternates
    /// between interval-triggered incremental ticks and a once-daily full
    /// sync at `full_sync_hour`.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            interval_minutes = self.config.interval_minutes,
            full_sync_hour = self.config.full_sync_hour,
            "scheduler starting"
        );

        self.tick(false).await;

        let mut incremental = tokio::time::interval(Duration::from_secs(self.config.interval_minutes * 60));
        incremental.tick().await; // consume the immediate first tick; we already ran one above
        let mut last_full_sync_date = None;

        loop {
            tokio::select! {
                _ = incremental.tick() => {
                    self.tick(false).await;

                    let now = Utc::now();
                    if now.hour() == self.config.full_sync_hour && last_full_sync_date != Some(now.date_naive()) {
                        self.tick(true).await;
                        last_full_sync_date = Some(now.date_naive());
                    }
                }
                _ = shutdown.recv() => {
                    info!("scheduler received shutdown signal, waiting for current tick to finish");
                    break;
                }
            }
        }

        while self.is_syncing.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.running.store(false, Ordering::SeqCst);
        info!("scheduler stopped");
    }

    async fn tick(&self, full: bool) {
        if self.is_syncing.swap(true, Ordering::SeqCst) {
            warn!(full, "skipping tick: a sync is already in progress");
            return;
        }

        let sources = match self.storage.list_active_sources().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to load active sources for scheduled sync");
                self.is_syncing.store(false, Ordering::SeqCst);
                return;
            }
        };

        let oparl_sources: Vec<_> = sources
            .iter()
            .map(|row| {
                let mut source = oparl_core::types::OParlSource::new(
                    row.name.clone(),
                    row.system_url.clone(),
                    row.priority,
                    row.category.clone(),
                );
                source.id = row.id;
                source.is_active = row.is_active;
                source.last_sync = row.last_sync;
                source.last_full_sync = row.last_full_sync;
                source.incremental_max_pages = row.incremental_max_pages;
                source
            })
            .collect();

        info!(count = oparl_sources.len(), full, "scheduled tick starting");

        let (_tx, rx) = broadcast::channel(1);
        let results = self.orchestrator.sync_all(&oparl_sources, full, 4, rx).await;
        let total: u64 = results.iter().map(|r| r.total_synced()).sum();
        let failures = results.iter().filter(|r| !r.success).count();

        info!(total_entities = total, failures, "scheduled tick complete");
        *self.last_sync.lock().await = Some(Utc::now());
        self.is_syncing.store(false, Ordering::SeqCst);
    }

    pub async fn status(&self) -> SchedulerStatus {
        let last_sync = *self.last_sync.lock().await;
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            sync_in_progress: self.is_syncing.load(Ordering::SeqCst),
            last_sync,
            next_incremental_run: last_sync
                .map(|t| t + chrono::Duration::minutes(self.config.interval_minutes as i64)),
            next_full_run: next_full_sync_at(self.config.full_sync_hour),
        }
    }
}

fn next_full_sync_at(hour: u32) -> Option<chrono::DateTime<Utc>> {
    let now = Utc::now();
    let today = now.date_naive().and_hms_opt(hour, 0, 0)?;
    let today = today.and_utc();
    Some(if today > now { today } else { today + chrono::Duration::days(1) })
}
