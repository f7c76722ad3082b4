use std::sync::Mutex;

use chrono::Utc;
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::{info, warn};

const CHANNEL_SYNC: &str = "mandari:sync";
const CHANNEL_ENTITIES: &str = "mandari:entities";
const BATCH_FLUSH_SIZE: usize = 50;
const MAX_BATCH_IDS: usize = 100;

/// JSON envelope published on the `sync` and `entities` pub/sub channels.
/// Absent fields are dropped rather than serialized as `null`, matching the
/// wire shape subscribers expect.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncEvent {
    pub event_type: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities_synced: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_sync: Option<bool>,
}

impl SyncEvent {
    fn new(event_type: &'static str) -> Self {
        Self {
            event_type,
            timestamp: Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }
}

struct PendingEntity {
    entity_type: String,
    entity_external_id: String,
}

/// Publishes sync lifecycle and per-entity events to Redis pub/sub. Degrades
/// to a no-op (logged once) if Redis is unreachable at construction, and
/// swallows publish errors thereafter so emission never interrupts a sync.
pub struct EventEmitter {
    conn: Option<ConnectionManager>,
    batch: Mutex<Vec<PendingEntity>>,
}

impl EventEmitter {
    /// Connects to `redis_url`. Returns an emitter regardless of connection
    /// outcome; a failed connection just means every publish is a no-op.
    pub async fn connect(redis_url: &str, enabled: bool) -> Self {
        if !enabled {
            info!("event emitter disabled by configuration");
            return Self { conn: None, batch: Mutex::new(Vec::new()) };
        }

        match redis::Client::open(redis_url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(conn) => {
                    info!("event emitter connected to redis");
                    Self { conn: Some(conn), batch: Mutex::new(Vec::new()) }
                }
                Err(e) => {
                    warn!(error = %e, "event emitter disabled: redis connection failed");
                    Self { conn: None, batch: Mutex::new(Vec::new()) }
                }
            },
            Err(e) => {
                warn!(error = %e, "event emitter disabled: invalid redis url");
                Self { conn: None, batch: Mutex::new(Vec::new()) }
            }
        }
    }

    fn enabled(&self) -> bool {
        self.conn.is_some()
    }

    async fn publish(&self, channel: &str, event: &SyncEvent) {
        let Some(conn) = &self.conn else { return };
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to serialize event");
                return;
            }
        };
        let mut conn = conn.clone();
        if let Err(e) = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
        {
            warn!(error = %e, "failed to publish event");
        }
    }

    pub async fn emit_sync_started(&self, source_url: &str, source_name: &str, full_sync: bool) {
        if !self.enabled() {
            return;
        }
        let mut event = SyncEvent::new("sync:started");
        event.source_url = Some(source_url.to_string());
        event.source_name = Some(source_name.to_string());
        event.full_sync = Some(full_sync);
        self.publish(CHANNEL_SYNC, &event).await;
    }

    pub async fn emit_sync_completed(
        &self,
        source_url: &str,
        source_name: &str,
        duration_seconds: f64,
        entities_synced: u64,
        errors_count: u64,
    ) {
        self.flush().await;
        if !self.enabled() {
            return;
        }
        let mut event = SyncEvent::new("sync:completed");
        event.source_url = Some(source_url.to_string());
        event.source_name = Some(source_name.to_string());
        event.duration_seconds = Some(duration_seconds);
        event.entities_synced = Some(entities_synced);
        event.errors_count = Some(errors_count);
        self.publish(CHANNEL_SYNC, &event).await;
    }

    pub async fn emit_sync_failed(&self, source_url: &str, source_name: &str, error: &str) {
        self.flush().await;
        if !self.enabled() {
            return;
        }
        warn!(%error, source = source_name, "sync failed");
        let mut event = SyncEvent::new("sync:failed");
        event.source_url = Some(source_url.to_string());
        event.source_name = Some(source_name.to_string());
        self.publish(CHANNEL_SYNC, &event).await;
    }

    /// Emits an immediate, unbatched `entity:created` event for a new
    /// Meeting or Paper — these are high-priority and must not wait for the
    /// batch buffer to drain.
    pub async fn emit_priority_entity_created(
        &self,
        entity_type: &str,
        entity_id: &str,
        entity_external_id: &str,
        entity_name: Option<&str>,
    ) {
        if !self.enabled() {
            return;
        }
        let mut event = SyncEvent::new("entity:created");
        event.entity_type = Some(entity_type.to_string());
        event.entity_id = Some(entity_id.to_string());
        event.entity_external_id = Some(entity_external_id.to_string());
        event.entity_name = entity_name.map(String::from);
        self.publish(CHANNEL_ENTITIES, &event).await;
    }

    /// Buffers a non-priority entity create, flushing the batch once it
    /// reaches [`BATCH_FLUSH_SIZE`].
    pub async fn record_entity_created(&self, entity_type: &str, entity_external_id: &str) {
        if !self.enabled() {
            return;
        }
        let should_flush = {
            let mut batch = self.batch.lock().unwrap();
            batch.push(PendingEntity {
                entity_type: entity_type.to_string(),
                entity_external_id: entity_external_id.to_string(),
            });
            batch.len() >= BATCH_FLUSH_SIZE
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Flushes the batch buffer as one `entity:batch` event per entity type.
    pub async fn flush(&self) {
        let pending: Vec<PendingEntity> = {
            let mut batch = self.batch.lock().unwrap();
            std::mem::take(&mut *batch)
        };
        if pending.is_empty() || !self.enabled() {
            return;
        }

        let mut by_type: std::collections::HashMap<String, Vec<String>> =
            std::collections::HashMap::new();
        for entity in pending {
            by_type.entry(entity.entity_type).or_default().push(entity.entity_external_id);
        }

        for (entity_type, ids) in by_type {
            let mut event = SyncEvent::new("entity:batch");
            event.entity_type = Some(entity_type);
            event.entity_count = Some(ids.len());
            event.entity_ids = Some(ids.into_iter().take(MAX_BATCH_IDS).collect());
            self.publish(CHANNEL_ENTITIES, &event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_emitter_is_inert() {
        let emitter = EventEmitter::connect("redis://127.0.0.1:1/", false).await;
        emitter.emit_sync_started("https://x", "Test", false).await;
        emitter.record_entity_created("meeting", "https://x/m/1").await;
        emitter.flush().await;
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_to_noop() {
        let emitter = EventEmitter::connect("redis://127.0.0.1:1/", true).await;
        assert!(!emitter.enabled());
        emitter.emit_sync_completed("https://x", "Test", 1.0, 0, 0).await;
    }

    #[test]
    fn sync_event_serializes_without_absent_fields() {
        let event = SyncEvent::new("sync:started");
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("source_url"));
        assert!(json.contains("\"event_type\":\"sync:started\""));
    }
}
