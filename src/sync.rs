use std::sync::Arc;
use std::time::Instant;

use oparl_client::HttpClient;
use oparl_core::config::AppConfig;
use oparl_core::types::{Entity, OParlSource, SyncResult};
use oparl_events::EventEmitter;
use oparl_extractor::{ExtractionCandidate, Extractor};
use oparl_metrics::MetricsCollector;
use oparl_processor::Processor;
use oparl_search::{build_file_document, build_meeting_document, build_organization_document,
    build_paper_document, build_person_document, SearchIndexer};
use oparl_storage::{EntityReference, Storage};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

/// Fixed fetch order for one body's entity kinds: organizations and persons
/// first (so memberships can reference them), meetings/papers next, then
/// everything that hangs off meetings and papers.
const FETCH_ORDER: [&str; 10] = [
    "organization",
    "person",
    "membership",
    "meeting",
    "paper",
    "file",
    "location",
    "agenda_item",
    "consultation",
    "legislative_term",
];

const PERSIST_BATCH_SIZE: usize = 100;

/// Drives one body's sync end to end: fetch, process, persist, extract,
/// index, and report. Shared across concurrent body syncs; internally each
/// body is synced sequentially, one entity kind after another.
pub struct SyncOrchestrator {
    http: Arc<HttpClient>,
    storage: Arc<Storage>,
    events: Arc<EventEmitter>,
    metrics: Arc<MetricsCollector>,
    extractor: Arc<Extractor>,
    search: Arc<SearchIndexer>,
    config: AppConfig,
}

impl SyncOrchestrator {
    pub fn new(
        http: Arc<HttpClient>,
        storage: Arc<Storage>,
        events: Arc<EventEmitter>,
        metrics: Arc<MetricsCollector>,
        extractor: Arc<Extractor>,
        search: Arc<SearchIndexer>,
        config: AppConfig,
    ) -> Self {
        Self { http, storage, events, metrics, extractor, search, config }
    }

    /// Syncs every source, bounded by `concurrency` bodies running at once.
    /// The HTTPClient's own semaphore still caps total HTTP parallelism.
    pub async fn sync_all(
        &self,
        sources: &[OParlSource],
        full: bool,
        concurrency: usize,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Vec<SyncResult> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            let semaphore = Arc::clone(&semaphore);
            let source = source.clone();
            let full = full;
            let mut shutdown = shutdown.resubscribe();

            handles.push(async move {
                let _permit = semaphore.acquire().await.ok()?;
                tokio::select! {
                    result = self.sync_body(&source, full) => Some(result),
                    _ = shutdown.recv() => {
                        warn!(source = %source.name, "sync cancelled before body started");
                        None
                    }
                }
            });
        }

        futures::future::join_all(handles).await.into_iter().flatten().collect()
    }

    /// Runs the full lifecycle for one body: announce start, fetch every
    /// entity kind in fixed order, persist, extract, index, announce end.
    pub async fn sync_body(&self, source: &OParlSource, full: bool) -> SyncResult {
        let started = Instant::now();
        self.events.emit_sync_started(&source.system_url, &source.name, full).await;
        let guard = self.metrics.track_sync(source.name.clone(), if full { "full" } else { "incremental" });

        let mut result = SyncResult { source_url: source.system_url.clone(), ..Default::default() };

        match self.run_body(source, full, &mut result).await {
            Ok(()) => {
                result.success = true;
                guard.finish(true);
            }
            Err(e) => {
                result.success = false;
                result.error = Some(e.to_string());
                guard.finish(false);
                self.events.emit_sync_failed(&source.system_url, &source.name, &e.to_string()).await;
                warn!(source = %source.name, error = %e, "body sync failed");
            }
        }

        result.duration_secs = started.elapsed().as_secs_f64();

        if result.success {
            let now = chrono::Utc::now();
            let mark = if full {
                self.storage.mark_full_sync(source.id, now).await
            } else {
                self.storage.mark_incremental_sync(source.id, now).await
            };
            if let Err(e) = mark {
                warn!(source = %source.name, error = %e, "failed to update source sync timestamp");
            }
            self.events
                .emit_sync_completed(
                    &source.system_url,
                    &source.name,
                    result.duration_secs,
                    result.total_synced(),
                    0,
                )
                .await;
        }

        info!(
            source = %source.name,
            total = result.total_synced(),
            duration_secs = result.duration_secs,
            success = result.success,
            "body sync finished"
        );

        result
    }

    /// Syncs a single Body URL directly, bypassing system-endpoint discovery.
    /// Used by the `sync --body` CLI flag for councils whose OParl install
    /// only advertises a Body endpoint, or when the system URL's body list
    /// is large and the caller only wants one entry from it.
    pub async fn sync_body_url(&self, body_url: &str, full: bool) -> SyncResult {
        let source = ad_hoc_source(body_url);
        let started = Instant::now();
        self.events.emit_sync_started(&source.system_url, &source.name, full).await;
        let guard = self.metrics.track_sync(source.name.clone(), if full { "full" } else { "incremental" });

        let mut result = SyncResult { source_url: source.system_url.clone(), ..Default::default() };

        match self.sync_one_body(body_url, &source, full, &mut result).await {
            Ok(()) => {
                result.success = true;
                guard.finish(true);
            }
            Err(e) => {
                result.success = false;
                result.error = Some(e.to_string());
                guard.finish(false);
                self.events.emit_sync_failed(&source.system_url, &source.name, &e.to_string()).await;
                warn!(url = body_url, error = %e, "direct body sync failed");
            }
        }

        result.duration_secs = started.elapsed().as_secs_f64();
        if result.success {
            self.events
                .emit_sync_completed(&source.system_url, &source.name, result.duration_secs, result.total_synced(), 0)
                .await;
        }
        info!(url = body_url, total = result.total_synced(), success = result.success, "direct body sync finished");
        result
    }

    async fn run_body(
        &self,
        source: &OParlSource,
        full: bool,
        result: &mut SyncResult,
    ) -> anyhow::Result<()> {
        let system = self.http.fetch_system(&source.system_url).await?;
        let body_urls = extract_body_urls(&system);

        for body_url in body_urls {
            self.sync_one_body(&body_url, source, full, result).await?;
        }

        Ok(())
    }

    async fn sync_one_body(
        &self,
        body_url: &str,
        source: &OParlSource,
        full: bool,
        result: &mut SyncResult,
    ) -> anyhow::Result<()> {
        let fetched = self.http.fetch(body_url, true, false).await?;
        let raw_body = fetched
            .data
            .ok_or_else(|| anyhow::anyhow!("body endpoint {body_url} returned 304 on first fetch"))?;
        let processor = Processor::new();
        let processed = processor.process(&raw_body);
        let Some(Entity::Body(body)) = processed.entity else {
            anyhow::bail!("body endpoint {body_url} did not return a Body entity");
        };
        let body_id = body.header.id;
        self.storage.upsert_body(&body, Some(source.id)).await?;

        let max_pages = if full { None } else { Some(source.incremental_max_pages.unwrap_or(5) as u32) };

        for kind in FETCH_ORDER {
            let Some(urls) = processed.references.get(kind) else { continue };
            for url in urls {
                let items = self.http.fetch_list_all(url, max_pages).await.unwrap_or_else(|e| {
                    warn!(kind, url, error = %e, "list fetch failed, skipping");
                    Vec::new()
                });
                self.process_and_persist(kind, items, body_id, source, full, result).await?;
            }
        }

        self.run_extraction(body_id, source).await;
        self.reindex_body(body_id).await;

        Ok(())
    }

    async fn process_and_persist(
        &self,
        kind: &str,
        items: Vec<Value>,
        body_id: Uuid,
        source: &OParlSource,
        full: bool,
        result: &mut SyncResult,
    ) -> anyhow::Result<()> {
        let processor = Processor::new();
        let slack = chrono::Duration::hours(1);
        let cutoff = if full { None } else { source.last_sync.map(|t| t - slack) };

        let mut batch_count = 0u64;
        for chunk in items.chunks(PERSIST_BATCH_SIZE) {
            for raw in chunk {
                let processed = processor.process(raw);
                let Some(entity) = processed.entity else { continue };

                if let Some(cutoff) = cutoff {
                    if let Some(modified) = entity.header().oparl_modified {
                        if modified < cutoff {
                            continue;
                        }
                    }
                }

                let is_new = self.persist_entity(&entity, body_id).await?;
                self.persist_references(&entity, &processed.references).await;
                for (nested_entity, nested_refs) in processed.nested {
                    self.persist_entity(&nested_entity, body_id).await?;
                    self.persist_references(&nested_entity, &nested_refs).await;
                }

                self.count_and_emit(kind, &entity, is_new, source, result).await;
                batch_count += 1;
            }
        }

        self.metrics.record_entities_batch(&source.name, batch_count);
        Ok(())
    }

    async fn persist_entity(&self, entity: &Entity, body_id: Uuid) -> anyhow::Result<bool> {
        use oparl_core::types::derive_uuid;

        let outcome = match entity {
            Entity::Body(_) => return Ok(false),
            Entity::Organization(e) => self.storage.upsert_organization(e, Some(body_id)).await?,
            Entity::Person(e) => self.storage.upsert_person(e, Some(body_id)).await?,
            Entity::Location(e) => self.storage.upsert_location(e, Some(body_id)).await?,
            Entity::Meeting(e) => self.storage.upsert_meeting(e, Some(body_id)).await?,
            Entity::AgendaItem(e) => {
                let meeting_id = e.meeting_external_id.as_deref().map(derive_uuid);
                self.storage.upsert_agenda_item(e, meeting_id).await?
            }
            Entity::Paper(e) => self.storage.upsert_paper(e, Some(body_id)).await?,
            Entity::Consultation(e) => {
                let paper_id = e.paper_external_id.as_deref().map(derive_uuid);
                self.storage.upsert_consultation(e, paper_id).await?
            }
            Entity::File(e) => {
                let paper_id = e.paper_external_id.as_deref().map(derive_uuid);
                let meeting_id = e.meeting_external_id.as_deref().map(derive_uuid);
                self.storage.upsert_file(e, Some(body_id), paper_id, meeting_id).await?
            }
            Entity::Membership(e) => {
                let person_id = e.person_external_id.as_deref().map(derive_uuid);
                let organization_id = e.organization_external_id.as_deref().map(derive_uuid);
                self.storage.upsert_membership(e, Some(body_id), person_id, organization_id).await?
            }
            Entity::LegislativeTerm(e) => self.storage.upsert_legislative_term(e, Some(body_id)).await?,
        };

        Ok(outcome.is_new())
    }

    /// Stores every multi-valued or polymorphic reference an entity carries
    /// (a Meeting's several Organizations, a Paper's originator fields, the
    /// files discovered while scanning a Meeting or Paper) as external-id
    /// side rows in `entity_references`, since a direct foreign-key column
    /// can't represent them. These are resolved at read time by joining
    /// against the owner's external_id (see `indexing.rs`), not eagerly
    /// during sync. Single-owner links — a nested File's owning
    /// Meeting/Paper — are resolved earlier instead, by stamping the
    /// owner's external_id directly onto the File entity during processing.
    /// Best-effort: a storage error here never fails the sync.
    async fn persist_references(&self, entity: &Entity, references: &std::collections::HashMap<String, Vec<String>>) {
        if references.is_empty() {
            return;
        }
        let owner_type = entity.kind().as_str();
        let owner_external_id = entity.external_id();
        let refs: Vec<EntityReference> = references
            .iter()
            .flat_map(|(field, targets)| {
                targets.iter().map(move |target| EntityReference {
                    owner_type: owner_type.to_string(),
                    owner_external_id: owner_external_id.to_string(),
                    field_name: field.clone(),
                    target_external_id: target.clone(),
                })
            })
            .collect();

        if let Err(e) = self.storage.store_references(&refs).await {
            warn!(owner_external_id, error = %e, "failed to persist entity references");
        }
    }

    async fn count_and_emit(
        &self,
        kind: &str,
        entity: &Entity,
        is_new: bool,
        source: &OParlSource,
        result: &mut SyncResult,
    ) {
        let action = if is_new { "created" } else { "updated" };
        self.metrics.record_entity_synced(kind, &source.name, action);

        match entity {
            Entity::Organization(_) => result.organizations_synced += 1,
            Entity::Person(_) => result.persons_synced += 1,
            Entity::Membership(_) => result.memberships_synced += 1,
            Entity::Meeting(e) => {
                result.meetings_synced += 1;
                if is_new {
                    self.events
                        .emit_priority_entity_created(
                            "meeting",
                            &e.header.id.to_string(),
                            &e.header.external_id,
                            e.name.as_deref(),
                        )
                        .await;
                    return;
                }
            }
            Entity::Paper(e) => {
                result.papers_synced += 1;
                if is_new {
                    self.events
                        .emit_priority_entity_created(
                            "paper",
                            &e.header.id.to_string(),
                            &e.header.external_id,
                            e.name.as_deref(),
                        )
                        .await;
                    return;
                }
            }
            Entity::File(_) => result.files_synced += 1,
            Entity::Location(_) => result.locations_synced += 1,
            Entity::AgendaItem(_) => result.agenda_items_synced += 1,
            Entity::Consultation(_) => result.consultations_synced += 1,
            Entity::LegislativeTerm(_) => result.legislative_terms_synced += 1,
            Entity::Body(_) => {}
        }

        if is_new {
            self.events.record_entity_created(kind, entity.external_id()).await;
        }
    }

    async fn run_extraction(&self, body_id: Uuid, source: &OParlSource) {
        if !self.config.extraction.download_files {
            return;
        }
        let candidates = match self
            .storage
            .extraction_candidates(body_id, self.config.extraction.max_size_mb as i64, self.config.extraction.batch_size)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(source = %source.name, error = %e, "failed to load extraction candidates");
                return;
            }
        };

        if candidates.is_empty() {
            return;
        }

        info!(source = %source.name, count = candidates.len(), "running extraction batch");

        let futures = candidates.into_iter().map(|row| async move {
            let Some(download_url) = row.download_url.clone() else { return };
            let _ = self.storage.mark_file_processing(row.id).await;
            let candidate = ExtractionCandidate {
                id: row.id,
                external_id: row.external_id.clone(),
                download_url,
                mime_type: row.mime_type.clone(),
                file_name: row.file_name.clone(),
            };
            let outcome = self.extractor.extract_one(candidate).await;
            if let Err(e) = self
                .storage
                .update_extraction_result(
                    outcome.id,
                    outcome.status,
                    outcome.method,
                    outcome.text_content.as_deref(),
                    outcome.sha256_hash.as_deref(),
                    outcome.page_count,
                    outcome.error.as_deref(),
                )
                .await
            {
                warn!(external_id = %row.external_id, error = %e, "failed to persist extraction result");
            }
        });

        futures::future::join_all(futures).await;
    }

    /// Best-effort: pushes updated documents for the body to the search
    /// backend. Failures are logged by the indexer itself and never
    /// propagate — indexing is never a reason to fail a sync.
    async fn reindex_body(&self, body_id: Uuid) {
        let papers = match self.storage.papers_for_indexing(body_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to load papers for indexing");
                return;
            }
        };
        let paper_docs: Vec<_> = papers
            .iter()
            .map(|(paper, file_texts, file_names)| build_paper_document(paper, body_id, file_texts, file_names.clone()))
            .collect();
        let _ = self.search.index_documents("papers", &paper_docs).await;

        if let Ok(meetings) = self.storage.meetings_for_indexing(body_id).await {
            let docs: Vec<_> = meetings
                .iter()
                .map(|(meeting, org_names)| build_meeting_document(meeting, body_id, org_names.clone()))
                .collect();
            let _ = self.search.index_documents("meetings", &docs).await;
        }

        if let Ok(orgs) = self.storage.organizations_for_indexing(body_id).await {
            let docs: Vec<_> = orgs.iter().map(|o| build_organization_document(o, body_id)).collect();
            let _ = self.search.index_documents("organizations", &docs).await;
        }

        if let Ok(persons) = self.storage.persons_for_indexing(body_id).await {
            let docs: Vec<_> = persons.iter().map(|p| build_person_document(p, body_id)).collect();
            let _ = self.search.index_documents("persons", &docs).await;
        }

        if let Ok(files) = self.storage.files_for_indexing(body_id).await {
            let docs: Vec<_> = files
                .into_iter()
                .map(|f| {
                    build_file_document(
                        f.id,
                        f.body_id,
                        f.paper_id,
                        f.meeting_id,
                        f.text_content,
                        f.name,
                        f.file_name,
                        f.mime_type,
                        None,
                        None,
                        f.oparl_modified,
                    )
                })
                .collect();
            let _ = self.search.index_documents("files", &docs).await;
        }
    }
}

/// Synthetic, unregistered source for a one-off `sync --body URL` run. Its
/// id is still derived deterministically from the URL, so entities synced
/// this way land under the same `source_id` on repeat invocations even
/// though no `oparl_sources` row backs it.
fn ad_hoc_source(body_url: &str) -> OParlSource {
    let name = url::Url::parse(body_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| body_url.to_string());
    OParlSource::new(name, body_url, 2, "adhoc")
}

/// Extracts the list of body URLs from a System object's `body` field,
/// which may be a single URL string or an array of URL strings.
fn extract_body_urls(system: &Value) -> Vec<String> {
    match system.get("body") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    }
}
