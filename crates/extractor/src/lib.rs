mod format;
mod ocr;

use std::sync::Arc;
use std::time::Duration;

use oparl_core::config::ExtractionConfig;
use oparl_core::types::{ExtractionMethod, ExtractionStatus};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

pub use format::DetectedFormat;

const USER_AGENT: &str = "oparl-ingestor-extractor/1.0";

/// A file row eligible for extraction: download URL present, under the size
/// cap, and not already `completed`.
#[derive(Debug, Clone)]
pub struct ExtractionCandidate {
    pub id: Uuid,
    pub external_id: String,
    pub download_url: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Result of attempting to extract one file. Fields mirror the columns the
/// caller must write back to `oparl_files`.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub id: Uuid,
    pub status: ExtractionStatus,
    pub method: Option<ExtractionMethod>,
    pub text_content: Option<String>,
    pub sha256_hash: Option<String>,
    pub page_count: Option<i32>,
    pub error: Option<String>,
}

impl ExtractionOutcome {
    fn skipped(id: Uuid) -> Self {
        Self {
            id,
            status: ExtractionStatus::Skipped,
            method: None,
            text_content: None,
            sha256_hash: None,
            page_count: None,
            error: None,
        }
    }

    fn failed(id: Uuid, error: String, sha256_hash: Option<String>) -> Self {
        Self {
            id,
            status: ExtractionStatus::Failed,
            method: None,
            text_content: None,
            sha256_hash,
            page_count: None,
            error: Some(error),
        }
    }

    fn completed(
        id: Uuid,
        method: ExtractionMethod,
        text_content: String,
        sha256_hash: String,
        page_count: Option<i32>,
    ) -> Self {
        Self {
            id,
            status: ExtractionStatus::Completed,
            method: Some(method),
            text_content: Some(text_content),
            sha256_hash: Some(sha256_hash),
            page_count,
            error: None,
        }
    }
}

/// Downloads and extracts text from OParl File attachments. Concurrency is
/// bounded by a semaphore shared across a whole batch; CPU-bound extraction
/// runs on `spawn_blocking` threads so it never stalls the async reactor.
pub struct Extractor {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    config: ExtractionConfig,
}

impl Extractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("extractor http client");

        Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
        }
    }

    /// Runs the full pipeline for one candidate. Never returns an `Err` —
    /// every failure mode is represented in [`ExtractionOutcome`] so a batch
    /// of downloads can run concurrently via `join_all` without one file's
    /// error aborting its siblings.
    pub async fn extract_one(&self, candidate: ExtractionCandidate) -> ExtractionOutcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return ExtractionOutcome::failed(candidate.id, "semaphore closed".into(), None),
        };

        info!(external_id = %candidate.external_id, "extracting file");

        let bytes = match self.download(&candidate.download_url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(external_id = %candidate.external_id, error = %e, "download failed");
                return ExtractionOutcome::failed(candidate.id, e, None);
            }
        };

        let max_bytes = self.config.max_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return ExtractionOutcome::skipped(candidate.id);
        }

        if format::is_skipped_mime(candidate.mime_type.as_deref()) {
            return ExtractionOutcome::skipped(candidate.id);
        }

        let hash = sha256_hex(&bytes);

        let detected = format::detect(
            candidate.mime_type.as_deref(),
            candidate.file_name.as_deref(),
            &bytes,
        );

        let extraction = {
            let bytes = bytes.clone();
            let ocr_enabled = true;
            tokio::task::spawn_blocking(move || extract_text(detected, &bytes, ocr_enabled)).await
        };

        match extraction {
            Ok(Ok((method, text, page_count))) => {
                ExtractionOutcome::completed(candidate.id, method, text, hash, page_count)
            }
            Ok(Err(e)) => ExtractionOutcome::failed(candidate.id, e, Some(hash)),
            Err(e) => ExtractionOutcome::failed(candidate.id, e.to_string(), Some(hash)),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("http status {}", resp.status()));
        }

        resp.bytes().await.map(|b| b.to_vec()).map_err(|e| e.to_string())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Runs on a blocking thread: picks the extraction path by detected format
/// and returns `(method, text, page_count)`. `Ok` with empty text and
/// `ExtractionMethod::None` means the file was read successfully but has no
/// recoverable text (e.g. a blank scan) — that is not a failure.
fn extract_text(
    format: DetectedFormat,
    bytes: &[u8],
    ocr_enabled: bool,
) -> Result<(ExtractionMethod, String, Option<i32>), String> {
    match format {
        DetectedFormat::Pdf => extract_pdf(bytes, ocr_enabled),
        DetectedFormat::Html => {
            let text = format::decode_text(bytes);
            Ok((ExtractionMethod::Html, format::strip_html(&text), None))
        }
        DetectedFormat::Plaintext => Ok((ExtractionMethod::Plaintext, format::decode_text(bytes), None)),
        DetectedFormat::Unknown => Ok((ExtractionMethod::None, String::new(), None)),
    }
}

fn extract_pdf(bytes: &[u8], ocr_enabled: bool) -> Result<(ExtractionMethod, String, Option<i32>), String> {
    let page_count = pdf_page_count(bytes);

    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => {
            return Ok((ExtractionMethod::PdfTextLayer, text, page_count));
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "pdf text-layer extraction failed, falling back to OCR"),
    }

    if ocr_enabled {
        match ocr::ocr_pdf(bytes) {
            Ok(text) if !text.trim().is_empty() => {
                return Ok((ExtractionMethod::Ocr, text, page_count));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "OCR extraction failed"),
        }
    }

    Ok((ExtractionMethod::None, String::new(), page_count))
}

fn pdf_page_count(bytes: &[u8]) -> Option<i32> {
    lopdf::Document::load_mem(bytes)
        .ok()
        .map(|doc| doc.get_pages().len() as i32)
}
