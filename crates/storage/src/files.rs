use anyhow::Result;
use chrono::{DateTime, Utc};
use oparl_core::types::{ExtractionMethod, ExtractionStatus, File};
use uuid::Uuid;

use crate::Storage;

/// Row shape pulled back from `oparl_files`, used both by the extraction
/// candidate query and by the SearchIndexer when building file documents.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: Uuid,
    pub external_id: String,
    pub body_id: Option<Uuid>,
    pub paper_id: Option<Uuid>,
    pub meeting_id: Option<Uuid>,
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub download_url: Option<String>,
    pub text_content: Option<String>,
    pub extraction_status: String,
    pub oparl_modified: Option<DateTime<Utc>>,
}

fn extraction_method_str(method: Option<&ExtractionMethod>) -> Option<&'static str> {
    method.map(|m| m.as_str())
}

impl Storage {
    pub async fn upsert_file(
        &self,
        file: &File,
        body_id: Option<Uuid>,
        paper_id: Option<Uuid>,
        meeting_id: Option<Uuid>,
    ) -> Result<crate::entities::UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_files
                (id, external_id, body_id, paper_id, meeting_id, paper_external_id, meeting_external_id,
                 name, file_name, mime_type, size, access_url, download_url, sha256_hash, text_content,
                 extraction_status, extraction_method, extraction_error, page_count,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                paper_id = COALESCE(EXCLUDED.paper_id, oparl_files.paper_id),
                meeting_id = COALESCE(EXCLUDED.meeting_id, oparl_files.meeting_id),
                paper_external_id = EXCLUDED.paper_external_id,
                meeting_external_id = EXCLUDED.meeting_external_id,
                name = EXCLUDED.name,
                file_name = EXCLUDED.file_name,
                mime_type = EXCLUDED.mime_type,
                size = EXCLUDED.size,
                access_url = EXCLUDED.access_url,
                download_url = EXCLUDED.download_url,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_files.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_files.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(file.header.id)
        .bind(&file.header.external_id)
        .bind(body_id)
        .bind(paper_id)
        .bind(meeting_id)
        .bind(&file.paper_external_id)
        .bind(&file.meeting_external_id)
        .bind(&file.name)
        .bind(&file.file_name)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(&file.access_url)
        .bind(&file.download_url)
        .bind(&file.sha256_hash)
        .bind(&file.text_content)
        .bind(file.extraction_status.as_str())
        .bind(extraction_method_str(file.extraction_method.as_ref()))
        .bind(&file.extraction_error)
        .bind(file.page_count)
        .bind(file.header.oparl_created)
        .bind(file.header.oparl_modified)
        .bind(&file.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(crate::entities::outcome(row))
    }

    /// Marks a candidate row `processing` right before a download starts, so
    /// a crash mid-extraction leaves a recoverable (not `pending`) row.
    pub async fn mark_file_processing(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE oparl_files SET extraction_status = 'processing', updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Writes back the outcome of one extraction attempt: status, method,
    /// text, hash, page count, and error message (cleared on success).
    #[allow(clippy::too_many_arguments)]
    pub async fn update_extraction_result(
        &self,
        id: Uuid,
        status: ExtractionStatus,
        method: Option<ExtractionMethod>,
        text_content: Option<&str>,
        sha256_hash: Option<&str>,
        page_count: Option<i32>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE oparl_files SET
                extraction_status = $2,
                extraction_method = $3,
                text_content = $4,
                sha256_hash = COALESCE($5, sha256_hash),
                page_count = $6,
                extraction_error = $7,
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(method.as_ref().map(|m| m.as_str()))
        .bind(text_content)
        .bind(sha256_hash)
        .bind(page_count)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Candidates eligible for extraction for one body: a download URL is
    /// present, the row isn't already `completed`, and it isn't larger than
    /// `max_size_mb`. Ordered oldest-first so a stalled body's backlog drains
    /// before newly discovered files crowd it out.
    pub async fn extraction_candidates(
        &self,
        body_id: Uuid,
        max_size_mb: i64,
        limit: i64,
    ) -> Result<Vec<FileRow>> {
        let rows: Vec<FileRowTuple> = sqlx::query_as(
            "SELECT id, external_id, body_id, paper_id, meeting_id, name, file_name, mime_type,
                    download_url, text_content, extraction_status, oparl_modified
             FROM oparl_files
             WHERE body_id = $1
               AND download_url IS NOT NULL
               AND extraction_status IN ('pending', 'failed')
               AND (size IS NULL OR size <= $2 * 1024 * 1024)
             ORDER BY created_at ASC
             LIMIT $3",
        )
        .bind(body_id)
        .bind(max_size_mb)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::from).collect())
    }

    pub async fn file_by_external_id(&self, external_id: &str) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM oparl_files WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn count_table(&self, table: &str) -> Result<i64> {
        let query = format!("SELECT count(*) FROM {table}");
        let row: (i64,) = sqlx::query_as(&query).fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}

type FileRowTuple = (
    Uuid,
    String,
    Option<Uuid>,
    Option<Uuid>,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<DateTime<Utc>>,
);

impl From<FileRowTuple> for FileRow {
    fn from(t: FileRowTuple) -> Self {
        FileRow {
            id: t.0,
            external_id: t.1,
            body_id: t.2,
            paper_id: t.3,
            meeting_id: t.4,
            name: t.5,
            file_name: t.6,
            mime_type: t.7,
            download_url: t.8,
            text_content: t.9,
            extraction_status: t.10,
            oparl_modified: t.11,
        }
    }
}
