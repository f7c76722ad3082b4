use anyhow::Result;
use chrono::{DateTime, Utc};
use oparl_core::types::OParlSource;
use uuid::Uuid;

use crate::Storage;

/// Row shape returned from `oparl_sources`, used by the `list-sources` and
/// `status` CLI verbs.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub id: Uuid,
    pub name: String,
    pub system_url: String,
    pub is_active: bool,
    pub priority: i16,
    pub category: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub incremental_max_pages: Option<i32>,
}

type SourceTuple = (
    Uuid,
    String,
    String,
    bool,
    i16,
    String,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<i32>,
);

fn from_tuple(t: SourceTuple) -> SourceRow {
    SourceRow {
        id: t.0,
        name: t.1,
        system_url: t.2,
        is_active: t.3,
        priority: t.4,
        category: t.5,
        last_sync: t.6,
        last_full_sync: t.7,
        incremental_max_pages: t.8,
    }
}

const SOURCE_COLUMNS: &str =
    "id, name, system_url, is_active, priority, category, last_sync, last_full_sync, incremental_max_pages";

impl Storage {
    /// Registers a new source, or updates name/category/priority if the
    /// `system_url` is already known. Returns the row's id either way.
    pub async fn add_source(&self, source: &OParlSource) -> Result<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            "INSERT INTO oparl_sources
                (id, name, system_url, contact_name, contact_email, website, is_active, priority, category)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (system_url) DO UPDATE SET
                name = EXCLUDED.name,
                priority = EXCLUDED.priority,
                category = EXCLUDED.category,
                updated_at = now()
             RETURNING id",
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.system_url)
        .bind(&source.contact_name)
        .bind(&source.contact_email)
        .bind(&source.website)
        .bind(source.is_active)
        .bind(source.priority)
        .bind(&source.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceRow>> {
        let rows: Vec<SourceTuple> = sqlx::query_as(&format!(
            "SELECT {SOURCE_COLUMNS} FROM oparl_sources ORDER BY priority, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    pub async fn list_active_sources(&self) -> Result<Vec<SourceRow>> {
        let rows: Vec<SourceTuple> = sqlx::query_as(&format!(
            "SELECT {SOURCE_COLUMNS} FROM oparl_sources WHERE is_active ORDER BY priority, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    pub async fn get_source_by_url(&self, system_url: &str) -> Result<Option<SourceRow>> {
        let row: Option<SourceTuple> = sqlx::query_as(&format!(
            "SELECT {SOURCE_COLUMNS} FROM oparl_sources WHERE system_url = $1"
        ))
        .bind(system_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_tuple))
    }

    pub async fn mark_incremental_sync(&self, source_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE oparl_sources SET last_sync = $2, updated_at = now() WHERE id = $1")
            .bind(source_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_full_sync(&self, source_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE oparl_sources SET last_sync = $2, last_full_sync = $2, updated_at = now() WHERE id = $1",
        )
        .bind(source_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
