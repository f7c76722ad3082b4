mod entities;
mod files;
mod indexing;
mod references;
mod sources;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub use entities::UpsertOutcome;
pub use files::FileRow;
pub use references::EntityReference;
pub use sources::SourceRow;

/// Relational store for synced OParl entities. Every entity table is keyed
/// on the UUID the processor derives from `external_id`; writes are
/// idempotent upserts so a re-synced entity never produces a duplicate row,
/// and `oparl_modified` guards against an older payload clobbering a newer
/// one already on disk.
#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_pool_size(database_url, 20).await
    }

    pub async fn with_pool_size(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        info!("migrations complete");
        Ok(())
    }

    pub async fn check_connectivity(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// `Storage` itself has no behavior worth unit-testing without a live
// Postgres connection. The upsert outcome mapping (Created/Updated/Unchanged
// from `xmax`) is pure and is covered in `entities::tests`.
