use anyhow::Result;

use crate::Storage;

/// One row of `entity_references`: owner entity and field it came from,
/// pointing at a target by external id rather than a live pointer.
#[derive(Debug, Clone)]
pub struct EntityReference {
    pub owner_type: String,
    pub owner_external_id: String,
    pub field_name: String,
    pub target_external_id: String,
}

impl Storage {
    /// Batch-inserts references discovered while processing one entity.
    /// Duplicate (owner, field, target) tuples are silently ignored, since a
    /// re-synced entity re-extracts the same references every time.
    pub async fn store_references(&self, refs: &[EntityReference]) -> Result<()> {
        if refs.is_empty() {
            return Ok(());
        }

        let owner_types: Vec<&str> = refs.iter().map(|r| r.owner_type.as_str()).collect();
        let owner_ids: Vec<&str> = refs.iter().map(|r| r.owner_external_id.as_str()).collect();
        let field_names: Vec<&str> = refs.iter().map(|r| r.field_name.as_str()).collect();
        let target_ids: Vec<&str> = refs.iter().map(|r| r.target_external_id.as_str()).collect();

        sqlx::query(
            "INSERT INTO entity_references (owner_type, owner_external_id, field_name, target_external_id)
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[])
             ON CONFLICT (owner_external_id, field_name, target_external_id) DO NOTHING",
        )
        .bind(&owner_types)
        .bind(&owner_ids)
        .bind(&field_names)
        .bind(&target_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolves every external id an owner referenced through `field_name`.
    pub async fn references_for(
        &self,
        owner_external_id: &str,
        field_name: &str,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT target_external_id FROM entity_references
             WHERE owner_external_id = $1 AND field_name = $2",
        )
        .bind(owner_external_id)
        .bind(field_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
