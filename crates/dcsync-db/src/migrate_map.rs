//! The migration id map: which Odoo record each imported local entity came
//! from, keyed per migration.

use sqlx::PgPool;

use dcsync_core::{EntityType, RemoteModel, SyncException};

use crate::DbError;

/// A row from the `migrate_map` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrateMapRow {
    pub id: i64,
    pub migration_id: String,
    pub entity_type: String,
    pub remote_model: String,
    /// Odoo record id.
    pub source_id: i64,
    /// Local entity id, `NULL` for ignored or failed rows.
    pub destination_id: Option<i64>,
    pub source_row_status: String,
}

/// Records the outcome of importing one remote row.
///
/// Re-importing the same `(migration_id, source_id)` overwrites the previous
/// destination and status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_id_mapping(
    pool: &PgPool,
    migration_id: &str,
    entity_type: EntityType,
    remote_model: RemoteModel,
    source_id: i64,
    destination_id: Option<i64>,
    source_row_status: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO migrate_map \
             (migration_id, entity_type, remote_model, source_id, destination_id, source_row_status) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (migration_id, source_id) DO UPDATE SET \
             destination_id    = EXCLUDED.destination_id, \
             source_row_status = EXCLUDED.source_row_status, \
             updated_at        = NOW()",
    )
    .bind(migration_id)
    .bind(entity_type.as_str())
    .bind(remote_model.as_str())
    .bind(source_id)
    .bind(destination_id)
    .bind(source_row_status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Local entity created from `source_id` by one migration.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lookup_destination_id(
    pool: &PgPool,
    migration_id: &str,
    source_id: i64,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT destination_id FROM migrate_map \
         WHERE migration_id = $1 AND source_id = $2",
    )
    .bind(migration_id)
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    Ok(id.flatten())
}

/// Odoo record a migration imported into `destination_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lookup_source_id(
    pool: &PgPool,
    migration_id: &str,
    destination_id: i64,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT source_id FROM migrate_map \
         WHERE migration_id = $1 AND destination_id = $2 \
         ORDER BY source_id \
         LIMIT 1",
    )
    .bind(migration_id)
    .bind(destination_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Finds the single Odoo id any migration recorded for a local entity.
///
/// Used before creating a remote record: an entity that was originally
/// imported from Odoo already has one.
///
/// No match means the entity was never imported and is `Ok(None)`.
///
/// # Errors
///
/// Returns [`DbError::Lookup`] wrapping [`SyncException::MigrateLookup`]
/// when several migrations disagree, or [`DbError::Sqlx`] if the query fails.
pub async fn lookup_odoo_ids(
    pool: &PgPool,
    entity_type: EntityType,
    remote_model: RemoteModel,
    entity_id: i64,
) -> Result<Option<i64>, DbError> {
    let ids: Vec<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT source_id FROM migrate_map \
         WHERE entity_type = $1 AND remote_model = $2 AND destination_id = $3 \
         ORDER BY source_id",
    )
    .bind(entity_type.as_str())
    .bind(remote_model.as_str())
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    match ids.as_slice() {
        [] => Ok(None),
        [id] => Ok(Some(*id)),
        _ => Err(SyncException::MigrateLookup {
            entity_type,
            remote_model,
            entity_id,
            found: ids.len(),
        }
        .into()),
    }
}
