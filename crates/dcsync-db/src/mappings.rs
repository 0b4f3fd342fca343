//! Database operations for `entity_mappings`, the identity store linking
//! local commerce entities to Odoo records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use dcsync_core::{EntityType, RemoteModel, SyncException, SyncStatus, DEFAULT_EXPORT_TYPE};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `entity_mappings` table.
///
/// `remote_id` is `NULL` while an entity is `unsynced`/`pending`/`error` and
/// has never been created remotely.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityMappingRow {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub remote_model: String,
    pub remote_id: Option<i64>,
    pub export_type: String,
    pub sync_status: String,
    pub last_error: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMappingRow {
    /// Parsed `sync_status` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the stored value is not a known status.
    pub fn status(&self) -> Result<SyncStatus, DbError> {
        self.sync_status.parse().map_err(|source| DbError::Decode {
            table: "entity_mappings",
            column: "sync_status",
            source,
        })
    }
}

const MAPPING_COLUMNS: &str = "id, entity_type, entity_id, remote_model, remote_id, export_type, \
                               sync_status, last_error, synced_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Returns the remote id mapped to a local entity, if it was ever synced.
///
/// # Errors
///
/// Returns [`DbError::Lookup`] wrapping [`SyncException::MigrateLookup`] if
/// more than one mapping exists for the triple, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn lookup_remote_id(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
) -> Result<Option<i64>, DbError> {
    let ids: Vec<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT remote_id FROM entity_mappings \
         WHERE entity_type = $1 AND entity_id = $2 AND remote_model = $3 \
           AND remote_id IS NOT NULL",
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(remote_model.as_str())
    .fetch_all(pool)
    .await?;

    single(ids, entity_type, remote_model, entity_id)
}

/// Returns the local entity id mapped to a remote record, if any.
///
/// # Errors
///
/// Returns [`DbError::Lookup`] if several local entities claim the same
/// remote record, or [`DbError::Sqlx`] if the query fails.
pub async fn lookup_local_id(
    pool: &PgPool,
    remote_model: RemoteModel,
    remote_id: i64,
) -> Result<Option<i64>, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as::<_, (String, i64)>(
        "SELECT entity_type, entity_id FROM entity_mappings \
         WHERE remote_model = $1 AND remote_id = $2 \
         ORDER BY entity_id",
    )
    .bind(remote_model.as_str())
    .bind(remote_id)
    .fetch_all(pool)
    .await?;

    match rows.as_slice() {
        [] => Ok(None),
        [(_, entity_id)] => Ok(Some(*entity_id)),
        [(entity_type, _), ..] => {
            let entity_type = entity_type.parse().map_err(|source| DbError::Decode {
                table: "entity_mappings",
                column: "entity_type",
                source,
            })?;
            Err(SyncException::MigrateLookup {
                entity_type,
                remote_model,
                entity_id: remote_id,
                found: rows.len(),
            }
            .into())
        }
    }
}

/// Fetches the full mapping row for a triple.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_mapping(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
) -> Result<Option<EntityMappingRow>, DbError> {
    let row = sqlx::query_as::<_, EntityMappingRow>(&format!(
        "SELECT {MAPPING_COLUMNS} FROM entity_mappings \
         WHERE entity_type = $1 AND entity_id = $2 AND remote_model = $3"
    ))
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(remote_model.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every mapping recorded for one local entity, across remote models.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_mappings_for_entity(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
) -> Result<Vec<EntityMappingRow>, DbError> {
    let rows = sqlx::query_as::<_, EntityMappingRow>(&format!(
        "SELECT {MAPPING_COLUMNS} FROM entity_mappings \
         WHERE entity_type = $1 AND entity_id = $2 \
         ORDER BY remote_model"
    ))
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Records that a local entity is synced with a remote record.
///
/// Upserts on `(entity_type, entity_id, remote_model)`: a second call for the
/// same triple overwrites `remote_id` (last write wins) and never creates a
/// second row. The status becomes `synced` and any previous error is cleared.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_mapping(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
    remote_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_mappings \
             (entity_type, entity_id, remote_model, remote_id, export_type, sync_status, synced_at) \
         VALUES ($1, $2, $3, $4, $5, 'synced', NOW()) \
         ON CONFLICT (entity_type, entity_id, remote_model) DO UPDATE SET \
             remote_id   = EXCLUDED.remote_id, \
             sync_status = 'synced', \
             last_error  = NULL, \
             synced_at   = NOW(), \
             updated_at  = NOW()",
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(remote_model.as_str())
    .bind(remote_id)
    .bind(DEFAULT_EXPORT_TYPE)
    .execute(pool)
    .await?;

    Ok(())
}

/// Sets `status` for many entities sharing an export type in one round-trip.
///
/// `id_map` maps local entity id → remote id when known. A `None` remote id
/// keeps whatever id is already stored. Moving to `synced` stamps
/// `synced_at`; moving away from `error` clears `last_error`.
///
/// Returns the number of mapping rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_sync_status(
    pool: &PgPool,
    entity_type: EntityType,
    remote_model: RemoteModel,
    export_type: &str,
    id_map: &BTreeMap<i64, Option<i64>>,
    status: SyncStatus,
) -> Result<u64, DbError> {
    if id_map.is_empty() {
        return Ok(0);
    }

    let entity_ids: Vec<i64> = id_map.keys().copied().collect();
    let remote_ids: Vec<Option<i64>> = id_map.values().copied().collect();

    let rows_affected = sqlx::query(
        "INSERT INTO entity_mappings \
             (entity_type, entity_id, remote_model, remote_id, export_type, sync_status, synced_at) \
         SELECT $1, ids.entity_id, $2, ids.remote_id, $3, $4, \
                CASE WHEN $4 = 'synced' THEN NOW() END \
         FROM UNNEST($5::bigint[], $6::bigint[]) AS ids(entity_id, remote_id) \
         ON CONFLICT (entity_type, entity_id, remote_model) DO UPDATE SET \
             remote_id   = COALESCE(EXCLUDED.remote_id, entity_mappings.remote_id), \
             export_type = EXCLUDED.export_type, \
             sync_status = EXCLUDED.sync_status, \
             last_error  = CASE WHEN EXCLUDED.sync_status = 'error' \
                                THEN entity_mappings.last_error END, \
             synced_at   = COALESCE(EXCLUDED.synced_at, entity_mappings.synced_at), \
             updated_at  = NOW()",
    )
    .bind(entity_type.as_str())
    .bind(remote_model.as_str())
    .bind(export_type)
    .bind(status.as_str())
    .bind(&entity_ids)
    .bind(&remote_ids)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

/// Marks one entity as `error` and stores the failure message.
///
/// An existing `remote_id` is kept so the next attempt writes instead of
/// creating a second remote record.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_sync_error(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
    message: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO entity_mappings \
             (entity_type, entity_id, remote_model, export_type, sync_status, last_error) \
         VALUES ($1, $2, $3, $4, 'error', $5) \
         ON CONFLICT (entity_type, entity_id, remote_model) DO UPDATE SET \
             sync_status = 'error', \
             last_error  = EXCLUDED.last_error, \
             updated_at  = NOW()",
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(remote_model.as_str())
    .bind(DEFAULT_EXPORT_TYPE)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Removes the mapping of one entity. Returns whether a row existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_mapping(
    pool: &PgPool,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "DELETE FROM entity_mappings \
         WHERE entity_type = $1 AND entity_id = $2 AND remote_model = $3",
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(remote_model.as_str())
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

fn single(
    ids: Vec<i64>,
    entity_type: EntityType,
    remote_model: RemoteModel,
    entity_id: i64,
) -> Result<Option<i64>, DbError> {
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
