//! Storage seams used by the orchestrator.
//!
//! [`IdentityStore`] covers the mapping tables, [`CommerceStore`] the local
//! commerce entities. [`PgStore`] implements both over the Postgres pool.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::PgPool;

use dcsync_core::{EntityType, OrderRecord, ProfileRecord, RemoteModel, SyncStatus};
use dcsync_db::{CursorSnapshot, DbError};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn lookup_remote_id(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<Option<i64>, DbError>;

    async fn lookup_local_id(
        &self,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<Option<i64>, DbError>;

    async fn save_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<(), DbError>;

    async fn set_sync_status(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        export_type: &str,
        id_map: &BTreeMap<i64, Option<i64>>,
        status: SyncStatus,
    ) -> Result<u64, DbError>;

    async fn record_sync_error(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        message: &str,
    ) -> Result<(), DbError>;

    async fn delete_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<bool, DbError>;

    async fn lookup_odoo_ids(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        entity_id: i64,
    ) -> Result<Option<i64>, DbError>;

    async fn lookup_destination_id(
        &self,
        migration_id: &str,
        source_id: i64,
    ) -> Result<Option<i64>, DbError>;

    async fn save_id_mapping(
        &self,
        migration_id: &str,
        entity_type: EntityType,
        remote_model: RemoteModel,
        source_id: i64,
        destination_id: Option<i64>,
        source_row_status: &str,
    ) -> Result<(), DbError>;
}

/// Local id cursors walked by the batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCursor {
    OrdersPendingExport,
    ProfilesPendingExport,
    ActiveProfiles,
}

#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn get_order(&self, id: i64) -> Result<Option<OrderRecord>, DbError>;

    async fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, DbError>;

    async fn contact_email(&self, profile: &ProfileRecord) -> Result<Option<String>, DbError>;

    async fn find_equivalent_profiles(
        &self,
        candidate: &ProfileRecord,
        exclude_self: bool,
    ) -> Result<Vec<ProfileRecord>, DbError>;

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<i64, DbError>;

    async fn update_profile(&self, id: i64, profile: &ProfileRecord) -> Result<(), DbError>;

    async fn is_referenced_by_placed_order(&self, id: i64) -> Result<bool, DbError>;

    async fn referenced_profile_ids(&self, ids: &[i64]) -> Result<BTreeSet<i64>, DbError>;

    async fn deactivate_profiles(&self, ids: &[i64]) -> Result<Vec<i64>, DbError>;

    async fn snapshot(&self, cursor: LocalCursor) -> Result<CursorSnapshot, DbError>;

    async fn page(
        &self,
        cursor: LocalCursor,
        after_id: i64,
        max_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DbError>;
}

/// Everything a sync job reads or writes locally.
pub trait Store: IdentityStore + CommerceStore {}

impl<T: IdentityStore + CommerceStore> Store for T {}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn lookup_remote_id(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<Option<i64>, DbError> {
        dcsync_db::lookup_remote_id(&self.pool, entity_type, entity_id, remote_model).await
    }

    async fn lookup_local_id(
        &self,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<Option<i64>, DbError> {
        dcsync_db::lookup_local_id(&self.pool, remote_model, remote_id).await
    }

    async fn save_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        remote_id: i64,
    ) -> Result<(), DbError> {
        dcsync_db::save_mapping(&self.pool, entity_type, entity_id, remote_model, remote_id).await
    }

    async fn set_sync_status(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        export_type: &str,
        id_map: &BTreeMap<i64, Option<i64>>,
        status: SyncStatus,
    ) -> Result<u64, DbError> {
        dcsync_db::set_sync_status(
            &self.pool,
            entity_type,
            remote_model,
            export_type,
            id_map,
            status,
        )
        .await
    }

    async fn record_sync_error(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        message: &str,
    ) -> Result<(), DbError> {
        dcsync_db::record_sync_error(&self.pool, entity_type, entity_id, remote_model, message)
            .await
    }

    async fn delete_mapping(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
    ) -> Result<bool, DbError> {
        dcsync_db::delete_mapping(&self.pool, entity_type, entity_id, remote_model).await
    }

    async fn lookup_odoo_ids(
        &self,
        entity_type: EntityType,
        remote_model: RemoteModel,
        entity_id: i64,
    ) -> Result<Option<i64>, DbError> {
        dcsync_db::lookup_odoo_ids(&self.pool, entity_type, remote_model, entity_id).await
    }

    async fn lookup_destination_id(
        &self,
        migration_id: &str,
        source_id: i64,
    ) -> Result<Option<i64>, DbError> {
        dcsync_db::lookup_destination_id(&self.pool, migration_id, source_id).await
    }

    async fn save_id_mapping(
        &self,
        migration_id: &str,
        entity_type: EntityType,
        remote_model: RemoteModel,
        source_id: i64,
        destination_id: Option<i64>,
        source_row_status: &str,
    ) -> Result<(), DbError> {
        dcsync_db::save_id_mapping(
            &self.pool,
            migration_id,
            entity_type,
            remote_model,
            source_id,
            destination_id,
            source_row_status,
        )
        .await
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    async fn get_order(&self, id: i64) -> Result<Option<OrderRecord>, DbError> {
        dcsync_db::get_order(&self.pool, id).await
    }

    async fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, DbError> {
        dcsync_db::get_profile(&self.pool, id).await
    }

    async fn contact_email(&self, profile: &ProfileRecord) -> Result<Option<String>, DbError> {
        dcsync_db::contact_email(&self.pool, profile).await
    }

    async fn find_equivalent_profiles(
        &self,
        candidate: &ProfileRecord,
        exclude_self: bool,
    ) -> Result<Vec<ProfileRecord>, DbError> {
        dcsync_db::find_equivalent_profiles(&self.pool, candidate, exclude_self).await
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<i64, DbError> {
        dcsync_db::insert_profile(&self.pool, profile).await
    }

    async fn update_profile(&self, id: i64, profile: &ProfileRecord) -> Result<(), DbError> {
        dcsync_db::update_profile(&self.pool, id, profile).await
    }

    async fn is_referenced_by_placed_order(&self, id: i64) -> Result<bool, DbError> {
        dcsync_db::is_referenced_by_placed_order(&self.pool, id).await
    }

    async fn referenced_profile_ids(&self, ids: &[i64]) -> Result<BTreeSet<i64>, DbError> {
        dcsync_db::referenced_profile_ids(&self.pool, ids).await
    }

    async fn deactivate_profiles(&self, ids: &[i64]) -> Result<Vec<i64>, DbError> {
        dcsync_db::deactivate_profiles(&self.pool, ids).await
    }

    async fn snapshot(&self, cursor: LocalCursor) -> Result<CursorSnapshot, DbError> {
        match cursor {
            LocalCursor::OrdersPendingExport => dcsync_db::order_export_snapshot(&self.pool).await,
            LocalCursor::ProfilesPendingExport => {
                dcsync_db::profile_export_snapshot(&self.pool).await
            }
            LocalCursor::ActiveProfiles => dcsync_db::active_profile_snapshot(&self.pool).await,
        }
    }

    async fn page(
        &self,
        cursor: LocalCursor,
        after_id: i64,
        max_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>, DbError> {
        match cursor {
            LocalCursor::OrdersPendingExport => {
                dcsync_db::list_order_ids_pending_export(&self.pool, after_id, max_id, limit).await
            }
            LocalCursor::ProfilesPendingExport => {
                dcsync_db::list_profile_ids_pending_export(&self.pool, after_id, max_id, limit)
                    .await
            }
            LocalCursor::ActiveProfiles => {
                dcsync_db::list_active_profile_ids(&self.pool, after_id, max_id, limit).await
            }
        }
    }
}
