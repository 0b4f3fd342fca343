//! Create-vs-write decision for a single entity export.
//!
//! For one entity the orchestrator:
//! 1. writes to the mapped remote record when a mapping exists;
//! 2. otherwise adopts the remote id recorded by an earlier import;
//! 3. otherwise runs the duplicate check, if the exporter supplied one;
//! 4. otherwise creates the remote record and saves the mapping.

use dcsync_core::{AppConfig, EntityType, RemoteModel, SyncJobKind};
use dcsync_odoo::{Domain, ErpClient, Record, SearchOptions};

use crate::error::SyncError;
use crate::store::Store;

/// Knobs shared by every job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    /// Pricelist set on sale orders of wholesale customers.
    pub wholesale_pricelist_id: Option<i64>,
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            wholesale_pricelist_id: config.odoo_wholesale_pricelist_id,
        }
    }
}

/// Collaborators handed to exporters, importers and batch sources.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub store: &'a dyn Store,
    pub erp: Option<&'a dyn ErpClient>,
    pub settings: &'a SyncSettings,
}

impl<'a> SyncContext<'a> {
    /// The ERP client, or [`SyncError::ErpUnavailable`] for `job`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ErpUnavailable`] when no client was configured.
    pub fn erp(&self, job: SyncJobKind) -> Result<&'a dyn ErpClient, SyncError> {
        self.erp.ok_or(SyncError::ErpUnavailable { job })
    }
}

/// What happened to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    /// A new remote record was created.
    Created(i64),
    /// The mapped remote record was updated.
    Updated(i64),
    /// The remote record created by an earlier import was adopted.
    Adopted(i64),
    /// An equivalent entity's remote record was reused.
    Shared(i64),
    /// The remote order and its invoice were cancelled.
    Cancelled(i64),
    /// A remote record was imported into this local id.
    Imported(i64),
    /// The remote record matched an existing local entity.
    Merged(i64),
    /// Nothing to change.
    Unchanged(i64),
    /// `count` duplicates of `survivor` were deactivated.
    Deactivated { survivor: i64, count: usize },
    /// Not eligible for this job.
    Skipped,
}

impl EntityOutcome {
    #[must_use]
    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// The remote record the entity ended up linked to, for exports.
    #[must_use]
    pub fn remote_id(self) -> Option<i64> {
        match self {
            Self::Created(id)
            | Self::Updated(id)
            | Self::Adopted(id)
            | Self::Shared(id)
            | Self::Cancelled(id) => Some(id),
            Self::Imported(_)
            | Self::Merged(_)
            | Self::Unchanged(_)
            | Self::Deactivated { .. }
            | Self::Skipped => None,
        }
    }
}

/// Everything needed to push one local entity to Odoo.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub remote_model: RemoteModel,
    /// Values sent on both create and write.
    pub values: Record,
    /// Values sent only when creating (e.g. order lines).
    pub create_values: Record,
    /// Domain whose hits mean the record already exists remotely without a
    /// mapping. A hit raises `DuplicateOrder`.
    pub duplicate_check: Option<Domain>,
}

impl ExportPlan {
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: i64,
        remote_model: RemoteModel,
        values: Record,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            remote_model,
            values,
            create_values: Record::new(),
            duplicate_check: None,
        }
    }
}

/// Whether [`export_entity`] will write to an existing remote record for
/// this entity (mapped or adopted from an import) instead of creating one.
///
/// # Errors
///
/// Returns [`SyncError`] when a lookup fails or is ambiguous.
pub async fn has_remote_record(
    store: &dyn Store,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
) -> Result<bool, SyncError> {
    if store
        .lookup_remote_id(entity_type, entity_id, remote_model)
        .await?
        .is_some()
    {
        return Ok(true);
    }
    Ok(store
        .lookup_odoo_ids(entity_type, remote_model, entity_id)
        .await?
        .is_some())
}

/// Exports one entity according to `plan`.
///
/// # Errors
///
/// Returns [`SyncError::Sync`] with `DuplicateOrder` when the duplicate check
/// finds a record, `MigrateLookup` on ambiguous mappings, or any ERP or store
/// error. No mapping is written when the export fails.
pub async fn export_entity(
    store: &dyn Store,
    erp: &dyn ErpClient,
    plan: ExportPlan,
) -> Result<EntityOutcome, SyncError> {
    let model = plan.remote_model.as_str();

    if let Some(remote_id) = store
        .lookup_remote_id(plan.entity_type, plan.entity_id, plan.remote_model)
        .await?
    {
        erp.write(model, &[remote_id], plan.values).await?;
        store
            .save_mapping(plan.entity_type, plan.entity_id, plan.remote_model, remote_id)
            .await?;
        tracing::debug!(entity = %plan.entity_type, id = plan.entity_id, remote_id, "updated remote record");
        return Ok(EntityOutcome::Updated(remote_id));
    }

    if let Some(remote_id) = store
        .lookup_odoo_ids(plan.entity_type, plan.remote_model, plan.entity_id)
        .await?
    {
        erp.write(model, &[remote_id], plan.values).await?;
        store
            .save_mapping(plan.entity_type, plan.entity_id, plan.remote_model, remote_id)
            .await?;
        tracing::info!(entity = %plan.entity_type, id = plan.entity_id, remote_id, "adopted imported remote record");
        return Ok(EntityOutcome::Adopted(remote_id));
    }

    if let Some(domain) = &plan.duplicate_check {
        let hits = erp
            .search_with(model, domain, &SearchOptions::limit(1))
            .await?;
        if let Some(&order_id) = hits.first() {
            return Err(dcsync_core::SyncException::DuplicateOrder { order_id }.into());
        }
    }

    let mut values = plan.values;
    values.extend(plan.create_values);
    let remote_id = erp.create(model, values).await?;
    store
        .save_mapping(plan.entity_type, plan.entity_id, plan.remote_model, remote_id)
        .await?;
    tracing::info!(entity = %plan.entity_type, id = plan.entity_id, remote_id, "created remote record");
    Ok(EntityOutcome::Created(remote_id))
}

/// Records an entity-scoped failure on the entity's mapping.
///
/// # Errors
///
/// Returns [`SyncError::Db`] if the status cannot be written.
pub async fn mark_entity_error(
    store: &dyn Store,
    entity_type: EntityType,
    entity_id: i64,
    remote_model: RemoteModel,
    err: &SyncError,
) -> Result<(), SyncError> {
    let message = match err {
        SyncError::Sync(exception) => format!("{}: {exception}", exception.kind()),
        other => other.to_string(),
    };
    store
        .record_sync_error(entity_type, entity_id, remote_model, &message)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
