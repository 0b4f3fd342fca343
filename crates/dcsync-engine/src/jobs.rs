//! Batch sources for each [`SyncJobKind`].

use std::collections::BTreeMap;

use async_trait::async_trait;

use dcsync_core::{
    BatchReport, BatchState, RemoteModel, SyncJobKind, SyncStatus, DEFAULT_EXPORT_TYPE,
};
use dcsync_db::CursorSnapshot;
use dcsync_odoo::{Domain, ErpClient, SearchOptions};

use crate::batch::{run_batch, BatchSource};
use crate::error::SyncError;
use crate::export::order::export_order;
use crate::export::partner::export_partner;
use crate::import::{import_partner, MigrationContext, PARTNER_FIELDS};
use crate::orchestrator::{mark_entity_error, EntityOutcome, SyncContext};
use crate::profiles::dedupe_profile;
use crate::store::LocalCursor;

/// Jobs that walk a local id cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalJob {
    OrderExport,
    PartnerExport,
    ProfileDedupe,
}

impl LocalJob {
    const fn kind(self) -> SyncJobKind {
        match self {
            Self::OrderExport => SyncJobKind::OrderExport,
            Self::PartnerExport => SyncJobKind::PartnerExport,
            Self::ProfileDedupe => SyncJobKind::ProfileDedupe,
        }
    }

    const fn cursor(self) -> LocalCursor {
        match self {
            Self::OrderExport => LocalCursor::OrdersPendingExport,
            Self::PartnerExport => LocalCursor::ProfilesPendingExport,
            Self::ProfileDedupe => LocalCursor::ActiveProfiles,
        }
    }
}

struct LocalSource<'a> {
    ctx: SyncContext<'a>,
    job: LocalJob,
}

#[async_trait]
impl BatchSource for LocalSource<'_> {
    fn label(&self) -> &'static str {
        self.job.kind().entity_type().as_str()
    }

    async fn snapshot(&self) -> Result<CursorSnapshot, SyncError> {
        Ok(self.ctx.store.snapshot(self.job.cursor()).await?)
    }

    async fn next_page(
        &self,
        after_id: i64,
        max_id: i64,
        limit: u32,
    ) -> Result<Vec<i64>, SyncError> {
        Ok(self
            .ctx
            .store
            .page(self.job.cursor(), after_id, max_id, i64::from(limit))
            .await?)
    }

    async fn mark_pending(&self, ids: &[i64]) -> Result<(), SyncError> {
        let Some(remote_model) = self.job.kind().remote_model() else {
            return Ok(());
        };
        let id_map: BTreeMap<i64, Option<i64>> = ids.iter().map(|id| (*id, None)).collect();
        self.ctx
            .store
            .set_sync_status(
                self.job.kind().entity_type(),
                remote_model,
                DEFAULT_EXPORT_TYPE,
                &id_map,
                SyncStatus::Pending,
            )
            .await?;
        Ok(())
    }

    async fn process(&self, id: i64) -> Result<EntityOutcome, SyncError> {
        match self.job {
            LocalJob::OrderExport => export_order(&self.ctx, id).await,
            LocalJob::PartnerExport => export_partner(&self.ctx, id).await,
            LocalJob::ProfileDedupe => dedupe_profile(self.ctx.store, id).await,
        }
    }

    /// A skipped entity never reached Odoo in this attempt: a row created by
    /// [`BatchSource::mark_pending`] is removed again, and a row that already
    /// points at a remote record goes back to `unsynced`.
    async fn release_pending(&self, id: i64) -> Result<(), SyncError> {
        let Some(remote_model) = self.job.kind().remote_model() else {
            return Ok(());
        };
        let entity_type = self.job.kind().entity_type();
        let store = self.ctx.store;
        if store
            .lookup_remote_id(entity_type, id, remote_model)
            .await?
            .is_some()
        {
            store
                .set_sync_status(
                    entity_type,
                    remote_model,
                    DEFAULT_EXPORT_TYPE,
                    &BTreeMap::from([(id, None)]),
                    SyncStatus::Unsynced,
                )
                .await?;
        } else {
            store.delete_mapping(entity_type, id, remote_model).await?;
        }
        Ok(())
    }

    async fn record_failure(&self, id: i64, err: &SyncError) -> Result<(), SyncError> {
        match self.job.kind().remote_model() {
            Some(remote_model) => {
                mark_entity_error(
                    self.ctx.store,
                    self.job.kind().entity_type(),
                    id,
                    remote_model,
                    err,
                )
                .await
            }
            None => Ok(()),
        }
    }
}

/// Walks customer partners in Odoo by ascending id.
struct PartnerImportSource<'a> {
    ctx: SyncContext<'a>,
    erp: &'a dyn ErpClient,
    migration: MigrationContext,
}

impl PartnerImportSource<'_> {
    fn customers() -> Domain {
        Domain::new().with("customer_rank", ">", 0)
    }
}

#[async_trait]
impl BatchSource for PartnerImportSource<'_> {
    fn label(&self) -> &'static str {
        RemoteModel::ResPartner.as_str()
    }

    async fn snapshot(&self) -> Result<CursorSnapshot, SyncError> {
        let model = self.migration.remote_model.as_str();
        let domain = Self::customers();
        let total = self.erp.search_count(model, &domain).await?;
        let last = self
            .erp
            .search_with(model, &domain, &SearchOptions::limit(1).ordered("id desc"))
            .await?;
        Ok(CursorSnapshot {
            total,
            max_id: last.first().copied(),
        })
    }

    async fn next_page(
        &self,
        after_id: i64,
        max_id: i64,
        limit: u32,
    ) -> Result<Vec<i64>, SyncError> {
        let domain = Self::customers()
            .with("id", ">", after_id)
            .with("id", "<=", max_id);
        Ok(self
            .erp
            .search_with(
                self.migration.remote_model.as_str(),
                &domain,
                &SearchOptions::limit(limit).ordered("id asc"),
            )
            .await?)
    }

    async fn process(&self, id: i64) -> Result<EntityOutcome, SyncError> {
        let partners = self
            .erp
            .read(self.migration.remote_model.as_str(), &[id], &PARTNER_FIELDS)
            .await?;
        let Some(partner) = partners.first() else {
            return Ok(EntityOutcome::Skipped);
        };
        import_partner(self.ctx.store, self.erp, &self.migration, id, partner).await
    }

    async fn record_failure(&self, id: i64, err: &SyncError) -> Result<(), SyncError> {
        tracing::debug!(partner_id = id, error = %err, "marking partner import as failed");
        self.ctx
            .store
            .save_id_mapping(
                &self.migration.migration_id,
                self.migration.entity_type,
                self.migration.remote_model,
                id,
                None,
                "failed",
            )
            .await?;
        Ok(())
    }
}

/// The batch source backing `kind`.
///
/// # Errors
///
/// Returns [`SyncError::ErpUnavailable`] when the job talks to Odoo and no
/// client was configured.
pub fn source_for<'a>(
    kind: SyncJobKind,
    ctx: SyncContext<'a>,
) -> Result<Box<dyn BatchSource + 'a>, SyncError> {
    if kind.needs_erp() {
        ctx.erp(kind)?;
    }
    let local = move |job: LocalJob| -> Box<dyn BatchSource + 'a> {
        Box::new(LocalSource { ctx, job })
    };
    Ok(match kind {
        SyncJobKind::OrderExport => local(LocalJob::OrderExport),
        SyncJobKind::PartnerExport => local(LocalJob::PartnerExport),
        SyncJobKind::ProfileDedupe => local(LocalJob::ProfileDedupe),
        SyncJobKind::PartnerImport => Box::new(PartnerImportSource {
            ctx,
            erp: ctx.erp(kind)?,
            migration: MigrationContext::odoo_partners(),
        }),
    })
}

/// Runs one batch invocation of `kind`.
///
/// # Errors
///
/// Returns [`SyncError`] when the invocation aborts; see [`run_batch`].
pub async fn run_invocation(
    ctx: SyncContext<'_>,
    kind: SyncJobKind,
    state: BatchState,
    batch_size: u32,
) -> Result<(BatchState, BatchReport), SyncError> {
    let source = source_for(kind, ctx)?;
    run_batch(source.as_ref(), state, batch_size).await
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
