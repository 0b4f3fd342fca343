//! Re-entrant batch driver.
//!
//! Each cron invocation processes one page of at most `batch_size` ids from a
//! [`BatchSource`], strictly after the cursor and no further than the
//! `max_id` snapshotted on the first invocation of the run.

use async_trait::async_trait;

use dcsync_core::batch::completion_message;
use dcsync_core::{BatchReport, BatchState};
use dcsync_db::CursorSnapshot;

use crate::error::SyncError;
use crate::orchestrator::EntityOutcome;

/// An ascending id cursor plus the per-entity work done for each id.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Entity label used in logs and the completion message.
    fn label(&self) -> &'static str;

    /// Qualifying entity count and highest id at the start of a run.
    async fn snapshot(&self) -> Result<CursorSnapshot, SyncError>;

    /// Up to `limit` qualifying ids with `after_id < id <= max_id`, ascending.
    async fn next_page(&self, after_id: i64, max_id: i64, limit: u32)
        -> Result<Vec<i64>, SyncError>;

    /// Called with each page before it is processed.
    async fn mark_pending(&self, _ids: &[i64]) -> Result<(), SyncError> {
        Ok(())
    }

    async fn process(&self, id: i64) -> Result<EntityOutcome, SyncError>;

    /// Withdraws the pending mark of an id whose processing was skipped.
    async fn release_pending(&self, _id: i64) -> Result<(), SyncError> {
        Ok(())
    }

    /// Records an entity-scoped failure for `id`.
    async fn record_failure(&self, id: i64, err: &SyncError) -> Result<(), SyncError>;
}

/// Runs one invocation against `source`, returning the updated state.
///
/// A finished state is returned untouched. Entity-scoped failures are
/// recorded through the source and counted; any other error aborts the
/// invocation and the caller keeps its previous state.
///
/// # Errors
///
/// Returns the first error that is not entity-scoped.
pub async fn run_batch(
    source: &dyn BatchSource,
    mut state: BatchState,
    batch_size: u32,
) -> Result<(BatchState, BatchReport), SyncError> {
    let batch_size = batch_size.max(1);
    if state.finished {
        let report = BatchReport {
            finished_fraction: 1.0,
            ..BatchReport::default()
        };
        return Ok((state, report));
    }

    let label = source.label();
    if !state.initialized {
        let snapshot = source.snapshot().await?;
        state.initialize(u64::try_from(snapshot.total).unwrap_or(0), snapshot.max_id);
        tracing::info!(
            entity = label,
            total = state.total_count,
            max_id = ?state.max_id,
            "batch run started"
        );
    }

    let mut report = BatchReport::default();
    if let (false, Some(max_id)) = (state.finished, state.max_id) {
        let ids = source.next_page(state.last_id, max_id, batch_size).await?;
        source.mark_pending(&ids).await?;

        for &id in &ids {
            match source.process(id).await {
                Ok(outcome) if outcome.is_skipped() => {
                    source.release_pending(id).await?;
                    report.skipped_count += 1;
                    state.skipped += 1;
                }
                Ok(outcome) => {
                    tracing::debug!(entity = label, id, outcome = ?outcome, "entity processed");
                    report.processed_count += 1;
                }
                Err(err) if err.is_entity_scoped() => {
                    tracing::warn!(entity = label, id, error = %err, "entity sync failed");
                    source.record_failure(id, &err).await?;
                    report.failed_count += 1;
                    state.failed += 1;
                }
                Err(err) => {
                    tracing::error!(entity = label, id, error = %err, "batch invocation aborted");
                    return Err(err);
                }
            }
        }
        state.advance(&ids, batch_size);
    }

    report.finished_fraction = state.finished_fraction();
    if state.finished {
        let message = completion_message(label, &state);
        tracing::info!(entity = label, "{message}");
        report.message = Some(message);
    }
    Ok((state, report))
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
