//! Host-side wrapper around batch invocations.
//!
//! A [`JobRunner`] takes the per-job advisory lock, loads the persisted
//! cursor, runs one invocation, saves the cursor and records the invocation
//! in `sync_runs` (create → start → complete/fail).

use sqlx::PgPool;

use dcsync_core::{BatchReport, BatchState, SyncJobKind};
use dcsync_db::{
    clear_batch_state, complete_sync_run, create_sync_run, fail_sync_run, load_batch_state,
    save_batch_state, start_sync_run, try_acquire_job_lock,
};
use dcsync_odoo::ErpClient;

use crate::error::SyncError;
use crate::jobs::run_invocation;
use crate::orchestrator::{SyncContext, SyncSettings};
use crate::store::PgStore;

/// Result of asking a [`JobRunner`] to run a job.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another worker holds the job lock; nothing was done.
    Locked,
    /// Report of the last invocation that ran.
    Completed(BatchReport),
}

impl RunOutcome {
    #[must_use]
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Locked => None,
            Self::Completed(report) => Some(report),
        }
    }
}

pub struct JobRunner<'a> {
    pool: &'a PgPool,
    store: PgStore,
    erp: Option<&'a dyn ErpClient>,
    settings: &'a SyncSettings,
    trigger: &'static str,
}

impl<'a> JobRunner<'a> {
    /// `trigger` is recorded on every `sync_runs` row (`cli`, `scheduler`).
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        erp: Option<&'a dyn ErpClient>,
        settings: &'a SyncSettings,
        trigger: &'static str,
    ) -> Self {
        Self {
            pool,
            store: PgStore::new(pool.clone()),
            erp,
            settings,
            trigger,
        }
    }

    /// Runs a single invocation of `kind` under the job lock.
    ///
    /// A saved state that already finished starts a new run.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the lock, the cursor or the audit row
    /// cannot be handled, or when the invocation aborts. The saved cursor is
    /// left as it was in that case.
    pub async fn run_once(
        &self,
        kind: SyncJobKind,
        batch_size: u32,
    ) -> Result<RunOutcome, SyncError> {
        let Some(lock) = try_acquire_job_lock(self.pool, kind.as_str()).await? else {
            tracing::info!(job = %kind, "job is running elsewhere; skipping");
            return Ok(RunOutcome::Locked);
        };

        let result = self.run_locked(kind, batch_size).await;

        if let Err(err) = lock.release().await {
            tracing::warn!(job = %kind, error = %err, "failed to release job lock");
        }
        result.map(RunOutcome::Completed)
    }

    /// Runs invocations of `kind` until the run finishes, the lock is taken
    /// by someone else, or `max_invocations` calls have been made.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`JobRunner::run_once`].
    pub async fn run_until_finished(
        &self,
        kind: SyncJobKind,
        batch_size: u32,
        max_invocations: u32,
    ) -> Result<RunOutcome, SyncError> {
        let mut outcome = RunOutcome::Locked;
        for invocation in 1..=max_invocations.max(1) {
            outcome = self.run_once(kind, batch_size).await?;
            match &outcome {
                RunOutcome::Locked => break,
                RunOutcome::Completed(report) if report.is_finished() => {
                    tracing::debug!(job = %kind, invocation, "run finished");
                    break;
                }
                RunOutcome::Completed(_) => {}
            }
        }
        Ok(outcome)
    }

    /// Forgets the saved cursor of `kind` so the next invocation starts a
    /// new run.
    ///
    /// Returns `None` when the job is running elsewhere, otherwise whether a
    /// saved cursor existed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Db`] if the lock or the delete fails.
    pub async fn reset(&self, kind: SyncJobKind) -> Result<Option<bool>, SyncError> {
        let Some(lock) = try_acquire_job_lock(self.pool, kind.as_str()).await? else {
            return Ok(None);
        };
        let cleared = clear_batch_state(self.pool, kind.as_str()).await;
        if let Err(err) = lock.release().await {
            tracing::warn!(job = %kind, error = %err, "failed to release job lock");
        }
        Ok(Some(cleared?))
    }

    async fn run_locked(
        &self,
        kind: SyncJobKind,
        batch_size: u32,
    ) -> Result<BatchReport, SyncError> {
        let job_key = kind.as_str();
        let mut state = load_batch_state(self.pool, job_key).await?;
        if state.finished {
            state = BatchState::default();
        }

        let run = create_sync_run(self.pool, job_key, self.trigger).await?;
        if let Err(err) = start_sync_run(self.pool, run.id).await {
            fail_run_best_effort(self.pool, run.id, kind, &err.to_string()).await;
            return Err(err.into());
        }

        let ctx = SyncContext {
            store: &self.store,
            erp: self.erp,
            settings: self.settings,
        };
        let (state, report) = match run_invocation(ctx, kind, state, batch_size).await {
            Ok(done) => done,
            Err(err) => {
                fail_run_best_effort(self.pool, run.id, kind, &err.to_string()).await;
                return Err(err);
            }
        };

        if let Err(err) = save_batch_state(self.pool, job_key, &state).await {
            fail_run_best_effort(self.pool, run.id, kind, &err.to_string()).await;
            return Err(err.into());
        }
        complete_sync_run(
            self.pool,
            run.id,
            saturating_i32(report.processed_count),
            saturating_i32(report.failed_count),
            report.finished_fraction,
        )
        .await?;

        tracing::info!(
            job = %kind,
            run_id = run.id,
            processed = report.processed_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            finished_fraction = report.finished_fraction,
            "sync invocation complete"
        );
        Ok(report)
    }
}

async fn fail_run_best_effort(pool: &PgPool, run_id: i64, kind: SyncJobKind, message: &str) {
    if let Err(err) = fail_sync_run(pool, run_id, message).await {
        tracing::error!(
            run_id,
            job = %kind,
            error = %err,
            "failed to mark sync run as failed"
        );
    }
}

fn saturating_i32(count: u64) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
