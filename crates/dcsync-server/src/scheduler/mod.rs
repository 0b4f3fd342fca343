//! Background job scheduler.
//!
//! Registers one cron job per enabled entry of `config/sync_jobs.yaml`. Each
//! firing runs a single batch invocation; overlapping firings are turned away
//! by the per-job lock.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use dcsync_core::{AppConfig, SyncJobConfig, SyncJobKind, SyncJobsFile};
use dcsync_engine::{JobRunner, RunOutcome, SyncSettings};
use dcsync_odoo::{ErpClient, OdooClient};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    erp: Arc<OdooClient>,
    config: Arc<AppConfig>,
    jobs: &SyncJobsFile,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let settings = Arc::new(SyncSettings::from_app_config(&config));

    for job in jobs.enabled() {
        register_sync_job(
            &scheduler,
            pool.clone(),
            Arc::clone(&erp),
            Arc::clone(&settings),
            job,
            config.sync_default_batch_size,
        )
        .await?;
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    erp: Arc<OdooClient>,
    settings: Arc<SyncSettings>,
    job: &SyncJobConfig,
    default_batch_size: u32,
) -> Result<(), JobSchedulerError> {
    let kind = job.kind;
    let batch_size = batch_size_for(job, default_batch_size);

    let scheduled = Job::new_async(job.cron.as_str(), move |_uuid, _lock| {
        let pool = pool.clone();
        let erp = Arc::clone(&erp);
        let settings = Arc::clone(&settings);

        Box::pin(async move {
            run_scheduled(&pool, erp.as_ref(), &settings, kind, batch_size).await;
        })
    })?;

    scheduler.add(scheduled).await?;
    tracing::info!(job = %kind, cron = %job.cron, batch_size, "scheduler: registered sync job");
    Ok(())
}

fn batch_size_for(job: &SyncJobConfig, default_batch_size: u32) -> u32 {
    job.batch_size.unwrap_or(default_batch_size).max(1)
}

/// One scheduled invocation. Failures are logged; the next firing retries
/// from the saved cursor.
async fn run_scheduled(
    pool: &PgPool,
    erp: &dyn ErpClient,
    settings: &SyncSettings,
    kind: SyncJobKind,
    batch_size: u32,
) {
    let runner = JobRunner::new(pool, Some(erp), settings, "scheduler");
    match runner.run_once(kind, batch_size).await {
        Ok(RunOutcome::Locked) => {
            tracing::debug!(job = %kind, "scheduler: previous invocation still running");
        }
        Ok(RunOutcome::Completed(report)) => {
            if let Some(message) = &report.message {
                tracing::info!(job = %kind, "scheduler: {message}");
            }
        }
        Err(e) => {
            tracing::error!(job = %kind, error = %e, "scheduler: sync invocation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(batch_size: Option<u32>) -> SyncJobConfig {
        SyncJobConfig {
            kind: SyncJobKind::OrderExport,
            cron: "0 */5 * * * *".to_string(),
            batch_size,
            enabled: true,
        }
    }

    #[test]
    fn job_batch_size_overrides_the_default() {
        assert_eq!(batch_size_for(&job(Some(25)), 50), 25);
        assert_eq!(batch_size_for(&job(None), 50), 50);
        assert_eq!(batch_size_for(&job(Some(0)), 50), 1);
    }

    #[tokio::test]
    async fn configured_cron_expressions_are_accepted() {
        let file = dcsync_core::load_sync_jobs(std::path::Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../config/sync_jobs.yaml"
        )))
        .expect("sync jobs file");
        for job in file.enabled() {
            assert!(
                Job::new_async(job.cron.as_str(), |_uuid, _lock| Box::pin(async {})).is_ok(),
                "cron for {} rejected",
                job.kind
            );
        }
    }
}
