//! `sync` command handlers: run a job from the shell and show its progress.

use clap::Subcommand;

use dcsync_core::SyncJobKind;
use dcsync_engine::{JobRunner, RunOutcome, SyncSettings};
use dcsync_odoo::{ErpClient, OdooClient, OdooSettings};

/// Sub-commands available under `sync`.
#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    /// Run a sync job (partner_export, order_export, partner_import, profile_dedupe)
    Run {
        job: SyncJobKind,
        /// Entities per invocation (defaults to DCSYNC_SYNC_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<u32>,
        /// Keep invoking until the run finishes or this many invocations ran
        #[arg(long, default_value = "1")]
        max_invocations: u32,
        /// Discard the saved cursor and start a new run
        #[arg(long)]
        reset: bool,
    },
    /// Show the saved cursor and recent runs of a job
    Status {
        job: SyncJobKind,
        /// Maximum number of runs to show
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

pub(crate) async fn run_sync(pool: &sqlx::PgPool, command: SyncCommands) -> anyhow::Result<()> {
    match command {
        SyncCommands::Run {
            job,
            batch_size,
            max_invocations,
            reset,
        } => run_sync_job(pool, job, batch_size, max_invocations, reset).await,
        SyncCommands::Status { job, limit } => run_sync_status(pool, job, limit).await,
    }
}

/// Run `job` from the CLI, recording each invocation with trigger `cli`.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the Odoo client cannot
/// be built, or an invocation aborts.
async fn run_sync_job(
    pool: &sqlx::PgPool,
    job: SyncJobKind,
    batch_size: Option<u32>,
    max_invocations: u32,
    reset: bool,
) -> anyhow::Result<()> {
    let config = dcsync_core::load_app_config_from_env()?;
    let client = if job.needs_erp() {
        Some(OdooClient::new(&OdooSettings::from_app_config(&config))?)
    } else {
        None
    };
    let erp = client.as_ref().map(|c| c as &dyn ErpClient);
    let settings = SyncSettings::from_app_config(&config);
    let runner = JobRunner::new(pool, erp, &settings, "cli");

    if reset {
        match runner.reset(job).await? {
            Some(true) => println!("{job}: saved cursor cleared"),
            Some(false) => println!("{job}: no saved cursor"),
            None => anyhow::bail!("{job} is running elsewhere; not resetting"),
        }
    }

    let batch_size = batch_size.unwrap_or(config.sync_default_batch_size);
    tracing::info!(job = %job, batch_size, max_invocations, "running sync job");
    match runner
        .run_until_finished(job, batch_size, max_invocations)
        .await?
    {
        RunOutcome::Locked => println!("{job} is running elsewhere; nothing done"),
        RunOutcome::Completed(report) => match report.message {
            Some(message) => println!("{job}: {message}"),
            None => println!(
                "{job}: {:.0}% done ({} processed, {} failed, {} skipped in the last invocation)",
                report.finished_fraction * 100.0,
                report.processed_count,
                report.failed_count,
                report.skipped_count
            ),
        },
    }
    Ok(())
}

/// Print the saved cursor of `job` and its most recent runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
async fn run_sync_status(pool: &sqlx::PgPool, job: SyncJobKind, limit: i64) -> anyhow::Result<()> {
    let state = dcsync_db::load_batch_state(pool, job.as_str()).await?;
    if state.initialized {
        println!(
            "{job}: {}/{} visited, {} failed, last id {}, {}",
            state.progress,
            state.total_count,
            state.failed,
            state.last_id,
            if state.finished { "finished" } else { "in progress" }
        );
    } else {
        println!("{job}: no run in progress");
    }

    let runs = dcsync_db::list_sync_runs(pool, Some(job.as_str()), limit).await?;
    if runs.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "{:<8}{:<11}{:<11}{:<21}{:<11}{:<8}DONE",
        "RUN", "TRIGGER", "STATUS", "STARTED", "PROCESSED", "FAILED"
    );
    for run in &runs {
        let started = run.started_at.map_or_else(
            || "\u{2014}".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        let done = run
            .finished_fraction
            .map_or_else(|| "\u{2014}".to_string(), |f| format!("{:.0}%", f * 100.0));
        println!(
            "{:<8}{:<11}{:<11}{:<21}{:<11}{:<8}{}",
            run.id,
            run.trigger_source,
            run.status,
            started,
            run.records_processed,
            run.records_failed,
            done
        );
        if let Some(error) = &run.error_message {
            println!("        error: {error}");
        }
    }
    Ok(())
}
