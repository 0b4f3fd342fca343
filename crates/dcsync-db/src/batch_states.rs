//! Persisted batch cursors and the per-job run lock.

use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};

use dcsync_core::BatchState;

use crate::DbError;

/// Loads the cursor saved for `job_key`, or a fresh state if none exists.
///
/// # Errors
///
/// Returns [`DbError::BatchState`] if the stored JSON no longer matches
/// [`BatchState`], or [`DbError::Sqlx`] if the query fails.
pub async fn load_batch_state(pool: &PgPool, job_key: &str) -> Result<BatchState, DbError> {
    let stored = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT state FROM batch_states WHERE job_key = $1",
    )
    .bind(job_key)
    .fetch_optional(pool)
    .await?;

    match stored {
        Some(value) => serde_json::from_value(value).map_err(|source| DbError::BatchState {
            job_key: job_key.to_string(),
            source,
        }),
        None => Ok(BatchState::default()),
    }
}

/// Upserts the cursor for `job_key`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_batch_state(
    pool: &PgPool,
    job_key: &str,
    state: &BatchState,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO batch_states (job_key, state, updated_at) \
         VALUES ($1, $2, NOW()) \
         ON CONFLICT (job_key) DO UPDATE SET \
             state      = EXCLUDED.state, \
             updated_at = NOW()",
    )
    .bind(job_key)
    .bind(Json(state))
    .execute(pool)
    .await?;

    Ok(())
}

/// Forgets the cursor so the next invocation starts a new run.
///
/// Returns `true` if a saved state existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear_batch_state(pool: &PgPool, job_key: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM batch_states WHERE job_key = $1")
        .bind(job_key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Session-level advisory lock guarding one job key.
///
/// The lock lives on a dedicated pooled connection that is closed rather than
/// returned to the pool when dropped, so an early return or panic still
/// releases it.
#[derive(Debug)]
pub struct JobLock {
    job_key: String,
    conn: PoolConnection<Postgres>,
}

impl JobLock {
    #[must_use]
    pub fn job_key(&self) -> &str {
        &self.job_key
    }

    /// Releases the lock explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the unlock query fails; the connection is
    /// closed either way.
    pub async fn release(mut self) -> Result<(), DbError> {
        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock(hashtext($1)::bigint)")
            .bind(&self.job_key)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Tries to take the run lock for `job_key` without waiting.
///
/// Returns `None` when another process already holds it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if no connection can be acquired or the lock
/// query fails.
pub async fn try_acquire_job_lock(pool: &PgPool, job_key: &str) -> Result<Option<JobLock>, DbError> {
    let mut conn = pool.acquire().await?;

    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock(hashtext($1)::bigint)")
        .bind(job_key)
        .fetch_one(&mut *conn)
        .await?;

    if !acquired {
        return Ok(None);
    }

    conn.close_on_drop();
    Ok(Some(JobLock {
        job_key: job_key.to_string(),
        conn,
    }))
}
