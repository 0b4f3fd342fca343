//! Retry with exponential back-off and jitter for the Odoo transport.
//!
//! Only transport failures of read-only calls are retried. An RPC fault means
//! Odoo processed the call and rejected it. A timeout or gateway error on a
//! `create`, `write` or record action says nothing about whether Odoo
//! committed it, so those calls go out exactly once.

use std::future::Future;
use std::time::Duration;

use crate::error::OdooError;

/// `execute_kw` methods that can be repeated without changing Odoo's data.
const IDEMPOTENT_METHODS: [&str; 4] = ["search", "search_count", "read", "search_read"];

/// Returns `true` when a failed `execute_kw` call of `method` may be sent again.
pub(crate) fn is_idempotent(method: &str) -> bool {
    IDEMPOTENT_METHODS.contains(&method)
}

/// Returns `true` for errors that are worth retrying after a back-off delay:
/// timeouts, refused connections and HTTP 5xx responses.
pub(crate) fn is_retriable(err: &OdooError) -> bool {
    match err {
        OdooError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        OdooError::Rpc { .. }
        | OdooError::Auth { .. }
        | OdooError::Deserialize { .. }
        | OdooError::InvalidUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors.
///
/// The delay before retry `n` is `backoff_base_ms × 2ⁿ⁻¹` with ±25 % jitter,
/// capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, OdooError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OdooError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Odoo transport error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
