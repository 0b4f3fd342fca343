use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dcsync_core::SyncJobKind;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SyncRunsQuery {
    pub job: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    sync_run_id: Uuid,
    job: String,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    records_processed: i32,
    records_failed: i32,
    finished_fraction: Option<f64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

pub(super) async fn list_sync_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SyncRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let job = match query.job.as_deref() {
        Some(raw) => Some(raw.parse::<SyncJobKind>().map_err(|e| {
            ApiError::new(req_id.0.clone(), "validation_error", e.to_string())
        })?),
        None => None,
    };

    let rows = dcsync_db::list_sync_runs(
        &state.pool,
        job.map(SyncJobKind::as_str),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SyncRunItem {
            sync_run_id: row.public_id,
            job: row.job_key,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            records_processed: row.records_processed,
            records_failed: row.records_failed,
            finished_fraction: row.finished_fraction,
            error_message: row.error_message,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::SyncRunItem;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn sync_run_item_is_serializable() {
        let item = SyncRunItem {
            sync_run_id: Uuid::new_v4(),
            job: "order_export".to_string(),
            trigger_source: "scheduler".to_string(),
            status: "failed".to_string(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            records_processed: 0,
            records_failed: 0,
            finished_fraction: None,
            error_message: Some("Odoo RPC error: access denied".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize sync run");
        assert!(json.contains("\"job\":\"order_export\""));
        assert!(json.contains("\"finished_fraction\":null"));
    }
}
