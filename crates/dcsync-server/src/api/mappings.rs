use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use dcsync_core::EntityType;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct MappingItem {
    remote_model: String,
    remote_id: Option<i64>,
    export_type: String,
    sync_status: String,
    last_error: Option<String>,
    synced_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

/// Every remote mapping of one local entity.
pub(super) async fn list_entity_mappings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((entity_type, entity_id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<Vec<MappingItem>>>, ApiError> {
    let entity_type: EntityType = entity_type
        .parse()
        .map_err(|e: dcsync_core::CoreError| {
            ApiError::new(req_id.0.clone(), "validation_error", e.to_string())
        })?;

    let rows = dcsync_db::list_mappings_for_entity(&state.pool, entity_type, entity_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if rows.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("{entity_type} {entity_id} has no mappings"),
        ));
    }

    let data = rows
        .into_iter()
        .map(|row| MappingItem {
            remote_model: row.remote_model,
            remote_id: row.remote_id,
            export_type: row.export_type,
            sync_status: row.sync_status,
            last_error: row.last_error,
            synced_at: row.synced_at,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
