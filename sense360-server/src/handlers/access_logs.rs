//! Access log handlers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use sense360_core::api::{AccessLogQuery, AccessLogsResponse};

pub async fn list_access_logs(
    State(state): State<AppState>,
    query: Result<Query<AccessLogQuery>, QueryRejection>,
) -> Result<Json<AccessLogsResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let limit = Some(query.limit.unwrap_or(state.access_log_default_limit));

    let logs = match query.identifier.as_deref() {
        Some(identifier) => state.access_log.entries_for(identifier, limit),
        None => state.access_log.entries(limit),
    };

    Ok(Json(AccessLogsResponse {
        success: true,
        count: logs.len(),
        logs,
    }))
}
