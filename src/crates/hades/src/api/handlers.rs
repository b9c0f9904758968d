//! Endpoint handlers
//!
//! Rollback outcomes are returned with 200 whether or not the compensation
//! succeeded; `success` in the body carries the result. Extractor rejections
//! are turned into [`ApiError`] so every failure has the same body shape.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    models::{
        validate_page, CompleteRequest, CompleteResponse, HealthResponse, OperationListQuery,
        RollbackRequest, RollbackResponse, TrackRequest, TrackResponse,
    },
    routes::AppState,
};
use crate::models::{Operation, OperationSummary};

/// POST /api/track
pub async fn track(
    State(state): State<AppState>,
    payload: Result<Json<TrackRequest>, JsonRejection>,
) -> ApiResult<Json<TrackResponse>> {
    let Json(req) = payload?;
    let operation_id = state
        .engine
        .track(&req.command, &req.operation_type, req.correlation_id)
        .await?;

    Ok(Json(TrackResponse { operation_id }))
}

/// POST /api/complete
pub async fn complete(
    State(state): State<AppState>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> ApiResult<Json<CompleteResponse>> {
    let Json(req) = payload?;
    state.engine.complete(&req.operation_id, req.success).await?;

    Ok(Json(CompleteResponse {
        status: "recorded".to_string(),
    }))
}

/// POST /api/rollback
pub async fn rollback(
    State(state): State<AppState>,
    payload: Result<Json<RollbackRequest>, JsonRejection>,
) -> ApiResult<Json<RollbackResponse>> {
    let Json(req) = payload?;
    if let Some(operation_id) = req.operation_id.filter(|id| !id.trim().is_empty()) {
        let outcome = state.engine.rollback(&operation_id).await;
        return Ok(Json(RollbackResponse::single(operation_id, outcome)));
    }

    let count = validate_page("count", req.count.unwrap_or(1))?;
    let reports = state.engine.rollback_last(count).await?;
    Ok(Json(RollbackResponse::Batch(reports)))
}

/// GET /api/operations?limit=N
pub async fn list_operations(
    State(state): State<AppState>,
    query: Result<Query<OperationListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<OperationSummary>>> {
    let Query(query) = query?;
    let limit = validate_page("limit", query.limit)?;
    Ok(Json(state.engine.list_recent(limit).await?))
}

/// GET /api/operations/:id
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Operation>> {
    state
        .engine
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Operation {} not found", id)))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.engine.health_check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("healthy", "connected"))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("unhealthy", "error")),
            )
        }
    }
}
