//! Unparsed message queue routes (maker).

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::rbac::RequireMaker;
use crate::models::unparsed::{ClaimedMessage, PendingCount, UnparsedMessage};
use crate::services::unparsed as unparsed_service;
use crate::AppState;

/// GET /api/v1/unparsed-messages — everything not deleted, newest first.
pub async fn list(
    State(state): State<AppState>,
    RequireMaker(_actor): RequireMaker,
) -> Result<Json<ApiResponse<Vec<UnparsedMessage>>>, AppError> {
    let messages = unparsed_service::list_all(state.store.as_ref()).await?;
    Ok(ApiResponse::success(messages))
}

/// GET /api/v1/unparsed-messages/pending — messages awaiting review.
pub async fn list_pending(
    State(state): State<AppState>,
    RequireMaker(_actor): RequireMaker,
) -> Result<Json<ApiResponse<Vec<UnparsedMessage>>>, AppError> {
    let messages = unparsed_service::list_pending(state.store.as_ref()).await?;
    Ok(ApiResponse::success(messages))
}

/// GET /api/v1/unparsed-messages/pending/count
pub async fn pending_count(
    State(state): State<AppState>,
    RequireMaker(_actor): RequireMaker,
) -> Result<Json<ApiResponse<PendingCount>>, AppError> {
    let count = unparsed_service::pending_count(state.store.as_ref()).await?;
    Ok(ApiResponse::success(PendingCount { count }))
}

/// PUT /api/v1/unparsed-messages/{id}/mark-processed — claim a message and get a draft seed.
pub async fn mark_processed(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ClaimedMessage>>, AppError> {
    let claimed =
        unparsed_service::claim(state.store.as_ref(), &state.registry, id, &actor).await?;
    Ok(ApiResponse::success(claimed))
}

/// DELETE /api/v1/unparsed-messages/{id} — soft delete.
pub async fn discard(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UnparsedMessage>>, AppError> {
    let message = unparsed_service::discard(state.store.as_ref(), id, &actor).await?;
    Ok(ApiResponse::success(message))
}
