//! SMS submission and ledger routes.

use axum::{extract::State, http::StatusCode, Json};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::transaction::{ParseRequest, Transaction};
use crate::services::parsing;
use crate::AppState;

/// POST /api/v1/parse — extract a transaction from an SMS (any authenticated caller).
///
/// 422 `NO_MATCH` when no active pattern extracts it; the SMS is queued first.
pub async fn parse(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<ParseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), AppError> {
    let transaction = parsing::submit_sms(
        state.store.as_ref(),
        &state.registry,
        state.classifier.as_ref(),
        &body,
        actor.id,
    )
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::success(transaction)))
}

/// GET /api/v1/transactions — the caller's own ledger.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, AppError> {
    let transactions = parsing::ledger(state.store.as_ref(), actor.id).await?;
    Ok(ApiResponse::success(transactions))
}
