//! Pattern registry routes: authoring, approval, deprecation, and previews.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::middleware::rbac::{RequireChecker, RequireMaker, RequireStaff};
use crate::models::pattern::{
    BankAddressInfo, CreatePattern, DecisionRequest, DeprecateRequest, Pattern, PatternHistory,
    TestMatchRequest, TestMatchResponse,
};
use crate::models::user::PatternAction;
use crate::services::approval;
use crate::AppState;

/// Optimistic concurrency guard for draft edits.
#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub version: Option<i32>,
}

/// POST /api/v1/patterns — create and submit for approval (maker).
pub async fn create(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Json(body): Json<CreatePattern>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::create_and_submit(
        state.store.as_ref(),
        &body,
        &actor,
        state.config.regex_size_limit,
    )
    .await?;
    Ok(ApiResponse::success(pattern))
}

/// POST /api/v1/patterns/drafts — save a draft (maker).
pub async fn create_draft(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Json(body): Json<CreatePattern>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::create_draft(state.store.as_ref(), &body, &actor).await?;
    Ok(ApiResponse::success(pattern))
}

/// PUT /api/v1/patterns/{id} — edit the caller's own draft (maker).
pub async fn update_draft(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
    Json(body): Json<CreatePattern>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::update_draft(
        state.store.as_ref(),
        &state.registry,
        id,
        &body,
        &actor,
        query.version,
    )
    .await?;
    Ok(ApiResponse::success(pattern))
}

/// POST /api/v1/patterns/{id}/submit — submit a draft for approval (maker).
pub async fn submit(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::submit_for_approval(
        state.store.as_ref(),
        id,
        &actor,
        state.config.regex_size_limit,
    )
    .await?;
    Ok(ApiResponse::success(pattern))
}

/// PUT /api/v1/patterns/{id}/status — approve or reject (checker).
pub async fn decide(
    State(state): State<AppState>,
    RequireChecker(actor): RequireChecker,
    Path(id): Path<Uuid>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::decide(
        state.store.as_ref(),
        &state.registry,
        id,
        body.status,
        &actor,
        body.note,
    )
    .await?;
    Ok(ApiResponse::success(pattern))
}

/// POST /api/v1/patterns/{id}/deprecate — retire an active pattern (checker or admin).
pub async fn deprecate(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<DeprecateRequest>>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let pattern =
        approval::deprecate(state.store.as_ref(), &state.registry, id, &actor, request).await?;
    Ok(ApiResponse::success(pattern))
}

/// GET /api/v1/patterns/pending — patterns awaiting a decision.
pub async fn list_pending(
    State(state): State<AppState>,
    RequireStaff(_actor): RequireStaff,
) -> Result<Json<ApiResponse<Vec<Pattern>>>, AppError> {
    let patterns = approval::list_pending(state.store.as_ref()).await?;
    Ok(ApiResponse::success(patterns))
}

/// GET /api/v1/patterns/active — approved patterns in candidate order.
pub async fn list_active(
    State(state): State<AppState>,
    RequireStaff(_actor): RequireStaff,
) -> Result<Json<ApiResponse<Vec<Pattern>>>, AppError> {
    let patterns = approval::list_active(state.store.as_ref()).await?;
    Ok(ApiResponse::success(patterns))
}

/// GET /api/v1/patterns/{id} — get a pattern by ID.
pub async fn get_by_id(
    State(state): State<AppState>,
    RequireStaff(_actor): RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Pattern>>, AppError> {
    let pattern = approval::get(state.store.as_ref(), id).await?;
    Ok(ApiResponse::success(pattern))
}

/// GET /api/v1/patterns/{id}/history — status audit trail.
pub async fn get_history(
    State(state): State<AppState>,
    RequireStaff(_actor): RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PatternHistory>>>, AppError> {
    let history = approval::history(state.store.as_ref(), id).await?;
    Ok(ApiResponse::success(history))
}

/// POST /api/v1/patterns/test-match — stateless regex preview.
pub async fn test_match(
    State(state): State<AppState>,
    RequireStaff(actor): RequireStaff,
    Json(body): Json<TestMatchRequest>,
) -> Result<Json<ApiResponse<TestMatchResponse>>, AppError> {
    approval::require(&actor, PatternAction::TestMatch)?;
    let result = approval::test_match(
        &body.regex_pattern,
        &body.sample_message,
        state.config.regex_size_limit,
    );
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/patterns/bank-addresses — distinct addresses with an active pattern.
pub async fn bank_addresses(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> Result<Json<ApiResponse<Vec<BankAddressInfo>>>, AppError> {
    let addresses = state.store.active_bank_addresses().await?;
    Ok(ApiResponse::success(addresses))
}
