//! Bank address alias routes.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::middleware::rbac::{RequireMaker, RequireStaff};
use crate::models::pattern::{BankAlias, CreateBankAlias};
use crate::services::aliases;
use crate::AppState;

/// GET /api/v1/bank-addresses/aliases
pub async fn list_aliases(
    State(state): State<AppState>,
    RequireStaff(_actor): RequireStaff,
) -> Result<Json<ApiResponse<Vec<BankAlias>>>, AppError> {
    let all = aliases::list(state.store.as_ref()).await?;
    Ok(ApiResponse::success(all))
}

/// POST /api/v1/bank-addresses/aliases — register or repoint an alias (maker).
pub async fn create_alias(
    State(state): State<AppState>,
    RequireMaker(actor): RequireMaker,
    Json(body): Json<CreateBankAlias>,
) -> Result<Json<ApiResponse<BankAlias>>, AppError> {
    let alias = aliases::register(state.store.as_ref(), &state.registry, &body, &actor).await?;
    Ok(ApiResponse::success(alias))
}
