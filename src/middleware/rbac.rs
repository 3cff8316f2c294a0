//! Role-based access control extractors for Axum handlers.
//!
//! These reject early at the HTTP layer; the services check capabilities
//! again at the state-machine boundary.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::user::{Actor, UserRole};
use crate::AppState;

/// Extractor that requires the Maker or Admin role.
#[derive(Debug, Clone)]
pub struct RequireMaker(pub Actor);

impl FromRequestParts<AppState> for RequireMaker {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(actor) = CurrentUser::from_request_parts(parts, state).await?;
        match actor.role {
            UserRole::Maker | UserRole::Admin => Ok(RequireMaker(actor)),
            _ => Err(AppError::Forbidden(
                "Maker or admin access required".to_string(),
            )),
        }
    }
}

/// Extractor that requires the Checker role.
#[derive(Debug, Clone)]
pub struct RequireChecker(pub Actor);

impl FromRequestParts<AppState> for RequireChecker {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(actor) = CurrentUser::from_request_parts(parts, state).await?;
        if actor.role != UserRole::Checker {
            return Err(AppError::Forbidden("Checker access required".to_string()));
        }
        Ok(RequireChecker(actor))
    }
}

/// Extractor for anyone who may work on patterns: Maker, Checker or Admin.
#[derive(Debug, Clone)]
pub struct RequireStaff(pub Actor);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(actor) = CurrentUser::from_request_parts(parts, state).await?;
        if actor.role == UserRole::User {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        Ok(RequireStaff(actor))
    }
}
