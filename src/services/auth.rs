//! Bearer token validation.
//!
//! Sessions are issued by the identity provider; this service only checks
//! HS256 signatures and reads the caller's id and role. Token issuance is
//! kept for the seed binary and integration tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{Actor, UserRole};

/// JWT claims carried by access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub role: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

fn role_label(role: UserRole) -> String {
    serde_json::to_string(&role)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}

/// Sign an access token for `actor`, valid for `expiry_secs`.
pub fn issue_access_token(actor: &Actor, jwt_secret: &str, expiry_secs: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: actor.username.clone(),
        user_id: actor.id.to_string(),
        role: role_label(actor.role),
        token_type: "access".to_string(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
}

/// Validate a JWT and return the claims.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = Validation::default();

    jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// Resolve validated claims into the acting identity.
pub fn actor_from_claims(claims: Claims) -> Result<Actor, AppError> {
    if claims.token_type != "access" {
        return Err(AppError::Unauthorized);
    }

    let id: Uuid = claims
        .user_id
        .parse()
        .map_err(|_| AppError::Unauthorized)?;

    let role: UserRole = serde_json::from_str(&format!("\"{}\"", claims.role))
        .map_err(|_| AppError::Forbidden(format!("Unknown role in token: {}", claims.role)))?;

    Ok(Actor {
        id,
        username: claims.sub,
        role,
    })
}
