use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::use_cases::auth::TokenError;
use crate::AppState;

/// Caller identity taken from a verified `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("invalid authorization header".to_string()))?;

        let claims = state.auth.validate_token(token).map_err(|e| {
            tracing::debug!("Bearer token rejected: {}", e);
            match e {
                TokenError::Expired => AppError::Unauthorized("token expired".to_string()),
                TokenError::Invalid => AppError::Unauthorized("invalid token".to_string()),
            }
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
        })
    }
}
