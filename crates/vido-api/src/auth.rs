//! Bearer-token authentication.
//!
//! The identity provider issues HS256 JWTs; this extractor resolves the
//! current caller from the `Authorization` header. The webhook route is
//! signature-authenticated instead and never uses this.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Claims we care about in the identity provider's tokens.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Expiration (validated by jsonwebtoken)
    pub exp: i64,
}

/// Authenticated caller extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected Bearer token"))?;

        if state.config.auth_secret.is_empty() {
            return Err(ApiError::internal("AUTH_JWT_SECRET is not configured"));
        }

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.auth_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthorized(format!("invalid token: {}", e)))?;

        Ok(AuthUser {
            user_id: data.claims.sub,
        })
    }
}
