use anyhow::{Context, Result};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub exp: i64,
    pub iat: i64,
}

/// Password hashing and bearer token issuing/validation
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>, token_ttl_hours: i64, bcrypt_cost: u32) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::hours(token_ttl_hours),
            bcrypt_cost,
        }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.bcrypt_cost).context("Failed to hash password")
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(password, hash).context("Failed to verify password")
    }

    /// Issue a signed token for a user
    pub fn issue_token(&self, user_id: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to sign token")
    }

    /// Validate a token and return the user id it was issued to
    pub fn validate_token(&self, token: &str) -> Result<i64> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;
        Ok(data.claims.sub)
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`
///
/// Handlers that take this reject anonymous requests with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

        let user_id = state.auth.validate_token(token).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(AuthUser(user_id))
    }
}
