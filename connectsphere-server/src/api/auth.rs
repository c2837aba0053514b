use axum::{extract::State, http::StatusCode, Json};

use connectsphere_types::{AuthResponse, LoginRequest, RegisterRequest, UserRef};

use super::{ApiError, ApiResult};
use crate::auth::AuthUser;
use crate::db::repositories::UserRepository;
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_USERNAME_LENGTH: usize = 30;

fn validate_credentials(username: &str, password: &str) -> ApiResult<()> {
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::BadRequest(
            "Username may only contain letters, numbers, '_', '-' and '.'".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// POST /api/auth/register - Create an account and log it in
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let username = payload.username.trim();
    validate_credentials(username, &payload.password)?;

    let repo = UserRepository::new(state.db.pool.clone());
    if repo.get_by_username(username)?.is_some() {
        return Err(ApiError::Conflict(format!("Username '{}' is already taken", username)));
    }

    let hash = state.auth.hash_password(&payload.password)?;
    let user_id = repo.create(username, &hash)?;
    let token = state.auth.issue_token(user_id)?;

    tracing::info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserRef {
                id: user_id,
                username: username.to_string(),
            },
            token,
        }),
    ))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = repo
        .get_by_username(payload.username.trim())?
        .ok_or_else(invalid)?;

    if !state.auth.verify_password(&payload.password, &user.password_hash)? {
        tracing::debug!("Failed login for {}", user.username);
        return Err(invalid());
    }

    let token = state.auth.issue_token(user.id)?;
    tracing::info!("User {} logged in", user.username);

    Ok(Json(AuthResponse {
        user: user.as_ref(),
        token,
    }))
}

/// GET /api/auth/me - The user the bearer token belongs to
pub async fn me(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> ApiResult<Json<UserRef>> {
    let user = UserRepository::new(state.db.pool.clone())
        .get_by_id(user_id)?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
    Ok(Json(user.as_ref()))
}
