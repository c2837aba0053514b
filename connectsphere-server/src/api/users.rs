use axum::{
    extract::{Path, State},
    Json,
};

use connectsphere_types::{Post, UpdateProfileRequest, UserProfile};

use super::{ApiError, ApiResult};
use crate::auth::AuthUser;
use crate::db::repositories::{FollowRepository, PostFilter, PostRepository, UserRepository};
use crate::state::AppState;

const MAX_BIO_LENGTH: usize = 160;

fn load_profile(state: &AppState, user_id: i64) -> ApiResult<UserProfile> {
    UserRepository::new(state.db.pool.clone())
        .get_profile(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// GET /api/users/:id - Public profile with follower and following ids
pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Json<UserProfile>> {
    Ok(Json(load_profile(&state, user_id)?))
}

/// GET /api/users/:id/posts - A user's posts, newest first
pub async fn user_posts(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Json<Vec<Post>>> {
    UserRepository::new(state.db.pool.clone())
        .get_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let posts = PostRepository::new(state.db.pool.clone()).list(&PostFilter::User(user_id))?;
    Ok(Json(posts))
}

/// POST /api/users/:id/follow
pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(target_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    if target_id == user_id {
        return Err(ApiError::BadRequest("You cannot follow yourself".to_string()));
    }
    load_profile(&state, target_id)?;

    FollowRepository::new(state.db.pool.clone()).follow(user_id, target_id)?;
    tracing::info!("User {} followed {}", user_id, target_id);

    Ok(Json(load_profile(&state, target_id)?))
}

/// DELETE /api/users/:id/follow
pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(target_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    load_profile(&state, target_id)?;

    let removed = FollowRepository::new(state.db.pool.clone()).unfollow(user_id, target_id)?;
    if removed > 0 {
        tracing::info!("User {} unfollowed {}", user_id, target_id);
    }

    Ok(Json(load_profile(&state, target_id)?))
}

/// PUT /api/users/me - Update the caller's bio and avatar URL
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let bio = payload.bio.as_deref().map(str::trim);
    if let Some(bio) = bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "Bio exceeds {} characters",
                MAX_BIO_LENGTH
            )));
        }
    }
    let avatar = payload.avatar.as_deref().map(str::trim);

    UserRepository::new(state.db.pool.clone()).update_profile(user_id, bio, avatar)?;
    tracing::info!("User {} updated profile", user_id);

    Ok(Json(load_profile(&state, user_id)?))
}
