use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use connectsphere_types::{Comment, CreateCommentRequest, LikeState, UpdateCommentRequest};

use super::{ApiError, ApiResult};
use crate::auth::AuthUser;
use crate::db::repositories::{CommentRepository, LikeRepository, LikeTarget, PostRepository};
use crate::state::AppState;

fn comment_not_found() -> ApiError {
    ApiError::NotFound("Comment not found".to_string())
}

fn require_content(content: &str) -> ApiResult<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Comment content cannot be empty".to_string()));
    }
    Ok(trimmed)
}

/// POST /api/comments - Comment on a post, or reply to a top-level comment
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let content = require_content(&payload.content)?;

    PostRepository::new(state.db.pool.clone())
        .owner_of(payload.post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let repo = CommentRepository::new(state.db.pool.clone());
    if let Some(parent_id) = payload.parent_id {
        let (parent_post, grandparent) = repo
            .placement(parent_id)?
            .ok_or_else(|| ApiError::NotFound("Parent comment not found".to_string()))?;
        if parent_post != payload.post_id {
            return Err(ApiError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
        if grandparent.is_some() {
            return Err(ApiError::BadRequest(
                "Replies can only be added to top-level comments".to_string(),
            ));
        }
    }

    let comment_id = repo.create(payload.post_id, user_id, payload.parent_id, content)?;
    let comment = repo
        .get_by_id(comment_id)?
        .ok_or_else(|| ApiError::InternalError("Created comment vanished".to_string()))?;

    tracing::info!(
        "User {} commented {} on post {} (parent {:?})",
        user_id,
        comment_id,
        payload.post_id,
        payload.parent_id
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/comments/:id - Edit an owned comment
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(comment_id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let repo = CommentRepository::new(state.db.pool.clone());
    let ownership = repo.ownership(comment_id)?.ok_or_else(comment_not_found)?;
    if ownership.comment_owner != user_id {
        return Err(ApiError::Forbidden("You can only edit your own comments".to_string()));
    }

    let content = require_content(&payload.content)?;
    repo.update_content(comment_id, content)?;
    let comment = repo.get_by_id(comment_id)?.ok_or_else(comment_not_found)?;

    tracing::info!("User {} updated comment {}", user_id, comment_id);
    Ok(Json(comment))
}

/// DELETE /api/comments/:id - Delete a comment and its direct replies
///
/// Allowed for the comment's author and for the owner of the post.
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(comment_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let repo = CommentRepository::new(state.db.pool.clone());
    let ownership = repo.ownership(comment_id)?.ok_or_else(comment_not_found)?;
    if ownership.comment_owner != user_id && ownership.post_owner != user_id {
        return Err(ApiError::Forbidden(
            "You can only delete your own comments or comments on your posts".to_string(),
        ));
    }

    repo.delete(comment_id)?;
    tracing::info!("User {} deleted comment {}", user_id, comment_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/comments/:id/like - Toggle the caller's like on a comment
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(comment_id): Path<i64>,
) -> ApiResult<Json<LikeState>> {
    CommentRepository::new(state.db.pool.clone())
        .placement(comment_id)?
        .ok_or_else(comment_not_found)?;

    let like_state =
        LikeRepository::new(state.db.pool.clone()).toggle(LikeTarget::Comment, comment_id, user_id)?;
    Ok(Json(like_state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_is_trimmed() {
        assert_eq!(require_content("  nice post \n").unwrap(), "nice post");
    }

    #[test]
    fn test_blank_content_rejected() {
        assert!(matches!(require_content("   "), Err(ApiError::BadRequest(_))));
    }
}
