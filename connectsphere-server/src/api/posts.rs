use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::collections::HashSet;

use connectsphere_types::{LikeState, Post, MAX_POST_IMAGES};

use super::{ApiError, ApiResult};
use crate::auth::AuthUser;
use crate::db::repositories::{LikeRepository, LikeTarget, PostFilter, PostRepository};
use crate::hashtag::normalize_tag;
use crate::state::AppState;
use crate::uploads::UploadStore;

/// One uploaded file from a multipart form
struct ImageUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

/// Fields of the create/update post forms
#[derive(Default)]
struct PostForm {
    content: Option<String>,
    /// URLs the client still shows, in order
    existing_images: Option<Vec<String>>,
    /// Indices into `existing_images` the client dropped
    removed_images: Vec<usize>,
    images: Vec<ImageUpload>,
}

async fn read_post_form(mut multipart: Multipart) -> ApiResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "content" => form.content = Some(field.text().await?),
            "existingImages" => {
                let raw = field.text().await?;
                let urls = serde_json::from_str(&raw).map_err(|_| {
                    ApiError::BadRequest("existingImages must be a JSON array of URLs".to_string())
                })?;
                form.existing_images = Some(urls);
            }
            "removedImages" => {
                let raw = field.text().await?;
                form.removed_images = serde_json::from_str(&raw).map_err(|_| {
                    ApiError::BadRequest("removedImages must be a JSON array of indices".to_string())
                })?;
            }
            "images" | "images[]" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

/// Only emptiness is checked here; the 280-character limit is client policy
fn validate_content(content: &str) -> ApiResult<()> {
    if content.is_empty() {
        return Err(ApiError::BadRequest("Post content cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_uploads(images: &[ImageUpload]) -> ApiResult<()> {
    for image in images {
        if !UploadStore::is_image(image.file_name.as_deref(), image.content_type.as_deref()) {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not an image",
                image.file_name.as_deref().unwrap_or("upload")
            )));
        }
    }
    Ok(())
}

async fn store_uploads(state: &AppState, images: &[ImageUpload]) -> ApiResult<Vec<String>> {
    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        urls.push(state.uploads.save(image.file_name.as_deref(), &image.bytes).await?);
    }
    Ok(urls)
}

/// Load a post and check that `user_id` owns it
fn owned_post(repo: &PostRepository, post_id: i64, user_id: i64, action: &str) -> ApiResult<()> {
    let owner = repo
        .owner_of(post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    if owner != user_id {
        return Err(ApiError::Forbidden(format!("You can only {} your own posts", action)));
    }
    Ok(())
}

/// GET /api/posts - All posts, newest first
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    let posts = PostRepository::new(state.db.pool.clone()).list(&PostFilter::All)?;
    Ok(Json(posts))
}

/// GET /api/posts/:id
pub async fn get_post(State(state): State<AppState>, Path(post_id): Path<i64>) -> ApiResult<Json<Post>> {
    let post = PostRepository::new(state.db.pool.clone())
        .get_by_id(post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}

/// GET /api/posts/hashtag/:tag - Posts whose content contains `#tag`
pub async fn list_by_hashtag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Json<Vec<Post>>> {
    let tag = normalize_tag(&tag).ok_or_else(|| ApiError::BadRequest(format!("Invalid hashtag '{}'", tag)))?;
    let posts = PostRepository::new(state.db.pool.clone()).list(&PostFilter::Hashtag(tag))?;
    Ok(Json(posts))
}

/// POST /api/posts - Create a post from a multipart form
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let form = read_post_form(multipart).await?;
    let content = form.content.as_deref().unwrap_or_default().trim().to_string();
    validate_content(&content)?;

    if form.images.len() > MAX_POST_IMAGES {
        return Err(ApiError::BadRequest(format!(
            "A post can have at most {} images",
            MAX_POST_IMAGES
        )));
    }
    validate_uploads(&form.images)?;

    let urls = store_uploads(&state, &form.images).await?;
    let repo = PostRepository::new(state.db.pool.clone());
    let post_id = repo.create(user_id, &content, &urls)?;
    let post = repo
        .get_by_id(post_id)?
        .ok_or_else(|| ApiError::InternalError("Created post vanished".to_string()))?;

    tracing::info!("User {} created post {} with {} images", user_id, post_id, urls.len());
    Ok((StatusCode::CREATED, Json(post)))
}

/// Resolve the image list of an edited post
///
/// Kept images are the submitted `existingImages` minus the `removedImages`
/// indices, restricted to URLs the post actually has. New uploads follow.
fn resolve_kept_images(current: &[String], form: &PostForm) -> ApiResult<Vec<String>> {
    let existing = match &form.existing_images {
        Some(existing) => existing.clone(),
        None => current.to_vec(),
    };

    let removed: HashSet<usize> = form.removed_images.iter().copied().collect();
    if let Some(bad) = removed.iter().find(|&&index| index >= existing.len()) {
        return Err(ApiError::BadRequest(format!("removedImages index {} is out of range", bad)));
    }

    let known: HashSet<&String> = current.iter().collect();
    let kept: Vec<String> = existing
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !removed.contains(index))
        .map(|(_, url)| url)
        .collect();

    if let Some(foreign) = kept.iter().find(|url| !known.contains(url)) {
        return Err(ApiError::BadRequest(format!("Image '{}' does not belong to this post", foreign)));
    }
    Ok(kept)
}

/// PUT /api/posts/:id - Edit content and images of an owned post
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<Post>> {
    let repo = PostRepository::new(state.db.pool.clone());
    owned_post(&repo, post_id, user_id, "edit")?;

    let form = read_post_form(multipart).await?;
    let content = form.content.as_deref().unwrap_or_default().trim().to_string();
    validate_content(&content)?;

    let current = repo.image_urls(post_id)?;
    let kept = resolve_kept_images(&current, &form)?;
    if kept.len() + form.images.len() > MAX_POST_IMAGES {
        return Err(ApiError::BadRequest(format!(
            "A post can have at most {} images",
            MAX_POST_IMAGES
        )));
    }
    validate_uploads(&form.images)?;

    let mut images = kept;
    images.extend(store_uploads(&state, &form.images).await?);
    repo.update(post_id, &content, &images)?;

    for url in current.iter().filter(|url| !images.contains(url)) {
        state.uploads.remove(url).await;
    }

    let post = repo
        .get_by_id(post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    tracing::info!("User {} updated post {}", user_id, post_id);
    Ok(Json(post))
}

/// DELETE /api/posts/:id - Delete an owned post with its comments and likes
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let repo = PostRepository::new(state.db.pool.clone());
    owned_post(&repo, post_id, user_id, "delete")?;

    let images = repo.image_urls(post_id)?;
    repo.delete(post_id)?;
    for url in &images {
        state.uploads.remove(url).await;
    }

    tracing::info!("User {} deleted post {}", user_id, post_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/:id/like - Toggle the caller's like
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<LikeState>> {
    PostRepository::new(state.db.pool.clone())
        .owner_of(post_id)?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let like_state =
        LikeRepository::new(state.db.pool.clone()).toggle(LikeTarget::Post, post_id, user_id)?;
    Ok(Json(like_state))
}
