use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::forms::{ImageFile, NewPost, PostEdit};
use super::{ApiError, ApiResult};
use crate::logging::LogConfig;
use connectsphere_types::*;

/// HTTP client for the ConnectSphere server
///
/// One request per call: no retries, no caching. Clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    log: LogConfig,
}

impl ApiClient {
    /// Create a new API client without a request timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_client(Client::new(), base_url)
    }

    /// Create a new API client whose requests fail after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client, base_url))
    }

    fn from_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// A copy of this client that authenticates as `token`
    pub fn authorized(&self, token: &str) -> Self {
        let mut client = self.clone();
        client.token = Some(token.to_string());
        client
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a server-relative path such as an image URL
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Helper to add the bearer token to a request if available
    fn add_auth_header(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, method: &str, path: &str, req: RequestBuilder) -> ApiResult<Response> {
        log_api_call!(self.log, "{} {}", method, path);
        let response = self.add_auth_header(req).send().await.map_err(|e| {
            log::warn!("{} {} failed: {}", method, path, e);
            ApiError::Network(e)
        })?;
        log_api_call!(self.log, "{} {} -> {}", method, path, response.status());
        Ok(response)
    }

    /// Decode a success body, or map the failure status to an error
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// For endpoints answering 204 with no body
    async fn handle_empty(&self, response: Response) -> ApiResult<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, Self::error_message(status, &body))
    }

    /// Server message from an error body
    ///
    /// JSON `{error, details}` bodies yield `details` (falling back to `error`);
    /// HTML error pages from proxies are replaced by a short hint.
    fn error_message(status: u16, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            return parsed.details.unwrap_or(parsed.error);
        }
        if body.contains("<html") || body.contains("<!DOCTYPE") {
            return format!("Server returned {} error. Please check the server URL.", status);
        }
        if body.trim().is_empty() {
            return format!("Server returned {}", status);
        }
        body.trim().to_string()
    }

    fn image_part(image: &ImageFile) -> ApiResult<multipart::Part> {
        Ok(multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type())?)
    }

    // Authentication endpoints

    pub async fn register(&self, username: &str, password: &str) -> ApiResult<AuthResponse> {
        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let path = "/api/auth/register";
        let response = self.send("POST", path, self.client.post(self.url(path)).json(&request)).await?;
        self.handle_response(response).await
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AuthResponse> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let path = "/api/auth/login";
        let response = self.send("POST", path, self.client.post(self.url(path)).json(&request)).await?;
        self.handle_response(response).await
    }

    /// The user the current token belongs to
    pub async fn me(&self) -> ApiResult<UserRef> {
        let path = "/api/auth/me";
        let response = self.send("GET", path, self.client.get(self.url(path))).await?;
        self.handle_response(response).await
    }

    // Post endpoints

    /// All posts, newest first
    pub async fn get_posts(&self) -> ApiResult<Vec<Post>> {
        let path = "/api/posts";
        let response = self.send("GET", path, self.client.get(self.url(path))).await?;
        self.handle_response(response).await
    }

    pub async fn get_post(&self, post_id: i64) -> ApiResult<Post> {
        let path = format!("/api/posts/{}", post_id);
        let response = self.send("GET", &path, self.client.get(self.url(&path))).await?;
        self.handle_response(response).await
    }

    /// Posts whose content contains `#tag`
    pub async fn get_posts_by_hashtag(&self, tag: &str) -> ApiResult<Vec<Post>> {
        let tag = tag.trim().trim_start_matches('#');
        let path = format!("/api/posts/hashtag/{}", urlencoding::encode(tag));
        let response = self.send("GET", &path, self.client.get(self.url(&path))).await?;
        self.handle_response(response).await
    }

    pub async fn get_user_posts(&self, user_id: i64) -> ApiResult<Vec<Post>> {
        let path = format!("/api/users/{}/posts", user_id);
        let response = self.send("GET", &path, self.client.get(self.url(&path))).await?;
        self.handle_response(response).await
    }

    pub async fn create_post(&self, post: &NewPost) -> ApiResult<Post> {
        let mut form = multipart::Form::new().text("content", post.content.clone());
        for image in &post.images {
            form = form.part("images", Self::image_part(image)?);
        }

        let path = "/api/posts";
        let response = self
            .send("POST", path, self.client.post(self.url(path)).multipart(form))
            .await?;
        self.handle_response(response).await
    }

    pub async fn update_post(&self, post_id: i64, edit: &PostEdit) -> ApiResult<Post> {
        let mut form = multipart::Form::new()
            .text("content", edit.content.clone())
            .text("existingImages", serde_json::to_string(&edit.existing_images)?)
            .text("removedImages", serde_json::to_string(&edit.removed_images)?);
        for image in &edit.new_images {
            form = form.part("images", Self::image_part(image)?);
        }

        let path = format!("/api/posts/{}", post_id);
        let response = self
            .send("PUT", &path, self.client.put(self.url(&path)).multipart(form))
            .await?;
        self.handle_response(response).await
    }

    pub async fn delete_post(&self, post_id: i64) -> ApiResult<()> {
        let path = format!("/api/posts/{}", post_id);
        let response = self.send("DELETE", &path, self.client.delete(self.url(&path))).await?;
        self.handle_empty(response).await
    }

    pub async fn toggle_like(&self, post_id: i64) -> ApiResult<LikeState> {
        let path = format!("/api/posts/{}/like", post_id);
        let response = self.send("POST", &path, self.client.post(self.url(&path))).await?;
        self.handle_response(response).await
    }

    // Comment endpoints

    pub async fn create_comment(&self, post_id: i64, content: &str, parent_id: Option<i64>) -> ApiResult<Comment> {
        let request = CreateCommentRequest {
            post_id,
            content: content.to_string(),
            parent_id,
        };
        let path = "/api/comments";
        let response = self.send("POST", path, self.client.post(self.url(path)).json(&request)).await?;
        self.handle_response(response).await
    }

    pub async fn update_comment(&self, comment_id: i64, content: &str) -> ApiResult<Comment> {
        let request = UpdateCommentRequest {
            content: content.to_string(),
        };
        let path = format!("/api/comments/{}", comment_id);
        let response = self.send("PUT", &path, self.client.put(self.url(&path)).json(&request)).await?;
        self.handle_response(response).await
    }

    pub async fn delete_comment(&self, comment_id: i64) -> ApiResult<()> {
        let path = format!("/api/comments/{}", comment_id);
        let response = self.send("DELETE", &path, self.client.delete(self.url(&path))).await?;
        self.handle_empty(response).await
    }

    pub async fn toggle_comment_like(&self, comment_id: i64) -> ApiResult<LikeState> {
        let path = format!("/api/comments/{}/like", comment_id);
        let response = self.send("POST", &path, self.client.post(self.url(&path))).await?;
        self.handle_response(response).await
    }

    // User endpoints

    pub async fn get_user(&self, user_id: i64) -> ApiResult<UserProfile> {
        let path = format!("/api/users/{}", user_id);
        let response = self.send("GET", &path, self.client.get(self.url(&path))).await?;
        self.handle_response(response).await
    }

    pub async fn follow_user(&self, user_id: i64) -> ApiResult<UserProfile> {
        let path = format!("/api/users/{}/follow", user_id);
        let response = self.send("POST", &path, self.client.post(self.url(&path))).await?;
        self.handle_response(response).await
    }

    pub async fn unfollow_user(&self, user_id: i64) -> ApiResult<UserProfile> {
        let path = format!("/api/users/{}/follow", user_id);
        let response = self.send("DELETE", &path, self.client.delete(self.url(&path))).await?;
        self.handle_response(response).await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> ApiResult<UserProfile> {
        let path = "/api/users/me";
        let response = self.send("PUT", path, self.client.put(self.url(path)).json(request)).await?;
        self.handle_response(response).await
    }
}
