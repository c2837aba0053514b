// Library exports for connectsphere-server
// The binary and the client crate's end-to-end tests both build the app from here

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod hashtag;
pub mod seed;
pub mod state;
pub mod uploads;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::db::Database;
use crate::state::AppState;
use crate::uploads::UPLOADS_URL_PREFIX;

/// Open the database, apply the schema and build the shared state
pub fn build_state(settings: &Settings) -> Result<AppState> {
    let db = Database::new(&settings.database.path).context("Failed to create database")?;
    db.initialize()?;
    AppState::new(db, settings)
}

/// All HTTP routes, with CORS, request tracing and the upload body limit
pub fn router(state: AppState, settings: &Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .route("/health", get(health_check))
        // Authentication
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/me", get(api::auth::me))
        // Posts
        .route("/api/posts", get(api::posts::list_posts).post(api::posts::create_post))
        .route("/api/posts/hashtag/:tag", get(api::posts::list_by_hashtag))
        .route(
            "/api/posts/:id",
            get(api::posts::get_post)
                .put(api::posts::update_post)
                .delete(api::posts::delete_post),
        )
        .route("/api/posts/:id/like", post(api::posts::toggle_like))
        // Comments
        .route("/api/comments", post(api::comments::create_comment))
        .route(
            "/api/comments/:id",
            put(api::comments::update_comment).delete(api::comments::delete_comment),
        )
        .route("/api/comments/:id/like", post(api::comments::toggle_comment_like))
        // Users
        .route("/api/users/me", put(api::users::update_profile))
        .route("/api/users/:id", get(api::users::get_user))
        .route("/api/users/:id/posts", get(api::users::user_posts))
        .route(
            "/api/users/:id/follow",
            post(api::users::follow_user).delete(api::users::unfollow_user),
        )
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .with_state(state)
        .layer(DefaultBodyLimit::max(settings.uploads.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind `settings.server` and serve in a background task
///
/// Returns the bound address, which matters when the configured port is 0.
pub async fn spawn(settings: &Settings) -> Result<(SocketAddr, JoinHandle<()>)> {
    let state = build_state(settings)?;
    let app = router(state, settings);

    let listener = tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port))
        .await
        .context("Failed to bind to address")?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((addr, handle))
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::for_testing(dir.path().to_string_lossy()).unwrap();
        let state = build_state(&settings).unwrap();
        (router(state, &settings), dir)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mutation_without_token_is_unauthorized() {
        let (app, _dir) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/posts/1/like")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (app, _dir) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/users/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
