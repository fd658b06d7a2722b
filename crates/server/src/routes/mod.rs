//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                - Liveness check
//! GET    /health/ready          - Readiness check (store ping)
//!
//! # Stories (also mounted under /api)
//! GET    /stories               - List/search by plate (?plate=&limit=&skip=)
//! POST   /stories               - Create (requires auth)
//! GET    /stories/{id}          - Story detail
//! PUT    /stories/{id}          - Update (owner only)
//! DELETE /stories/{id}          - Delete (owner only)
//! PATCH  /stories/{id}/upvote   - Upvote once (requires auth)
//! GET    /user/stories          - Caller's stories (requires auth)
//!
//! # Auth
//! POST   /auth/signin           - Email a magic link
//! GET    /auth/callback         - Redeem a magic link, start a session
//! POST   /auth/signout          - End the session
//! GET    /auth/session          - Current user or null
//! ```

pub mod auth;
pub mod health;
pub mod stories;
pub mod user;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the story API router.
pub fn story_routes() -> Router<AppState> {
    Router::new()
        .route("/stories", get(stories::list).post(stories::create))
        .route(
            "/stories/{id}",
            get(stories::show)
                .put(stories::update)
                .delete(stories::delete),
        )
        .route("/stories/{id}/upvote", patch(stories::upvote))
        .route("/user/stories", get(user::stories))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signin", post(auth::sign_in))
        .route("/callback", get(auth::callback))
        .route("/signout", post(auth::sign_out))
        .route("/session", get(auth::current_session))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(story_routes())
        .nest("/api", story_routes())
        .nest("/auth", auth_routes())
}
