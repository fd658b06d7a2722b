//! Story API handlers.
//!
//! - `GET    /stories?plate=&limit=&skip=` - list/search (public)
//! - `GET    /stories/{id}` - one story (public)
//! - `POST   /stories` - create (signed in)
//! - `PUT    /stories/{id}` - replace content (owner)
//! - `DELETE /stories/{id}` - delete (owner)
//! - `PATCH  /stories/{id}/upvote` - upvote once (signed in)

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

use sharerides_core::{ApiResponse, MessageResponse, Story, StoryId, StoryInput};

use crate::db::Page;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::StoryService;
use crate::state::AppState;

/// Query string for the story listing.
///
/// Counts are kept as strings so malformed values get a precise 400.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub plate: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// Parse a non-negative count, falling back to `default` when absent.
fn parse_count(raw: Option<&str>, default: u32, name: &str) -> Result<u32> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest(format!("Invalid {name} parameter"))),
    }
}

/// Unknown or malformed ids are both "not found".
fn parse_story_id(raw: &str) -> Result<StoryId> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Story not found".to_owned()))
}

/// List stories, newest first.
///
/// GET /stories
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Story>>>> {
    let Query(query) = query?;
    let limit = parse_count(query.limit.as_deref(), Page::DEFAULT_LIMIT, "limit")?;
    let skip = parse_count(query.skip.as_deref(), 0, "skip")?;

    let (stories, total) = StoryService::new(state.stories())
        .list(query.plate.as_deref(), Page::new(limit, skip))
        .await?;

    Ok(Json(ApiResponse::page(stories, total)))
}

/// Fetch one story.
///
/// GET /stories/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Story>>> {
    let id = parse_story_id(&id)?;
    let story = StoryService::new(state.stories()).get(id).await?;
    Ok(Json(ApiResponse::ok(story)))
}

/// Create a story owned by the caller.
///
/// POST /stories
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<StoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Story>>)> {
    let Json(input) = body?;
    let story = StoryService::new(state.stories())
        .create(&input, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(story))))
}

/// Replace a story's content.
///
/// PUT /stories/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    body: std::result::Result<Json<StoryInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Story>>> {
    let Json(input) = body?;
    let id = parse_story_id(&id)?;
    let story = StoryService::new(state.stories())
        .update(id, &input, &user)
        .await?;
    Ok(Json(ApiResponse::ok(story)))
}

/// Delete a story.
///
/// DELETE /stories/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = parse_story_id(&id)?;
    StoryService::new(state.stories()).delete(id, &user).await?;
    Ok(Json(MessageResponse::message("Story deleted successfully")))
}

/// Upvote a story once per user.
///
/// PATCH /stories/{id}/upvote
pub async fn upvote(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Story>>> {
    let id = parse_story_id(&id)?;
    let story = StoryService::new(state.stories()).upvote(id, &user).await?;
    Ok(Json(ApiResponse::ok(story)))
}
