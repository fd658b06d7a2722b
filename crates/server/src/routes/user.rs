//! Signed-in user's own data.

use axum::{Json, extract::State};

use sharerides_core::{ApiResponse, Story};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::StoryService;
use crate::state::AppState;

/// The caller's stories, newest first.
///
/// GET /user/stories
pub async fn stories(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ApiResponse<Vec<Story>>>> {
    let stories = StoryService::new(state.stories()).list_mine(&user).await?;
    Ok(Json(ApiResponse::ok(stories)))
}
