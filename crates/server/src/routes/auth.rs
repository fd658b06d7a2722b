//! Magic-link sign-in route handlers.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use sharerides_core::MessageResponse;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::MagicLinkService;
use crate::services::auth::{AuthError, safe_callback_path};
use crate::state::AppState;

/// Sign-in request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub callback_url: Option<String>,
}

/// Query parameters carried by the emailed link.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub token: Option<String>,
    pub email: Option<String>,
    pub callback_url: Option<String>,
}

/// Current session payload.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub data: Option<CurrentUser>,
}

/// Email a sign-in link.
///
/// POST /auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    body: std::result::Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = body?;

    MagicLinkService::new(state.identities(), state.email(), &state.config().base_url)
        .send_link(&request.email, request.callback_url.as_deref())
        .await?;

    Ok(Json(MessageResponse::message(
        "Check your email for a sign-in link",
    )))
}

/// Redeem a sign-in link and start a session.
///
/// GET /auth/callback
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    query: std::result::Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Redirect> {
    let Query(query) = query?;
    let (Some(email), Some(token)) = (query.email.as_deref(), query.token.as_deref()) else {
        return Err(AuthError::InvalidLink.into());
    };

    let signed_in =
        MagicLinkService::new(state.identities(), state.email(), &state.config().base_url)
            .redeem(email, token)
            .await?;

    let user = CurrentUser {
        id: signed_in.user.id,
        email: signed_in.user.email.clone(),
    };
    set_current_user(&session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(Redirect::to(safe_callback_path(
        query.callback_url.as_deref(),
    )))
}

/// End the session.
///
/// POST /auth/signout
pub async fn sign_out(session: Session) -> Result<Json<MessageResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Json(MessageResponse::message("Signed out")))
}

/// Who is signed in, if anyone.
///
/// GET /auth/session
pub async fn current_session(OptionalAuth(user): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse { data: user })
}
