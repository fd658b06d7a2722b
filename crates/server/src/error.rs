//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as the JSON
//! envelope `{"success": false, "error": "..."}`; server-side failures are
//! captured to Sentry and answered with a generic message.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use sharerides_core::ApiError;

use crate::services::auth::AuthError;
use crate::services::stories::StoryError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Story operation failed.
    #[error("Story error: {0}")]
    Story(#[from] StoryError),

    /// Sign-in operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Story(err) => match err {
                StoryError::Validation(_) | StoryError::AlreadyUpvoted => StatusCode::BAD_REQUEST,
                StoryError::NotFound => StatusCode::NOT_FOUND,
                StoryError::Forbidden(_) => StatusCode::FORBIDDEN,
                StoryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) | AuthError::InvalidLink | AuthError::ExpiredLink => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Mail(_) | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The message shown to the client. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Story(StoryError::Repository(_)) => {
                "Internal server error".to_owned()
            }
            Self::Story(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::InvalidLink => "Invalid or already used sign-in link".to_owned(),
                AuthError::ExpiredLink => "Sign-in link has expired".to_owned(),
                AuthError::Mail(_) => "Failed to send sign-in email".to_owned(),
                AuthError::Repository(_) => "Internal server error".to_owned(),
            },
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ApiError::error(self.public_message()))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
