//! Client error type.

use reqwest::StatusCode;
use sharerides_core::ValidationError;
use thiserror::Error;

/// Message shown for any failure that is not a server-reported error.
pub const NETWORK_ERROR: &str = "Network error";

/// Message the server sends for a repeated upvote.
const ALREADY_UPVOTED: &str = "You have already upvoted this story";

/// Errors returned by [`ApiClient`](crate::ApiClient) and the state hooks.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never completed.
    #[error("Network error")]
    Network(#[source] reqwest::Error),

    /// The server answered with something that is not the JSON envelope.
    #[error("Network error")]
    Decode(#[source] serde_json::Error),

    /// The server rejected the request with a message.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    /// The input failed local validation and was never sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// An upvote for this story is already being sent.
    #[error("Upvote already in progress")]
    UpvoteInFlight,

    /// The base URL or a sign-in link could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// True for transport and decoding failures.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Decode(_))
    }

    /// HTTP status of a server-reported error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// True when the server refused a second upvote by the same user.
    #[must_use]
    pub fn is_already_upvoted(&self) -> bool {
        matches!(
            self,
            Self::Api { status, message }
                if *status == StatusCode::BAD_REQUEST && message == ALREADY_UPVOTED
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_reads_as_network_error() {
        let err: ClientError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_network());
        assert_eq!(err.to_string(), NETWORK_ERROR);
    }

    #[test]
    fn test_server_message_is_shown_verbatim() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            message: ALREADY_UPVOTED.to_owned(),
        };
        assert!(err.is_already_upvoted());
        assert!(!err.is_network());
        assert_eq!(err.to_string(), ALREADY_UPVOTED);
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err: ClientError = ValidationError::StoryTooLong.into();
        assert_eq!(err.to_string(), "Story must be 500 characters or less");
    }
}
