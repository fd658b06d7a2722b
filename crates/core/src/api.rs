//! JSON response envelope shared by the server and the client.
//!
//! Every response body has the shape
//! `{"success": bool, "data"?: T, "total"?: u64, "message"?: string, "error"?: string}`.

use serde::{Deserialize, Serialize};

/// The response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope for responses that only carry a status message.
pub type MessageResponse = ApiResponse<()>;

/// Envelope for error responses.
pub type ApiError = ApiResponse<()>;

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            total: None,
            message: None,
            error: None,
        }
    }

    /// Successful list response carrying `data` and the total matching count.
    #[must_use]
    pub const fn page(data: T, total: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            total: Some(total),
            message: None,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    /// Successful response carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            total: None,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Error response.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            total: None,
            message: None,
            error: Some(error.into()),
        }
    }
}
