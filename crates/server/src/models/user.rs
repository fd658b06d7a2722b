//! User domain types.

use chrono::{DateTime, Utc};

use sharerides_core::{Email, UserId};

/// A registered user.
///
/// Users are created on their first completed magic-link sign-in, so every
/// stored user has a verified email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique, stored lowercased.
    pub email: Email,
    pub name: Option<String>,
    pub image: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending magic-link token.
///
/// Only the SHA-256 of the emailed token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    /// The email the link was sent to.
    pub identifier: Email,
    /// Lowercase hex SHA-256 of the raw token.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Whether the token can no longer be redeemed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_token_expiry_boundary() {
        let now = Utc::now();
        let token = VerificationToken {
            identifier: Email::parse("rider@example.com").unwrap(),
            token_hash: "00".repeat(32),
            expires_at: now,
        };
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }
}
