//! Passwordless sign-in with emailed magic links.
//!
//! A sign-in request stores the SHA-256 of a random token and emails a link
//! carrying the raw token. Following the link redeems the token exactly once,
//! creating the user on first sign-in.

mod error;

pub use error::AuthError;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::instrument;

use sharerides_core::Email;

use crate::db::{IdentityStore, RepositoryError};
use crate::models::{User, VerificationToken};
use crate::services::email::EmailService;

/// How long a magic link stays valid.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Outcome of redeeming a magic link.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    /// True when this sign-in created the account.
    pub is_new_user: bool,
}

/// Magic-link sign-in service.
pub struct MagicLinkService<'a> {
    identities: &'a dyn IdentityStore,
    email: &'a EmailService,
    base_url: &'a str,
}

impl<'a> MagicLinkService<'a> {
    /// Create a new sign-in service. `base_url` has no trailing slash.
    #[must_use]
    pub const fn new(
        identities: &'a dyn IdentityStore,
        email: &'a EmailService,
        base_url: &'a str,
    ) -> Self {
        Self {
            identities,
            email,
            base_url,
        }
    }

    /// Issue a token and email the sign-in link.
    ///
    /// Returns the normalized address the link was sent to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the address does not parse and
    /// `AuthError::Mail` if the email cannot be sent.
    #[instrument(skip(self, email, callback_url))]
    pub async fn send_link(
        &self,
        email: &str,
        callback_url: Option<&str>,
    ) -> Result<Email, AuthError> {
        let email = Email::parse(email)?;
        let is_new_user = self.identities.find_user_by_email(&email).await?.is_none();

        let token = generate_token();
        self.identities
            .store_verification_token(&VerificationToken {
                identifier: email.clone(),
                token_hash: hash_token(&token),
                expires_at: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
            })
            .await?;

        let link = callback_link(
            self.base_url,
            &token,
            &email,
            safe_callback_path(callback_url),
        );
        self.email
            .send_magic_link(&email, &link, is_new_user)
            .await?;

        tracing::info!(email = %email, is_new_user, "Magic link sent");
        Ok(email)
    }

    /// Redeem a magic link.
    ///
    /// The token is consumed even when it turns out to be expired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidLink` for unknown, reused, or malformed
    /// links and `AuthError::ExpiredLink` for expired ones.
    #[instrument(skip(self, email, token))]
    pub async fn redeem(&self, email: &str, token: &str) -> Result<SignedIn, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidLink)?;
        if token.is_empty() {
            return Err(AuthError::InvalidLink);
        }

        let stored = self
            .identities
            .take_verification_token(&email, &hash_token(token))
            .await?
            .ok_or(AuthError::InvalidLink)?;
        if stored.is_expired(Utc::now()) {
            return Err(AuthError::ExpiredLink);
        }

        let signed_in = match self.identities.find_user_by_email(&email).await? {
            Some(user) => SignedIn {
                user: self.identities.mark_email_verified(&user).await?,
                is_new_user: false,
            },
            None => match self.identities.create_verified_user(&email).await {
                Ok(user) => SignedIn {
                    user,
                    is_new_user: true,
                },
                // Lost a race with another link for the same address.
                Err(RepositoryError::Conflict(_)) => SignedIn {
                    user: self
                        .identities
                        .find_user_by_email(&email)
                        .await?
                        .ok_or(RepositoryError::NotFound)?,
                    is_new_user: false,
                },
                Err(e) => return Err(e.into()),
            },
        };

        if signed_in.is_new_user
            && let Err(e) = self.email.send_welcome(&email).await
        {
            tracing::warn!(email = %email, error = %e, "Failed to send welcome email");
        }

        tracing::info!(user_id = %signed_in.user.id, is_new_user = signed_in.is_new_user, "User signed in");
        Ok(signed_in)
    }
}

/// Accept only same-origin relative paths; anything else becomes `/`.
#[must_use]
pub fn safe_callback_path(raw: Option<&str>) -> &str {
    match raw {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn callback_link(base_url: &str, token: &str, email: &Email, callback_path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("email", email.as_str())
        .append_pair("callbackUrl", callback_path)
        .finish();
    format!("{base_url}/auth/callback?{query}")
}
