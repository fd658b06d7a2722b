//! Business logic services.
//!
//! # Services
//!
//! - `stories` - Story rules: validation, ownership, deduplicated upvotes
//! - `auth` - Passwordless sign-in with single-use magic links
//! - `email` - Transactional email rendering and delivery

pub mod auth;
pub mod email;
pub mod stories;

pub use auth::{AuthError, MagicLinkService, SignedIn};
pub use email::{EmailService, LogMailer, MailError, Mailer, RenderedEmail, SmtpMailer};
#[cfg(any(test, feature = "testing"))]
pub use email::RecordingMailer;
pub use stories::{StoryError, StoryService, is_owner};
