//! Domain models for the server.
//!
//! These are the stored shapes. The wire shapes live in `sharerides_core`.

pub mod session;
pub mod story;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use story::{NewStory, StoryRecord};
pub use user::{User, VerificationToken};
