//! ShareRideStories client.
//!
//! - [`ApiClient`] - typed HTTP client with a cookie-backed session
//! - [`hooks`] - client-side state for the story feed, the composer,
//!   upvoting, and the signed-in user's stories

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod error;
pub mod hooks;

pub use api::{ApiClient, PageRequest, SessionUser, StoriesApi, StoryPage};
pub use error::{ClientError, NETWORK_ERROR};
pub use hooks::{StoriesFeed, StoryComposer, Upvoter, UserStories};
