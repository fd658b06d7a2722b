//! ShareRideStories Core - Shared types library.
//!
//! This crate provides common types used across all ShareRideStories components:
//! - `server` - HTTP API for stories and sign-in
//! - `client` - Typed HTTP client and client-side state
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows both the
//! server and the client to agree on the wire format.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, plate numbers and ratings
//! - [`story`] - Story wire representation and input validation
//! - [`api`] - JSON response envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod story;
pub mod types;

pub use api::{ApiError, ApiResponse, MessageResponse};
pub use story::{MAX_STORY_LENGTH, Story, StoryInput, ValidStory, ValidationError};
pub use types::*;
