//! Core types for ShareRideStories.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod plate;
pub mod rating;

pub use email::{Email, EmailError};
pub use id::*;
pub use plate::{PlateNumber, PlateNumberError};
pub use rating::{Rating, RatingError};
