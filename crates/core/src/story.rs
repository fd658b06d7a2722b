//! Story wire representation and input validation.
//!
//! [`Story`] is what the API returns and the client consumes. [`StoryInput`]
//! is the create/update request body; it keeps every field optional so the
//! server can tell a missing field from an invalid one and answer both with a
//! precise 400 instead of a generic deserialization failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, PlateNumber, PlateNumberError, Rating, StoryId, UserId};

/// Maximum story length, in characters, after trimming.
pub const MAX_STORY_LENGTH: usize = 500;

/// A story as exposed on the wire.
///
/// `timestamp` is the creation time. The set of upvoters is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    pub plate_number: PlateNumber,
    pub story: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub rating: Rating,
    pub upvotes: u64,
    pub user_id: UserId,
    pub user_email: Email,
}

/// Validation failures for story input.
///
/// The `Display` text is the user-facing message returned in the error
/// envelope.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Story must be {MAX_STORY_LENGTH} characters or less")]
    StoryTooLong,
    #[error("Invalid rating")]
    InvalidRating,
    #[error("Plate number must be {} characters or less", PlateNumber::MAX_LENGTH)]
    PlateTooLong,
}

/// Create/update request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

impl StoryInput {
    /// Build a complete input from typed parts.
    #[must_use]
    pub fn new(plate_number: impl Into<String>, story: impl Into<String>, rating: Rating) -> Self {
        Self {
            plate_number: Some(plate_number.into()),
            story: Some(story.into()),
            location: None,
            rating: Some(rating.as_str().to_owned()),
        }
    }

    /// Set the optional location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Validate and normalize the input.
    ///
    /// Checks run in a fixed order: required fields, story length, rating,
    /// then plate length.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<ValidStory, ValidationError> {
        let plate = non_blank(self.plate_number.as_deref());
        let story = non_blank(self.story.as_deref());
        let rating = non_blank(self.rating.as_deref());

        let (Some(plate), Some(story), Some(rating)) = (plate, story, rating) else {
            return Err(ValidationError::MissingFields);
        };

        if story.chars().count() > MAX_STORY_LENGTH {
            return Err(ValidationError::StoryTooLong);
        }

        let rating: Rating = rating.parse().map_err(|_| ValidationError::InvalidRating)?;

        let plate_number = PlateNumber::parse(plate).map_err(|e| match e {
            PlateNumberError::Empty => ValidationError::MissingFields,
            PlateNumberError::TooLong { .. } => ValidationError::PlateTooLong,
        })?;

        Ok(ValidStory {
            plate_number,
            story: story.to_owned(),
            location: non_blank(self.location.as_deref()).map(str::to_owned),
            rating,
        })
    }
}

/// Story input that passed validation: plate normalized, text trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStory {
    pub plate_number: PlateNumber,
    pub story: String,
    pub location: Option<String>,
    pub rating: Rating,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
