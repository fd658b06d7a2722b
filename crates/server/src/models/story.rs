//! Stored story document.

use chrono::{DateTime, Utc};

use sharerides_core::{Email, PlateNumber, Rating, Story, StoryId, UserId, ValidStory};

use super::CurrentUser;

/// A story as held by the store.
///
/// Unlike the wire [`Story`], this carries the voter set and both
/// timestamps. An empty `upvoted_by` with `upvotes > 0` is a legacy record
/// written before votes were deduplicated; it is served as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRecord {
    pub id: StoryId,
    pub plate_number: PlateNumber,
    pub story: String,
    pub location: Option<String>,
    pub rating: Rating,
    pub upvotes: u64,
    /// Normalized emails of everyone who upvoted.
    pub upvoted_by: Vec<Email>,
    pub user_id: UserId,
    pub user_email: Email,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoryRecord {
    /// Whether `voter` has already upvoted this story.
    #[must_use]
    pub fn has_upvoted(&self, voter: &Email) -> bool {
        self.upvoted_by.contains(voter)
    }

    /// Replace the owner-editable fields.
    pub fn apply(&mut self, patch: &ValidStory, now: DateTime<Utc>) {
        self.plate_number = patch.plate_number.clone();
        self.story.clone_from(&patch.story);
        self.location.clone_from(&patch.location);
        self.rating = patch.rating;
        self.updated_at = now;
    }
}

impl From<StoryRecord> for Story {
    fn from(record: StoryRecord) -> Self {
        Self {
            id: record.id,
            plate_number: record.plate_number,
            story: record.story,
            timestamp: record.created_at,
            location: record.location,
            rating: record.rating,
            upvotes: record.upvotes,
            user_id: record.user_id,
            user_email: record.user_email,
        }
    }
}

/// A validated story ready to insert, with its owner.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub content: ValidStory,
    pub owner: CurrentUser,
}

impl NewStory {
    /// Build the stored record. The store supplies the id and clock.
    #[must_use]
    pub fn into_record(self, id: StoryId, now: DateTime<Utc>) -> StoryRecord {
        StoryRecord {
            id,
            plate_number: self.content.plate_number,
            story: self.content.story,
            location: self.content.location,
            rating: self.content.rating,
            upvotes: 0,
            upvoted_by: Vec::new(),
            user_id: self.owner.id,
            user_email: self.owner.email,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sharerides_core::StoryInput;

    use super::*;

    fn owner() -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            email: Email::parse("owner@example.com").unwrap(),
        }
    }

    fn content(plate: &str, story: &str) -> ValidStory {
        StoryInput::new(plate, story, Rating::Positive)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_new_record_starts_without_votes() {
        let now = Utc::now();
        let record = NewStory {
            content: content("abc-123", "Friendly driver"),
            owner: owner(),
        }
        .into_record(StoryId::generate(), now);

        assert_eq!(record.upvotes, 0);
        assert!(record.upvoted_by.is_empty());
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.plate_number.as_str(), "ABC-123");
    }

    #[test]
    fn test_apply_keeps_owner_and_votes() {
        let now = Utc::now();
        let owner = owner();
        let mut record = NewStory {
            content: content("abc-123", "Friendly driver"),
            owner: owner.clone(),
        }
        .into_record(StoryId::generate(), now);
        record.upvotes = 2;

        let later = now + chrono::Duration::seconds(5);
        record.apply(&content("xyz-9", "Updated"), later);

        assert_eq!(record.plate_number.as_str(), "XYZ-9");
        assert_eq!(record.story, "Updated");
        assert_eq!(record.upvotes, 2);
        assert_eq!(record.user_email, owner.email);
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn test_wire_timestamp_is_creation_time() {
        let now = Utc::now();
        let record = NewStory {
            content: content("abc-123", "Friendly driver"),
            owner: owner(),
        }
        .into_record(StoryId::generate(), now);
        let story: Story = record.into();
        assert_eq!(story.timestamp, now);
    }
}
